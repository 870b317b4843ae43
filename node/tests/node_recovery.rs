// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use sequent_kernel::duty::IdleConfig;
use sequent_node::config::NodeConfig;
use sequent_node::counter::parse_command;
use sequent_node::node::Node;
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        data_dir: dir.to_path_buf(),
        region_capacity: 4096,
        idle: IdleConfig::NoOp,
        ..NodeConfig::default()
    }
}

fn submit(node: &Node, line: &str) {
    let (kind, payload) = parse_command(line).unwrap();
    node.sender().try_submit(kind, payload).unwrap();
}

#[test]
fn test_counter_survives_restart() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());

    {
        let mut node = Node::open(&cfg).unwrap();
        for line in ["add 5", "add 7", "add 9223372036854775807", "add -2"] {
            submit(&node, line);
        }
        node.run_until_idle(100).unwrap();
        // The overflowing add is rejected and consumed.
        assert_eq!(node.counter().value(), 10);
        assert_eq!(node.stats().commands_processed(), 3);
    }

    let mut node = Node::open(&cfg).unwrap();
    assert_eq!(node.recovery().events_replayed, 3);
    assert_eq!(node.counter().value(), 10);

    submit(&node, "add 1");
    node.run_until_idle(100).unwrap();
    assert_eq!(node.counter().value(), 11);
}

#[test]
fn test_reset_timer_fires_and_is_replayed() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());

    {
        let mut node = Node::open(&cfg).unwrap();
        submit(&node, "add 3");
        submit(&node, "reset-in 0");
        node.run_until_idle(100).unwrap();
        assert_eq!(node.counter().value(), 0);
        assert_eq!(node.counter().snapshot().applied, 2);
    }

    let node = Node::open(&cfg).unwrap();
    assert_eq!(node.counter().value(), 0);
}
