// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::command::{EventRouter, ServerState, SharedServerState};
use crate::duty::NoOp;
use crate::error::LogError;
use crate::event::CommandLoopback;
use crate::input::{QueueHandle, QueueInput};
use crate::log::{InMemoryLog, LogPosition, MessageLog};
use crate::raft::{
    lock_node, AppendRequest, Containment, InMemoryRaftLog, LocalNetwork, Message, RaftConfig,
    RaftEntry, RaftLog, RaftNode, RaftStep, ReplicatedLog, Role, SharedRaftNode, VoteRequest,
    NOT_VOTED_YET,
};
use crate::runtime::{Runtime, RuntimeBuilder};
use crate::sequence::ManualTimeSource;
use crate::wire::{encode_record, RecordHeader, RecordKind, RecordView};

fn log_with_terms(terms: &[i32]) -> InMemoryRaftLog {
    let mut log = InMemoryRaftLog::new();
    for &term in terms {
        log.append(term, frame(1, term as i64)).unwrap();
    }
    log
}

fn frame(source: i32, sequence: i64) -> Arc<[u8]> {
    let mut buf = Vec::new();
    encode_record(&mut buf, &RecordHeader::new(source, sequence, 0, 1, 0), b"event").unwrap();
    Arc::from(buf)
}

fn config(id: i32, peers: &[i32]) -> RaftConfig {
    RaftConfig {
        id,
        peers: peers.to_vec(),
        ..RaftConfig::default()
    }
}

#[test]
fn test_containment_classification() {
    // index 12, term 5 against logs of size 13, 10 and 16.
    let mut terms = vec![5; 13];
    assert_eq!(Containment::of(12, 5, &log_with_terms(&terms)), Containment::In);

    terms.truncate(10);
    assert_eq!(Containment::of(12, 5, &log_with_terms(&terms)), Containment::Out);

    let mut terms = vec![5; 12];
    terms.extend([6; 4]);
    assert_eq!(Containment::of(12, 5, &log_with_terms(&terms)), Containment::Conflict);

    assert_eq!(Containment::of(-1, 0, &InMemoryRaftLog::new()), Containment::In);
}

#[test]
fn test_clear_vote_and_increment_term() {
    let mut log = InMemoryRaftLog::new();
    log.clear_vote_for_and_set_current_term(4).unwrap();
    log.vote_for(2).unwrap();
    assert_eq!((log.current_term(), log.voted_for()), (4, 2));

    assert_eq!(log.clear_vote_for_and_inc_current_term().unwrap(), 5);
    assert_eq!(log.current_term(), 5);
    assert_eq!(log.voted_for(), NOT_VOTED_YET);
}

#[test]
fn test_log_guards() {
    let mut log = log_with_terms(&[1, 2, 2]);
    assert!(matches!(
        log.append(1, frame(1, 9)),
        Err(LogError::TermRegression { term: 1, last_term: 2 })
    ));
    assert!(matches!(
        log.set_commit_index(3),
        Err(LogError::IndexOutOfRange { index: 3, size: 3 })
    ));

    log.set_commit_index(1).unwrap();
    assert!(matches!(log.truncate(1), Err(LogError::TruncateCommitted { .. })));
    log.truncate(2).unwrap();
    assert_eq!(log.size(), 2);
    assert_eq!(log.last_term(), 2);
}

#[test]
fn test_follower_resolves_conflicts_by_truncation() {
    let mut node = RaftNode::new(config(2, &[1, 3]), log_with_terms(&[1, 1, 2]), 0).unwrap();

    // The leader of term 3 only agrees with us up to index 1.
    let request = AppendRequest {
        term: 3,
        leader: 1,
        prev_index: 1,
        prev_term: 1,
        entries: vec![RaftEntry::new(3, frame(1, 30))],
        leader_commit: 2,
    };
    node.handle(10, 1, Message::AppendRequest(request)).unwrap();

    let terms: Vec<Option<i32>> = (0..3).map(|i| node.log().term(i)).collect();
    assert_eq!(terms, vec![Some(1), Some(1), Some(3)]);
    assert_eq!(node.commit_index(), 2);
    assert_eq!(node.current_term(), 3);
    assert_eq!(node.leader(), Some(1));

    let replies = node.drain_outbox();
    match &replies[0].message {
        Message::AppendResponse(r) => assert!(r.success && r.match_index == 2),
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn test_follower_rejects_missing_and_conflicting_prefix() {
    let mut node = RaftNode::new(config(2, &[1, 3]), log_with_terms(&[1, 1, 2]), 0).unwrap();

    let out = AppendRequest {
        term: 3,
        leader: 1,
        prev_index: 9,
        prev_term: 3,
        entries: Vec::new(),
        leader_commit: -1,
    };
    node.handle(0, 1, Message::AppendRequest(out)).unwrap();

    let conflict = AppendRequest {
        term: 3,
        leader: 1,
        prev_index: 2,
        prev_term: 3,
        entries: Vec::new(),
        leader_commit: -1,
    };
    node.handle(0, 1, Message::AppendRequest(conflict)).unwrap();
    assert_eq!(node.log().size(), 2);

    let hints: Vec<(bool, i64)> = node
        .drain_outbox()
        .into_iter()
        .filter_map(|e| match e.message {
            Message::AppendResponse(r) => Some((r.success, r.match_index)),
            _ => None,
        })
        .collect();
    assert_eq!(hints, vec![(false, 2), (false, 1)]);
}

#[test]
fn test_single_vote_per_term_and_up_to_date_check() {
    let mut node = RaftNode::new(config(1, &[2, 3]), log_with_terms(&[1, 2]), 0).unwrap();

    let stale = VoteRequest {
        term: 5,
        candidate: 2,
        last_index: 5,
        last_term: 1,
    };
    node.handle(0, 2, Message::VoteRequest(stale)).unwrap();
    assert_eq!(node.current_term(), 5);
    assert_eq!(node.log().voted_for(), NOT_VOTED_YET);

    let good = VoteRequest {
        term: 5,
        candidate: 3,
        last_index: 1,
        last_term: 2,
    };
    node.handle(0, 3, Message::VoteRequest(good)).unwrap();
    node.handle(0, 2, Message::VoteRequest(VoteRequest { candidate: 2, ..good })).unwrap();
    assert_eq!(node.log().voted_for(), 3);

    let granted: Vec<bool> = node
        .drain_outbox()
        .into_iter()
        .filter_map(|e| match e.message {
            Message::VoteResponse(r) => Some(r.granted),
            _ => None,
        })
        .collect();
    assert_eq!(granted, vec![false, true, false]);
}

struct Cluster {
    nodes: Vec<SharedRaftNode<InMemoryRaftLog>>,
    now: i64,
}

impl Cluster {
    fn new(size: i32) -> Self {
        let ids: Vec<i32> = (1..=size).collect();
        let nodes = ids
            .iter()
            .map(|&id| {
                let peers: Vec<i32> = ids.iter().copied().filter(|&p| p != id).collect();
                let node = RaftNode::new(config(id, &peers), InMemoryRaftLog::new(), 0).unwrap();
                Arc::new(Mutex::new(node))
            })
            .collect();
        Self { nodes, now: 0 }
    }

    fn node(&self, id: i32) -> &SharedRaftNode<InMemoryRaftLog> {
        &self.nodes[(id - 1) as usize]
    }

    /// Delivers messages until every outbox is empty.
    fn deliver(&self) {
        loop {
            let mut pending = Vec::new();
            for node in &self.nodes {
                pending.extend(lock_node(node).drain_outbox());
            }
            if pending.is_empty() {
                return;
            }
            for envelope in pending {
                lock_node(self.node(envelope.to))
                    .handle(self.now, envelope.from, envelope.message)
                    .unwrap();
            }
        }
    }

    fn step(&mut self) {
        self.now += 1;
        for node in &self.nodes {
            lock_node(node).tick(self.now).unwrap();
        }
        self.deliver();
    }

    fn leaders(&self) -> Vec<i32> {
        self.nodes
            .iter()
            .map(|n| lock_node(n))
            .filter(|n| n.role() == Role::Leader)
            .map(|n| n.id())
            .collect()
    }

    fn elect(&mut self) -> i32 {
        for _ in 0..5_000 {
            self.step();
            if let [leader] = self.leaders().as_slice() {
                return *leader;
            }
        }
        panic!("no leader elected");
    }
}

#[test]
fn test_cluster_elects_a_leader_and_commits_on_majority() {
    let mut cluster = Cluster::new(3);
    let leader = cluster.elect();
    let term = lock_node(cluster.node(leader)).current_term();

    let index = lock_node(cluster.node(leader)).propose(frame(1, 1)).unwrap();
    cluster.deliver();
    assert_eq!(lock_node(cluster.node(leader)).commit_index(), index);

    // Followers learn the commit index with the next heartbeat.
    for _ in 0..60 {
        cluster.step();
    }
    for node in &cluster.nodes {
        let node = lock_node(node);
        assert_eq!(node.commit_index(), index);
        assert_eq!(node.log().term(index), Some(term));
        assert_eq!(node.current_term(), term);
    }
    assert_eq!(cluster.leaders(), vec![leader]);
}

#[test]
fn test_single_node_commits_immediately() {
    let mut node = RaftNode::new(config(1, &[]), InMemoryRaftLog::new(), 0).unwrap();
    node.tick(1_000).unwrap();
    assert!(node.is_leader());
    // The leader's no-op of the new term.
    assert_eq!(node.commit_index(), 0);

    let index = node.propose(frame(1, 1)).unwrap();
    assert_eq!(node.commit_index(), index);
}

#[test]
fn test_server_state_follows_role() {
    let state = Arc::new(SharedServerState::new(true));
    let mut node = RaftNode::new(config(1, &[]), InMemoryRaftLog::new(), 0)
        .unwrap()
        .with_server_state(state.clone());
    assert!(!state.process_commands());

    node.tick(1_000).unwrap();
    assert!(state.process_commands());

    let newer = AppendRequest {
        term: node.current_term() + 1,
        leader: 2,
        prev_index: -1,
        prev_term: 0,
        entries: Vec::new(),
        leader_commit: -1,
    };
    node.handle(1_001, 2, Message::AppendRequest(newer)).unwrap();
    assert_eq!(node.role(), Role::Follower);
    assert!(!state.process_commands());
}

#[test]
fn test_replicated_log_exposes_committed_entries_only() {
    let mut cluster = Cluster::new(3);
    let leader = cluster.elect();
    let follower = if leader == 1 { 2 } else { 1 };

    let leader_log = ReplicatedLog::new(cluster.node(leader).clone());
    let follower_log = ReplicatedLog::new(cluster.node(follower).clone());

    let mut records = Vec::new();
    encode_record(&mut records, &RecordHeader::new(1, 1, 0, 7, 0), b"a").unwrap();
    encode_record(&mut records, &RecordHeader::new(1, 1, 1, 7, 0), b"b").unwrap();
    leader_log.append(&records).unwrap();
    assert!(matches!(follower_log.append(&records), Err(LogError::NotLeader)));

    let mut position = LogPosition::START;
    let mut seen = Vec::new();
    assert_eq!(leader_log.poll(&mut position, &mut |r: RecordView<'_>| seen.push(r.index())).unwrap(), 0);

    cluster.deliver();
    while leader_log
        .poll(&mut position, &mut |r: RecordView<'_>| seen.push(r.index()))
        .unwrap()
        > 0
    {}
    assert_eq!(seen, vec![0, 1]);
}

struct Member {
    runtime: Runtime,
    input: QueueHandle,
    total: Arc<AtomicI64>,
    node: SharedRaftNode<InMemoryRaftLog>,
}

fn member(id: i32, peers: &[i32], network: &LocalNetwork, time: &Arc<ManualTimeSource>) -> Member {
    let state = Arc::new(SharedServerState::new(false));
    let node = RaftNode::new(config(id, peers), InMemoryRaftLog::new(), 0)
        .unwrap()
        .with_server_state(state.clone());
    let node: SharedRaftNode<InMemoryRaftLog> = Arc::new(Mutex::new(node));
    let total = Arc::new(AtomicI64::new(0));
    let applied = total.clone();
    let (input, handle) = QueueInput::new(1, 64);

    let runtime = RuntimeBuilder::new()
        .command_log(Arc::new(InMemoryLog::in_memory()))
        .event_log(Arc::new(ReplicatedLog::new(node.clone())))
        .server_state(state)
        .time_source(time.clone())
        .idle_strategy(Box::new(NoOp))
        .input(input)
        .step(RaftStep::new(node.clone(), network.transport(id), time.clone()))
        .processor(|command: RecordView<'_>, router: &mut EventRouter| -> anyhow::Result<()> {
            router.route(1, command.payload())?;
            Ok(())
        })
        .applier(move |event: RecordView<'_>, _: &mut dyn CommandLoopback| -> anyhow::Result<()> {
            if event.kind() == RecordKind::Application(1) {
                applied.fetch_add(i64::from_le_bytes(event.payload().try_into()?), Ordering::SeqCst);
            }
            Ok(())
        })
        .build()
        .unwrap();

    Member {
        runtime,
        input: handle,
        total,
        node,
    }
}

#[test]
fn test_followers_apply_events_produced_by_the_leader() {
    let network = LocalNetwork::new();
    let time = Arc::new(ManualTimeSource::new(0));
    let mut members: Vec<Member> = (1..=3)
        .map(|id| {
            let peers: Vec<i32> = (1..=3).filter(|&p| p != id).collect();
            member(id, &peers, &network, &time)
        })
        .collect();

    let run = |members: &mut Vec<Member>, cycles: usize| {
        for _ in 0..cycles {
            time.advance(1);
            for m in members.iter_mut() {
                m.runtime.run_once().unwrap();
            }
        }
    };

    run(&mut members, 1_000);
    let leaders: Vec<usize> = (0..3).filter(|&i| lock_node(&members[i].node).is_leader()).collect();
    assert_eq!(leaders.len(), 1);
    let leader = leaders[0];

    // Every member receives the command; only the leader processes it.
    for m in &members {
        m.input.submit(0, 25i64.to_le_bytes().to_vec());
    }
    run(&mut members, 200);

    for (i, m) in members.iter().enumerate() {
        assert_eq!(m.total.load(Ordering::SeqCst), 25, "member {}", i);
        if i == leader {
            assert_eq!(m.runtime.stats().commands_processed(), 1);
        } else {
            assert_eq!(m.runtime.stats().commands_skipped(), 1);
        }
    }
}
