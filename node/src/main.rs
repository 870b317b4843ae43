// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use sequent_node::config::NodeConfig;
use sequent_node::counter::parse_command;
use sequent_node::errors::{NodeError, Result};
use sequent_node::node::Node;
use sequent_node::server::{build_router, AppState};
use sequent_node::telemetry::init_telemetry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry()?;

    let cfg = match std::env::args().nth(1) {
        Some(path) => NodeConfig::from_file(&path)?,
        None => NodeConfig::default(),
    };
    tracing::info!("Initializing Sequent Node with config: {:?}", cfg);

    let node = Node::open(&cfg)?;
    let stop = node.stop_handle();
    let state = AppState {
        sender: node.sender(),
        counter: node.counter(),
        stats: node.stats(),
    };

    // The duty cycle owns its thread; everything else talks to it through
    // the command channel.
    let duty = tokio::task::spawn_blocking(move || node.run());

    // Stdin lines are commands too.
    let stdin_sender = state.sender.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let submitted = match parse_command(&line) {
                Ok((kind, payload)) => stdin_sender.submit(kind, payload).await,
                Err(e) => Err(e),
            };
            if let Err(e) = submitted {
                tracing::warn!("Ignoring {:?}: {}", line, e);
            }
        }
    });

    let app = build_router(state, cfg.auth_token.clone());
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    let shutdown_stop = stop.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down");
            shutdown_stop.stop();
        })
        .await?;

    stop.stop();
    duty.await
        .map_err(|e| NodeError::Task(format!("duty cycle: {e}")))??;
    metrics::gauge!("sequent_node_up", 0.0);
    Ok(())
}
