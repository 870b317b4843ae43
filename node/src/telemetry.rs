// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

use crate::errors::{NodeError, Result};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs to stderr + Prometheus metrics)
pub fn init_telemetry() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sequent_node=debug,sequent_kernel=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| NodeError::Telemetry(e.to_string()))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| NodeError::Telemetry(e.to_string()))?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("sequent_commands_sequenced_total", "Commands appended to the command log");
    metrics::describe_counter!("sequent_events_committed_total", "Events committed to the event log");
    metrics::describe_counter!("sequent_commands_rejected_total", "Input messages refused by the command log and dropped");
    metrics::describe_counter!("sequent_processing_errors_total", "Command, event and output failures by stage");
    metrics::describe_histogram!("sequent_replay_duration_seconds", "Time taken to replay the event log at startup");
    metrics::describe_gauge!("sequent_node_up", "1 while the node is running");

    metrics::gauge!("sequent_node_up", 1.0);
    Ok(())
}

/// Prometheus exposition text, or a placeholder before `init_telemetry`.
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
