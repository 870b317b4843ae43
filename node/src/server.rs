// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sequent_kernel::runtime::RuntimeStats;

use crate::api::{CommandAccepted, CommandRequest, StatusResponse};
use crate::counter::{parse_command, CounterState};
use crate::errors::NodeError;
use crate::input::CommandSender;

/// Handles shared between the duty cycle thread and the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub sender: CommandSender,
    pub counter: Arc<CounterState>,
    pub stats: Arc<RuntimeStats>,
}

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    if provided == Some(token.as_str()) {
        Ok(next.run(req).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

pub fn build_router(state: AppState, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/v1/commands", post(submit_command))
        .route("/v1/status", get(status))
        .with_state(state);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        app = app.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    // Scrapers do not authenticate.
    app.route("/metrics", get(metrics_handler))
}

async fn submit_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<(StatusCode, Json<CommandAccepted>), NodeError> {
    let (kind, payload) = parse_command(&req.command)?;
    state.sender.try_submit(kind, payload)?;
    Ok((StatusCode::ACCEPTED, Json(CommandAccepted { kind, queued: true })))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let counter = state.counter.snapshot();
    Json(StatusResponse {
        counter: counter.value,
        events_applied_to_counter: counter.applied,
        commands_processed: state.stats.commands_processed(),
        commands_skipped: state.stats.commands_skipped(),
        events_applied: state.stats.events_applied(),
    })
}

async fn metrics_handler() -> String {
    crate::telemetry::render_metrics()
}
