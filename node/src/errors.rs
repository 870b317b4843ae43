// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sequent_kernel::error::{ConfigError, RuntimeError};
use sequent_persistence::PersistenceError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Command queue is full")]
    Backpressure,
    #[error("Node is shutting down")]
    Closed,
    #[error("Telemetry error: {0}")]
    Telemetry(String),
    #[error("Task failed: {0}")]
    Task(String),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NodeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            NodeError::Backpressure => StatusCode::TOO_MANY_REQUESTS,
            NodeError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
