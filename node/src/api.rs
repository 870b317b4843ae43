// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

/// A text command, e.g. `{"command": "add 5"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAccepted {
    pub kind: i32,
    pub queued: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub counter: i64,
    pub events_applied_to_counter: u64,
    pub commands_processed: u64,
    pub commands_skipped: u64,
    pub events_applied: u64,
}
