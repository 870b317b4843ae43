// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Errors raised while encoding or binding wire records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("Record truncated at offset {offset}: need {required} bytes, have {available}")]
    Truncated {
        offset: usize,
        required: usize,
        available: usize,
    },

    #[error("Invalid payload length: {0}")]
    InvalidLength(i32),

    #[error("Invalid payload for type {kind}: expected {expected} bytes, found {found}")]
    InvalidPayload {
        kind: i32,
        expected: usize,
        found: usize,
    },
}

/// Errors raised by message logs and the Raft log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Frame of {0} bytes exceeds the maximum frame length")]
    FrameTooLarge(usize),

    #[error("Log corrupted at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    #[error("Sequence violation for source {source_id}: {sequence} is not after {last}")]
    SequenceViolation {
        source_id: i32,
        sequence: i64,
        last: i64,
    },

    #[error("Not the leader")]
    NotLeader,

    #[error("Term {term} is lower than the last term {last_term}")]
    TermRegression { term: i32, last_term: i32 },

    #[error("Index {index} is out of range for log of size {size}")]
    IndexOutOfRange { index: i64, size: i64 },

    #[error("Cannot truncate committed entries: truncate from {from}, commit index {commit_index}")]
    TruncateCommitted { from: i64, commit_index: i64 },
}

impl LogError {
    /// The records themselves were refused. Appending them again can never
    /// succeed, so this is a failure of the message, not of the storage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LogError::FrameTooLarge(_) | LogError::Wire(_))
    }
}

/// Errors raised by the event router while a command is being processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Event routed outside of a command transaction")]
    NotStarted,

    #[error("Event type {0} is reserved for admin events")]
    ReservedType(i32),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}

/// Fatal configuration problems, raised before the duty cycle starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing component: {0}")]
    Missing(&'static str),

    #[error("Input id {0} is reserved for admin commands")]
    ReservedInput(i32),

    #[error("Duplicate input id {0}")]
    DuplicateInput(i32),

    #[error("Command log and event log must be distinct")]
    SharedLog,

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Errors that end the duty cycle.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error in {step}: {source}")]
    Storage {
        step: &'static str,
        #[source]
        source: LogError,
    },
}

impl RuntimeError {
    pub fn storage(step: &'static str, source: LogError) -> Self {
        RuntimeError::Storage { step, source }
    }
}

pub type LogResult<T> = core::result::Result<T, LogError>;
pub type Result<T> = core::result::Result<T, RuntimeError>;
