// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::io;

use sequent_kernel::error::LogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid magic bytes in header")]
    InvalidMagic,
    #[error("Checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        expected: u64,
        found: u64,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
    #[error("Log error: {0}")]
    Log(#[from] LogError),
}

impl From<PersistenceError> for LogError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::IoError(e) => LogError::Io(e),
            PersistenceError::Log(e) => e,
            other => LogError::Corrupted {
                offset: 0,
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
