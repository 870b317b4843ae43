// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! File-backed storage for the sequent kernel: memory-mapped log regions and
//! a durable Raft log.

pub mod error;
pub mod log;
pub mod raft_file;
pub mod region;

pub use error::{PersistenceError, Result};
pub use log::{load_log, open_log, FileLog};
pub use raft_file::FileRaftLog;
pub use region::MmapRegion;
