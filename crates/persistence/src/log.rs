// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fs;
use std::path::Path;

use sequent_kernel::log::{HeapRegion, InMemoryLog, RegionLog};

use crate::error::Result;
use crate::region::MmapRegion;

/// A region log stored in a memory-mapped file.
pub type FileLog = RegionLog<MmapRegion>;

/// Opens the log at `path`, creating it with `capacity` bytes if missing.
/// A torn or corrupted tail is discarded and zeroed on disk.
pub fn open_log(path: impl AsRef<Path>, capacity: usize) -> Result<FileLog> {
    let region = MmapRegion::open(path.as_ref(), capacity)?;
    let log = RegionLog::recover(region)?;
    tracing::info!(
        "Opened log {}: {} frames",
        path.as_ref().display(),
        log.frame_count()
    );
    Ok(log)
}

/// Reads the log at `path` into memory without touching the file. Used by
/// offline tools.
pub fn load_log(path: impl AsRef<Path>) -> Result<InMemoryLog> {
    let bytes = fs::read(path)?;
    Ok(RegionLog::recover(HeapRegion::from_bytes(bytes))?)
}
