// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Growable byte regions backing a log.

use crate::error::LogResult;

/// A contiguous, growable byte region.
///
/// The log decides what lives where; a region only has to hand out its
/// bytes, grow on request and make a byte range durable. The heap region
/// below serves tests and in-memory deployments, the persistence crate
/// provides a memory-mapped file region.
pub trait Region: Send + Sync {
    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    fn capacity(&self) -> usize {
        self.bytes().len()
    }

    /// Grows the region so that at least `required` bytes are addressable.
    /// New bytes are zeroed.
    fn ensure_capacity(&mut self, required: usize) -> LogResult<()>;

    /// Makes `bytes()[offset..offset + len]` durable.
    fn flush(&mut self, offset: usize, len: usize) -> LogResult<()>;
}

/// Region backed by a heap buffer. Flushing is a no-op.
#[derive(Debug, Default)]
pub struct HeapRegion {
    buf: Vec<u8>,
}

impl HeapRegion {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
        }
    }

    /// Wraps existing bytes, e.g. a log file read into memory for inspection.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl Region for HeapRegion {
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn ensure_capacity(&mut self, required: usize) -> LogResult<()> {
        if required > self.buf.len() {
            let grown = required.max(self.buf.len() * 2);
            self.buf.resize(grown, 0);
        }
        Ok(())
    }

    fn flush(&mut self, _offset: usize, _len: usize) -> LogResult<()> {
        Ok(())
    }
}
