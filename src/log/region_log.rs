// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Frame-Structured Log over a Region
//!
//! # Layout
//! ```text
//! [Frame][Frame][Frame]...[zeroes]
//! Frame = [records_len: u32][crc64: u64][record][record]...
//! ```
//!
//! The checksum covers the length field and the record bytes. A frame is the
//! unit of atomicity: recovery keeps every frame up to the first one that is
//! torn, fails its checksum or holds malformed records, and zeroes the rest
//! so that stale bytes can never resurface behind a newer, shorter frame.

use std::sync::{PoisonError, RwLock};

use byteorder::{ByteOrder, LittleEndian};
use crc64fast::Digest;

use super::region::{HeapRegion, Region};
use super::{advance, LogPosition, MessageLog, Outcome, PeekPollHandler};
use crate::config::{DEFAULT_REGION_CAPACITY, MAX_FRAME_LENGTH};
use crate::error::{LogError, LogResult};
use crate::wire::{validate_records, RecordView};

pub const FRAME_HEADER_LENGTH: usize = 4 + 8;

fn frame_checksum(len: u32, records: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(&len.to_le_bytes());
    digest.write(records);
    digest.sum64()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub offset: u64,
    pub len: usize,
    pub records: usize,
}

/// Result of walking the frames of a region.
#[derive(Clone, Debug, Default)]
pub struct FrameScan {
    pub frames: Vec<FrameInfo>,
    /// End of the last intact frame.
    pub valid_end: usize,
    /// Why the scan stopped before reaching zeroed space, if it did.
    pub stop_reason: Option<String>,
}

/// Walks the frames in `bytes` until zeroed space or the first bad frame.
pub fn scan_frames(bytes: &[u8]) -> FrameScan {
    let mut scan = FrameScan::default();
    let mut offset = 0usize;

    while offset + FRAME_HEADER_LENGTH <= bytes.len() {
        let len = LittleEndian::read_u32(&bytes[offset..]) as usize;
        if len == 0 {
            break;
        }
        if len > MAX_FRAME_LENGTH {
            scan.stop_reason = Some(format!("frame length {len} at offset {offset} exceeds limit"));
            break;
        }
        let records_start = offset + FRAME_HEADER_LENGTH;
        let end = records_start + len;
        if end > bytes.len() {
            scan.stop_reason = Some(format!("torn frame at offset {offset}"));
            break;
        }

        let records = &bytes[records_start..end];
        let stored = LittleEndian::read_u64(&bytes[offset + 4..]);
        let computed = frame_checksum(len as u32, records);
        if stored != computed {
            scan.stop_reason = Some(format!(
                "checksum mismatch at offset {offset}: stored {stored:#x}, computed {computed:#x}"
            ));
            break;
        }

        match validate_records(records) {
            Ok(count) => scan.frames.push(FrameInfo {
                offset: offset as u64,
                len,
                records: count,
            }),
            Err(e) => {
                scan.stop_reason = Some(format!("malformed records at offset {offset}: {e}"));
                break;
            }
        }
        offset = end;
    }

    scan.valid_end = offset;
    scan
}

struct RegionState<R> {
    region: R,
    committed: usize,
    frames: u64,
}

/// A [`MessageLog`] storing checksummed frames in a [`Region`].
///
/// Appends take the write lock; pollers take the read lock for the duration
/// of one handler call. A handler must therefore never append to the log it
/// is polling.
pub struct RegionLog<R: Region> {
    state: RwLock<RegionState<R>>,
}

pub type InMemoryLog = RegionLog<HeapRegion>;

impl InMemoryLog {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(RegionState {
                region: HeapRegion::with_capacity(DEFAULT_REGION_CAPACITY),
                committed: 0,
                frames: 0,
            }),
        }
    }
}

impl<R: Region> RegionLog<R> {
    /// Opens a log over a region that may already hold frames.
    pub fn recover(mut region: R) -> LogResult<Self> {
        let scan = scan_frames(region.bytes());
        let end = scan.valid_end;

        if let Some(reason) = &scan.stop_reason {
            tracing::warn!("Discarding log tail after offset {}: {}", end, reason);
        }

        // Zero any leftover bytes past the last intact frame.
        let dirty_end = region
            .bytes()
            .iter()
            .rposition(|b| *b != 0)
            .map(|last| last + 1)
            .unwrap_or(0);
        if dirty_end > end {
            region.bytes_mut()[end..dirty_end].fill(0);
            region.flush(end, dirty_end - end)?;
        }

        let frames = scan.frames.len() as u64;
        tracing::debug!("Recovered log region: {} frames, {} bytes", frames, end);

        Ok(Self {
            state: RwLock::new(RegionState {
                region,
                committed: end,
                frames,
            }),
        })
    }

    /// Bytes occupied by committed frames.
    pub fn committed_len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).committed
    }

    pub fn frame_count(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).frames
    }

    /// Walks the committed frames again, checking every checksum.
    pub fn scan(&self) -> FrameScan {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        scan_frames(&state.region.bytes()[..state.committed])
    }

    /// Position just past the last committed frame.
    pub fn end_position(&self) -> LogPosition {
        LogPosition::new(self.committed_len() as u64, 0)
    }
}

impl<R: Region> MessageLog for RegionLog<R> {
    fn append(&self, records: &[u8]) -> LogResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() > MAX_FRAME_LENGTH {
            return Err(LogError::FrameTooLarge(records.len()));
        }
        let count = validate_records(records)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let start = state.committed;
        let records_start = start + FRAME_HEADER_LENGTH;
        let end = records_start + records.len();
        state.region.ensure_capacity(end)?;

        let len = records.len() as u32;
        let bytes = state.region.bytes_mut();
        bytes[records_start..end].copy_from_slice(records);
        LittleEndian::write_u32(&mut bytes[start..], len);
        LittleEndian::write_u64(&mut bytes[start + 4..], frame_checksum(len, records));
        state.region.flush(start, end - start)?;

        state.committed = end;
        state.frames += 1;
        tracing::trace!("Appended frame at {}: {} records, {} bytes", start, count, len);
        Ok(())
    }

    fn peek_or_poll(
        &self,
        position: &mut LogPosition,
        handler: &mut dyn PeekPollHandler,
    ) -> LogResult<usize> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let frame = position.frame as usize;
        if frame >= state.committed {
            return Ok(0);
        }

        let bytes = &state.region.bytes()[..state.committed];
        if frame + FRAME_HEADER_LENGTH > bytes.len() {
            return Err(LogError::Corrupted {
                offset: position.frame,
                reason: "position is not at a frame boundary".into(),
            });
        }
        let len = LittleEndian::read_u32(&bytes[frame..]) as usize;
        let records_start = frame + FRAME_HEADER_LENGTH;
        let next = records_start + len;
        if len == 0 || next > bytes.len() {
            return Err(LogError::Corrupted {
                offset: position.frame,
                reason: format!("frame of {len} bytes extends past committed end"),
            });
        }

        let view = RecordView::new(&bytes[records_start..next], position.offset as usize)?;
        let record_len = view.encoded_len();
        if handler.on_message(view) == Outcome::Poll {
            advance(position, record_len, len, next as u64);
        }
        Ok(1)
    }
}
