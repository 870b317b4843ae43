// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Message Logs
//!
//! A message log is an append-only, ordered sequence of wire records.
//!
//! # Guarantees
//! - Append order == durability order == replay order
//! - One `append` call is one frame: all of its records become visible
//!   together or not at all
//! - A poller examines exactly one record per call and only advances when
//!   its handler answers [`Outcome::Poll`]
//!
//! Implementations only provide `append` and `peek_or_poll`; plain `poll`
//! is `peek_or_poll` with a handler that always polls.

pub mod region;
pub mod region_log;
pub mod tracking;

use std::sync::Arc;

use crate::error::LogResult;
use crate::wire::{encode_record, RecordHeader, RecordView, HEADER_LENGTH};

pub use region::{HeapRegion, Region};
pub use region_log::{scan_frames, FrameInfo, FrameScan, InMemoryLog, RegionLog, FRAME_HEADER_LENGTH};
pub use tracking::{AppendOutcome, SequencePolicy, SourceTrackingAppender};

/// Handler decision for a peeked record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Leave the record in place; the next call sees it again.
    Peek,
    /// Consume the record and advance the read position.
    Poll,
}

pub trait PeekPollHandler {
    fn on_message(&mut self, record: RecordView<'_>) -> Outcome;
}

pub trait MessageHandler {
    fn on_message(&mut self, record: RecordView<'_>);
}

impl<F> PeekPollHandler for F
where
    F: FnMut(RecordView<'_>) -> Outcome,
{
    fn on_message(&mut self, record: RecordView<'_>) -> Outcome {
        self(record)
    }
}

impl<F> MessageHandler for F
where
    F: FnMut(RecordView<'_>),
{
    fn on_message(&mut self, record: RecordView<'_>) {
        self(record)
    }
}

struct AlwaysPoll<'h>(&'h mut dyn MessageHandler);

impl PeekPollHandler for AlwaysPoll<'_> {
    fn on_message(&mut self, record: RecordView<'_>) -> Outcome {
        self.0.on_message(record);
        Outcome::Poll
    }
}

/// Read position inside a log: the frame that holds the next record and the
/// byte offset of that record within the frame's records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogPosition {
    pub frame: u64,
    pub offset: u64,
}

impl LogPosition {
    pub const START: LogPosition = LogPosition { frame: 0, offset: 0 };

    pub fn new(frame: u64, offset: u64) -> Self {
        Self { frame, offset }
    }
}

pub trait MessageLog: Send + Sync {
    /// Appends one or more contiguous encoded records as a single frame.
    /// An empty slice is a no-op.
    fn append(&self, records: &[u8]) -> LogResult<()>;

    /// Presents the record at `position` to `handler`. Returns 1 if a record
    /// was examined, 0 if the log holds nothing at `position`.
    fn peek_or_poll(
        &self,
        position: &mut LogPosition,
        handler: &mut dyn PeekPollHandler,
    ) -> LogResult<usize>;

    fn poll(&self, position: &mut LogPosition, handler: &mut dyn MessageHandler) -> LogResult<usize> {
        self.peek_or_poll(position, &mut AlwaysPoll(handler))
    }

    fn append_record(&self, header: &RecordHeader, payload: &[u8]) -> LogResult<()> {
        let mut buf = Vec::with_capacity(HEADER_LENGTH + payload.len());
        encode_record(&mut buf, header, payload)?;
        self.append(&buf)
    }
}

/// Moves `position` past the record just consumed from a frame of
/// `frame_records` bytes that ends at `next_frame`.
pub(crate) fn advance(position: &mut LogPosition, record_len: usize, frame_records: usize, next_frame: u64) {
    let offset = position.offset as usize + record_len;
    if offset >= frame_records {
        position.frame = next_frame;
        position.offset = 0;
    } else {
        position.offset = offset as u64;
    }
}

/// A consumer cursor over a shared log.
pub struct LogPoller {
    log: Arc<dyn MessageLog>,
    position: LogPosition,
}

impl LogPoller {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self::at(log, LogPosition::START)
    }

    pub fn at(log: Arc<dyn MessageLog>, position: LogPosition) -> Self {
        Self { log, position }
    }

    pub fn peek_or_poll(&mut self, handler: &mut dyn PeekPollHandler) -> LogResult<usize> {
        self.log.peek_or_poll(&mut self.position, handler)
    }

    pub fn poll(&mut self, handler: &mut dyn MessageHandler) -> LogResult<usize> {
        self.log.poll(&mut self.position, handler)
    }

    /// Polls until the log is drained and returns the number of records seen.
    pub fn drain(&mut self, handler: &mut dyn MessageHandler) -> LogResult<usize> {
        let mut total = 0;
        while self.poll(handler)? > 0 {
            total += 1;
        }
        Ok(total)
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    pub fn seek(&mut self, position: LogPosition) {
        self.position = position;
    }

    pub fn log(&self) -> &Arc<dyn MessageLog> {
        &self.log
    }
}

/// True when both handles point at the same log instance.
pub fn same_log(a: &Arc<dyn MessageLog>, b: &Arc<dyn MessageLog>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
