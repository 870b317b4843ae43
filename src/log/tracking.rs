// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Source-tracking appender.
//!
//! Remembers the last sequence appended for every source so that a retried
//! delivery of the same (source, sequence) lands in the log exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{LogPosition, MessageLog};
use crate::config::MAX_FRAME_LENGTH;
use crate::error::{LogError, LogResult};
use crate::sequence::SequenceGenerator;
use crate::wire::{RecordHeader, RecordView, HEADER_LENGTH};

/// What to do with an append whose sequence is not after the last one seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePolicy {
    /// Drop it silently. Used as an idempotence guard for redelivery.
    #[default]
    DropStale,
    /// Reject it with [`LogError::SequenceViolation`].
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Duplicate,
}

pub struct SourceTrackingAppender {
    log: Arc<dyn MessageLog>,
    policy: SequencePolicy,
    last: Mutex<FxHashMap<i32, i64>>,
}

impl SourceTrackingAppender {
    pub fn new(log: Arc<dyn MessageLog>, policy: SequencePolicy) -> Self {
        Self {
            log,
            policy,
            last: Mutex::new(FxHashMap::default()),
        }
    }

    /// Creates the appender and seeds it with the highest sequence per
    /// source already present in `log`.
    pub fn recover(log: Arc<dyn MessageLog>, policy: SequencePolicy) -> LogResult<Self> {
        let appender = Self::new(log, policy);
        let seen = appender.seed()?;
        tracing::debug!("Source tracking seeded from {} logged commands", seen);
        Ok(appender)
    }

    fn seed(&self) -> LogResult<usize> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut position = LogPosition::START;
        let mut seen = 0usize;
        let mut track = |record: RecordView<'_>| {
            let entry = last.entry(record.source()).or_insert(i64::MIN);
            *entry = (*entry).max(record.sequence());
            seen += 1;
        };
        while self.log.poll(&mut position, &mut track)? > 0 {}
        Ok(seen)
    }

    /// Appends one record unless its sequence is stale for its source.
    ///
    /// The check and the append happen under one lock, so concurrent
    /// producers cannot interleave between them.
    pub fn append_record(&self, header: &RecordHeader, payload: &[u8]) -> LogResult<AppendOutcome> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        self.append_locked(&mut last, header, payload)
    }

    /// Stamps a record with the next value of `sequence` and appends it.
    ///
    /// The sequence is taken under the appender lock, so producers sharing a
    /// generator reach the log in sequence order. Oversized payloads are
    /// refused before a sequence is consumed.
    pub fn append_next(
        &self,
        source: i32,
        sequence: &SequenceGenerator,
        kind: i32,
        time: i64,
        payload: &[u8],
    ) -> LogResult<AppendOutcome> {
        let len = HEADER_LENGTH + payload.len();
        if len > MAX_FRAME_LENGTH {
            return Err(LogError::FrameTooLarge(len));
        }
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let header = RecordHeader::new(source, sequence.next(), 0, kind, time);
        self.append_locked(&mut last, &header, payload)
    }

    fn append_locked(
        &self,
        last: &mut FxHashMap<i32, i64>,
        header: &RecordHeader,
        payload: &[u8],
    ) -> LogResult<AppendOutcome> {
        if let Some(&previous) = last.get(&header.source) {
            if header.sequence <= previous {
                return match self.policy {
                    SequencePolicy::DropStale => {
                        tracing::debug!(
                            "Dropping duplicate command source={} sequence={} (last {})",
                            header.source,
                            header.sequence,
                            previous
                        );
                        Ok(AppendOutcome::Duplicate)
                    }
                    SequencePolicy::Strict => Err(LogError::SequenceViolation {
                        source_id: header.source,
                        sequence: header.sequence,
                        last: previous,
                    }),
                };
            }
            if header.sequence > previous.saturating_add(1) {
                tracing::warn!(
                    "Sequence gap for source {}: {} follows {}",
                    header.source,
                    header.sequence,
                    previous
                );
            }
        }

        self.log.append_record(header, payload)?;
        last.insert(header.source, header.sequence);
        Ok(AppendOutcome::Appended)
    }

    pub fn last_sequence(&self, source: i32) -> Option<i64> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .copied()
    }

    pub fn policy(&self) -> SequencePolicy {
        self.policy
    }

    pub fn log(&self) -> &Arc<dyn MessageLog> {
        &self.log
    }
}
