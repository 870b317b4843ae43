// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Router
//!
//! Buffers the events a command produces and commits them as one frame.
//!
//! # Transaction
//! ```text
//! start(command) -> route(..)* -> commit(log) | rollback()
//! ```
//! Events carry the command's source and sequence, and a 0-based index in
//! routing order. Nothing is visible in the event log before `commit`.

use std::sync::Arc;

use crate::admin::AdminEvent;
use crate::error::{LogResult, RouteError};
use crate::log::MessageLog;
use crate::sequence::TimeSource;
use crate::timer::{lock, SharedTimers, Timer};
use crate::wire::{encode_record, RecordHeader, RecordKind, RecordView};

/// Position inside an open transaction, see [`EventRouter::mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RouteMark {
    len: usize,
    index: i32,
}

pub struct EventRouter {
    time: Arc<dyn TimeSource>,
    timers: SharedTimers,
    source: i32,
    sequence: i64,
    next_index: i32,
    active: bool,
    buffer: Vec<u8>,
}

impl EventRouter {
    pub fn new(time: Arc<dyn TimeSource>, timers: SharedTimers) -> Self {
        Self {
            time,
            timers,
            source: 0,
            sequence: 0,
            next_index: 0,
            active: false,
            buffer: Vec::new(),
        }
    }

    /// Opens a transaction for `command`, discarding anything left over.
    pub fn start(&mut self, command: RecordView<'_>) {
        self.source = command.source();
        self.sequence = command.sequence();
        self.next_index = 0;
        self.buffer.clear();
        self.active = true;
    }

    /// Buffers one application event.
    pub fn route(&mut self, kind: i32, payload: &[u8]) -> Result<(), RouteError> {
        if RecordKind::from_code(kind).is_admin() {
            return Err(RouteError::ReservedType(kind));
        }
        self.push(kind, payload)
    }

    pub(crate) fn route_admin(&mut self, event: AdminEvent) -> Result<(), RouteError> {
        self.push(event.kind().code(), &event.timer().encode())
    }

    fn push(&mut self, kind: i32, payload: &[u8]) -> Result<(), RouteError> {
        if !self.active {
            return Err(RouteError::NotStarted);
        }
        let header = RecordHeader::new(self.source, self.sequence, self.next_index, kind, self.time.now());
        encode_record(&mut self.buffer, &header, payload)?;
        self.next_index += 1;
        Ok(())
    }

    /// Routes `TIMER_STARTED` for a new timer and returns its id. The timer
    /// is registered once the event is applied.
    pub fn start_timer(&mut self, timer_type: i32, timeout: i64) -> Result<i64, RouteError> {
        if !self.active {
            return Err(RouteError::NotStarted);
        }
        let id = lock(&self.timers).next_id();
        self.route_admin(AdminEvent::TimerStarted(Timer::new(timer_type, id, timeout)))?;
        Ok(id)
    }

    /// Routes `TIMER_STOPPED` if timer `id` is registered. Returns false for
    /// unknown timers.
    pub fn stop_timer(&mut self, id: i64) -> Result<bool, RouteError> {
        match self.timer(id) {
            Some(timer) => {
                self.route_admin(AdminEvent::TimerStopped(timer))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Looks up a registered timer.
    pub fn timer(&self, id: i64) -> Option<Timer> {
        lock(&self.timers).get(id).copied()
    }

    /// Events buffered in the open transaction.
    pub fn pending(&self) -> usize {
        self.next_index.max(0) as usize
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Appends the buffered events as one frame and closes the transaction.
    /// Returns the number of events committed.
    pub fn commit(&mut self, log: &dyn MessageLog) -> LogResult<usize> {
        let count = self.pending();
        self.active = false;
        self.next_index = 0;
        if count == 0 {
            return Ok(0);
        }
        let result = log.append(&self.buffer);
        self.buffer.clear();
        result?;

        metrics::counter!("sequent_events_committed_total", count as u64);
        tracing::debug!(
            "Committed {} events for source={} sequence={}",
            count,
            self.source,
            self.sequence
        );
        Ok(count)
    }

    /// Marks the end of what has been routed so far.
    pub(crate) fn mark(&self) -> RouteMark {
        RouteMark {
            len: self.buffer.len(),
            index: self.next_index,
        }
    }

    /// Drops everything routed after `mark`, keeping the transaction open.
    pub(crate) fn rollback_to(&mut self, mark: RouteMark) {
        self.buffer.truncate(mark.len);
        self.next_index = mark.index;
    }

    /// Discards the buffered events and closes the transaction.
    pub fn rollback(&mut self) {
        if self.next_index > 0 {
            tracing::debug!(
                "Rolled back {} events for source={} sequence={}",
                self.next_index,
                self.source,
                self.sequence
            );
        }
        self.buffer.clear();
        self.next_index = 0;
        self.active = false;
    }
}
