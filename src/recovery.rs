// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Crash Recovery
//!
//! The event log is the canonical truth. Recovery:
//! - Replays every event through the admin and application appliers, which
//!   rebuilds the timer registry and the application state
//! - Positions the event poller at the end of the event log
//! - Positions the command poller right after the command that produced the
//!   last event
//!
//! Commands after that point produced no events before the crash. They are
//! processed again, which is deterministic because they left no trace.
//! Sequence generators are seeded separately from the command log by the
//! source-tracking appender.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use crate::error::LogResult;
use crate::event::EventHandler;
use crate::log::{LogPoller, LogPosition, MessageHandler, MessageLog};
use crate::wire::RecordView;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub events_replayed: usize,
    pub commands_scanned: usize,
    pub event_position: LogPosition,
    pub command_position: LogPosition,
    /// (source, sequence) of the command that produced the last event.
    pub last_command: Option<(i32, i64)>,
}

/// Replays the event log through `handler` and locates the resume points.
///
/// `handler` must be wired with a discarding loopback and no output: the
/// commands an applier scheduled are already in the command log, and the
/// events were already published.
pub fn recover(
    command_log: &dyn MessageLog,
    event_log: &dyn MessageLog,
    handler: &mut EventHandler,
) -> LogResult<RecoveryReport> {
    let start = Instant::now();
    let mut report = RecoveryReport::default();

    let mut event_position = LogPosition::START;
    let mut last: Option<(i32, i64)> = None;
    let mut replay = |event: RecordView<'_>| {
        last = Some((event.source(), event.sequence()));
        handler.on_message(event);
    };
    while event_log.poll(&mut event_position, &mut replay)? > 0 {
        report.events_replayed += 1;
    }
    report.event_position = event_position;
    report.last_command = last;

    let (scanned, position) = locate_command(command_log, last)?;
    report.commands_scanned = scanned;
    report.command_position = position;

    metrics::histogram!("sequent_replay_duration_seconds", start.elapsed().as_secs_f64());
    tracing::info!(
        "Recovered {} events; resuming commands at {:?} after scanning {}",
        report.events_replayed,
        report.command_position,
        report.commands_scanned
    );
    Ok(report)
}

/// Finds the position just past the command identified by `last`. Without a
/// last command every logged command is still pending.
fn locate_command(log: &dyn MessageLog, last: Option<(i32, i64)>) -> LogResult<(usize, LogPosition)> {
    let Some(target) = last else {
        return Ok((0, LogPosition::START));
    };

    let mut position = LogPosition::START;
    let mut found: Option<LogPosition> = None;
    let mut scanned = 0usize;
    let matches = Cell::new(false);
    let mut check = |command: RecordView<'_>| {
        matches.set((command.source(), command.sequence()) == target);
    };
    while log.poll(&mut position, &mut check)? > 0 {
        scanned += 1;
        if matches.get() {
            found = Some(position);
        }
    }

    match found {
        Some(after) => Ok((scanned, after)),
        None => {
            tracing::warn!(
                "Command source={} sequence={} behind the last event is not in the command log; \
                 resuming after the last logged command",
                target.0,
                target.1
            );
            Ok((scanned, position))
        }
    }
}

/// Resume cursors built from a report.
pub fn pollers(
    report: &RecoveryReport,
    command_log: Arc<dyn MessageLog>,
    event_log: Arc<dyn MessageLog>,
) -> (LogPoller, LogPoller) {
    (
        LogPoller::at(command_log, report.command_position),
        LogPoller::at(event_log, report.event_position),
    )
}
