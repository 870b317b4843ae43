// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Demo application: a replicated counter.
//!
//! Commands
//! - `add <n>`: adds `n`, rejected on overflow
//! - `reset`: sets the counter to zero
//! - `reset-in <ms>`: schedules a reset through a runtime timer
//!
//! The counter only changes when events are applied, so replaying the event
//! log rebuilds it.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use sequent_kernel::admin::AdminEvent;
use sequent_kernel::command::EventRouter;
use sequent_kernel::event::CommandLoopback;
use sequent_kernel::{RecordKind, RecordView};
use serde::Serialize;

use crate::errors::{NodeError, Result};

pub const ADD: i32 = 1;
pub const RESET: i32 = 2;
pub const RESET_IN: i32 = 3;

pub const ADDED: i32 = 100;
pub const WAS_RESET: i32 = 101;

/// Timer type of a scheduled reset.
pub const RESET_TIMER: i32 = 1;

#[derive(Debug, Default)]
pub struct CounterState {
    value: AtomicI64,
    applied: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub value: i64,
    pub applied: u64,
}

impl CounterState {
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            value: self.value(),
            applied: self.applied.load(Ordering::Acquire),
        }
    }
}

fn read_i64(payload: &[u8]) -> anyhow::Result<i64> {
    let bytes: [u8; 8] = payload
        .try_into()
        .with_context(|| format!("expected an 8 byte integer, got {} bytes", payload.len()))?;
    Ok(i64::from_le_bytes(bytes))
}

/// Validates commands against the applied state and routes their events.
pub struct CounterProcessor {
    state: Arc<CounterState>,
}

impl CounterProcessor {
    pub fn new(state: Arc<CounterState>) -> Self {
        Self { state }
    }
}

impl sequent_kernel::command::CommandProcessor for CounterProcessor {
    fn on_command(&mut self, command: RecordView<'_>, router: &mut EventRouter) -> anyhow::Result<()> {
        match command.kind() {
            RecordKind::Application(ADD) => {
                let delta = read_i64(command.payload())?;
                if self.state.value().checked_add(delta).is_none() {
                    bail!("adding {} would overflow the counter", delta);
                }
                router.route(ADDED, &delta.to_le_bytes())?;
            }
            RecordKind::Application(RESET) => router.route(WAS_RESET, &[])?,
            RecordKind::Application(RESET_IN) => {
                let delay = read_i64(command.payload())?;
                if delay < 0 {
                    bail!("negative reset delay {}", delay);
                }
                let id = router.start_timer(RESET_TIMER, command.time().saturating_add(delay))?;
                tracing::debug!("Scheduled reset timer {} in {} ms", id, delay);
            }
            // Timer triggers reach the application after the runtime has
            // handled them; nothing to add.
            RecordKind::Admin(_) => {}
            other => bail!("unknown command type {}", other),
        }
        Ok(())
    }
}

/// Applies counter events, including expiries of scheduled resets.
pub struct CounterApplier {
    state: Arc<CounterState>,
}

impl CounterApplier {
    pub fn new(state: Arc<CounterState>) -> Self {
        Self { state }
    }
}

impl sequent_kernel::event::EventApplier for CounterApplier {
    fn on_event(&mut self, event: RecordView<'_>, _loopback: &mut dyn CommandLoopback) -> anyhow::Result<()> {
        match event.kind() {
            RecordKind::Application(ADDED) => {
                let delta = read_i64(event.payload())?;
                self.state.value.fetch_add(delta, Ordering::AcqRel);
            }
            RecordKind::Application(WAS_RESET) => self.state.value.store(0, Ordering::Release),
            RecordKind::Admin(_) => match AdminEvent::decode(event)? {
                Some(AdminEvent::TimerExpired(timer)) if timer.timer_type == RESET_TIMER => {
                    self.state.value.store(0, Ordering::Release)
                }
                _ => return Ok(()),
            },
            _ => return Ok(()),
        }
        self.state.applied.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Parses a text command such as `add 5` into (type, payload).
pub fn parse_command(line: &str) -> Result<(i32, Vec<u8>)> {
    let mut parts = line.split_whitespace();
    let verb = parts
        .next()
        .ok_or_else(|| NodeError::InvalidInput("empty command".into()))?;
    let number = |arg: Option<&str>| -> Result<i64> {
        let arg = arg.ok_or_else(|| NodeError::InvalidInput(format!("{verb} needs a number")))?;
        arg.parse::<i64>()
            .map_err(|e| NodeError::InvalidInput(format!("bad number {arg:?}: {e}")))
    };

    let command = match verb {
        "add" => (ADD, number(parts.next())?.to_le_bytes().to_vec()),
        "reset" => (RESET, Vec::new()),
        "reset-in" => (RESET_IN, number(parts.next())?.to_le_bytes().to_vec()),
        other => return Err(NodeError::InvalidInput(format!("unknown command {other:?}"))),
    };
    if parts.next().is_some() {
        return Err(NodeError::InvalidInput(format!("trailing arguments in {line:?}")));
    }
    Ok(command)
}
