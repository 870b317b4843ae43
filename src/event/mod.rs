// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Pipeline
//!
//! Every committed event is, in order:
//! 1. published to the [`Output`]
//! 2. applied to the timer registry, if it is a timer event
//! 3. applied to the application state through the [`EventApplier`]
//!
//! Events are always consumed. Output failures and application failures are
//! reported separately and never affect each other.

pub mod handler;
pub mod loopback;

use crate::wire::RecordView;

pub use handler::EventHandler;
pub use loopback::{CommandLoopback, DiscardingLoopback, LogLoopback};

/// Application state updates.
///
/// Appliers must be deterministic: replaying the event log from the start
/// rebuilds the same state. The loopback lets an applier schedule follow-up
/// admin commands.
pub trait EventApplier: Send {
    fn on_event(&mut self, event: RecordView<'_>, loopback: &mut dyn CommandLoopback) -> anyhow::Result<()>;
}

impl<F> EventApplier for F
where
    F: FnMut(RecordView<'_>, &mut dyn CommandLoopback) -> anyhow::Result<()> + Send,
{
    fn on_event(&mut self, event: RecordView<'_>, loopback: &mut dyn CommandLoopback) -> anyhow::Result<()> {
        self(event, loopback)
    }
}

/// Publishes events to the outside world.
pub trait Output: Send {
    fn publish(&mut self, event: RecordView<'_>) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOutput;

impl Output for NoOutput {
    fn publish(&mut self, _event: RecordView<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}
