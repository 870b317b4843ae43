// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command Pipeline
//!
//! The command poller peeks one command per duty cycle. What happens next
//! depends on the server state:
//!
//! - active: [`CommandHandler`] runs admin processing and the application
//!   [`CommandProcessor`], then commits the routed events as one frame
//! - passive: [`CommandSkipper`] consumes the command without running any
//!   business logic, since the events already arrive through replication
//!
//! A processing failure never leaks partial events: the router is rolled
//! back and the configured [`FailurePolicy`] decides between moving on and
//! retrying.

pub mod admin;
pub mod handler;
pub mod router;

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::wire::RecordView;

pub use admin::AdminCommandProcessor;
pub use handler::{CommandHandler, CommandPeekPollHandler, CommandSkipper};
pub use router::EventRouter;

/// Application business logic for commands.
pub trait CommandProcessor: Send {
    /// Validates `command` and routes the resulting events. An error rolls
    /// back everything this processor routed for the command. Admin commands
    /// reach the processor after their timer events were routed; those are
    /// committed once the command is given up.
    fn on_command(&mut self, command: RecordView<'_>, router: &mut EventRouter) -> anyhow::Result<()>;
}

impl<F> CommandProcessor for F
where
    F: FnMut(RecordView<'_>, &mut EventRouter) -> anyhow::Result<()> + Send,
{
    fn on_command(&mut self, command: RecordView<'_>, router: &mut EventRouter) -> anyhow::Result<()> {
        self(command, router)
    }
}

/// Whether this instance processes commands (leader / active) or only
/// consumes them (replica / passive). Read before every command.
pub trait ServerState: Send + Sync {
    fn process_commands(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysActive;

impl ServerState for AlwaysActive {
    fn process_commands(&self) -> bool {
        true
    }
}

/// A switchable server state, flipped by a consensus layer on role change.
#[derive(Debug)]
pub struct SharedServerState {
    active: AtomicBool,
}

impl SharedServerState {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

impl ServerState for SharedServerState {
    fn process_commands(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// What happens to a command whose processing failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FailurePolicy {
    /// Consume the failed command (at-most-once).
    #[default]
    Skip,
    /// Leave the command in place and try again next cycle, up to
    /// `max_attempts` attempts in total, then consume it.
    Retry { max_attempts: u32 },
}
