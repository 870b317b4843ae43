// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command loopback.

use std::sync::Arc;

use crate::admin::AdminCommand;
use crate::config::ADMIN_SOURCE;
use crate::error::LogResult;
use crate::log::{AppendOutcome, SourceTrackingAppender};
use crate::sequence::{SequenceGenerator, TimeSource};

/// Lets an event applier enqueue admin commands into the command log,
/// outside of the regular inputs.
pub trait CommandLoopback: Send {
    fn enqueue(&mut self, command: AdminCommand) -> LogResult<()>;
}

/// Appends admin commands synchronously, stamped with the admin source, the
/// next admin sequence and the current time.
pub struct LogLoopback {
    appender: Arc<SourceTrackingAppender>,
    sequence: Arc<SequenceGenerator>,
    time: Arc<dyn TimeSource>,
}

impl LogLoopback {
    pub fn new(
        appender: Arc<SourceTrackingAppender>,
        sequence: Arc<SequenceGenerator>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            appender,
            sequence,
            time,
        }
    }
}

impl CommandLoopback for LogLoopback {
    fn enqueue(&mut self, command: AdminCommand) -> LogResult<()> {
        let outcome = self.appender.append_next(
            ADMIN_SOURCE,
            &self.sequence,
            command.kind().code(),
            self.time.now(),
            &command.encode(),
        )?;
        if outcome == AppendOutcome::Duplicate {
            tracing::warn!("Loopback command {:?} dropped as duplicate", command);
        }
        Ok(())
    }
}

/// Drops every command. Used while replaying, where the commands an applier
/// schedules are already in the command log.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardingLoopback;

impl CommandLoopback for DiscardingLoopback {
    fn enqueue(&mut self, _command: AdminCommand) -> LogResult<()> {
        Ok(())
    }
}
