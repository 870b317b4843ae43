// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command handlers.

use std::sync::Arc;

use super::{AdminCommandProcessor, CommandProcessor, EventRouter, FailurePolicy, ServerState};
use crate::error::LogError;
use crate::exception::ExceptionHandler;
use crate::log::{MessageLog, Outcome, PeekPollHandler};
use crate::wire::RecordView;

/// Runs business logic for one command and commits its events.
pub struct CommandHandler {
    processor: Box<dyn CommandProcessor>,
    admin: AdminCommandProcessor,
    router: EventRouter,
    event_log: Arc<dyn MessageLog>,
    exceptions: Arc<dyn ExceptionHandler>,
    policy: FailurePolicy,
    /// Failed attempts so far for the command at the head of the log.
    attempts: Option<((i32, i64), u32)>,
    fatal: Option<LogError>,
    processed: u64,
}

impl CommandHandler {
    pub fn new(
        processor: Box<dyn CommandProcessor>,
        router: EventRouter,
        event_log: Arc<dyn MessageLog>,
        exceptions: Arc<dyn ExceptionHandler>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            processor,
            admin: AdminCommandProcessor,
            router,
            event_log,
            exceptions,
            policy,
            attempts: None,
            fatal: None,
            processed: 0,
        }
    }

    fn on_command(&mut self, command: RecordView<'_>) -> Outcome {
        self.router.start(command);

        if command.kind().is_admin() {
            if let Err(e) = self.admin.process(command, &mut self.router) {
                self.router.rollback();
                self.exceptions.on_command_error(command, &e);
                return self.after_failure(command);
            }
        }

        // Timer events routed above are committed even when the application
        // fails, once the command is given up.
        let mark = self.router.mark();
        if let Err(e) = self.processor.on_command(command, &mut self.router) {
            self.exceptions.on_command_error(command, &e);
            let outcome = self.after_failure(command);
            if outcome == Outcome::Peek || !command.kind().is_admin() {
                self.router.rollback();
                return outcome;
            }
            self.router.rollback_to(mark);
            return self.commit(command, false);
        }

        self.commit(command, true)
    }

    fn commit(&mut self, command: RecordView<'_>, succeeded: bool) -> Outcome {
        match self.router.commit(self.event_log.as_ref()) {
            Ok(_) => {
                if succeeded {
                    self.attempts = None;
                    self.processed += 1;
                }
                Outcome::Poll
            }
            Err(e) if e.is_rejection() => {
                self.exceptions.on_command_error(command, &anyhow::Error::new(e));
                self.after_failure(command)
            }
            Err(e) => {
                tracing::error!(
                    "Event commit failed for source={} sequence={}: {}",
                    command.source(),
                    command.sequence(),
                    e
                );
                self.fatal = Some(e);
                Outcome::Peek
            }
        }
    }

    fn after_failure(&mut self, command: RecordView<'_>) -> Outcome {
        let max_attempts = match self.policy {
            FailurePolicy::Skip => return Outcome::Poll,
            FailurePolicy::Retry { max_attempts } => max_attempts,
        };

        let key = (command.source(), command.sequence());
        let attempts = match self.attempts {
            Some((k, n)) if k == key => n + 1,
            _ => 1,
        };

        if attempts < max_attempts {
            self.attempts = Some((key, attempts));
            tracing::debug!(
                "Retrying command source={} sequence={} (attempt {} of {})",
                key.0,
                key.1,
                attempts,
                max_attempts
            );
            Outcome::Peek
        } else {
            self.attempts = None;
            tracing::warn!(
                "Giving up on command source={} sequence={} after {} attempts",
                key.0,
                key.1,
                attempts
            );
            Outcome::Poll
        }
    }

    /// Takes the storage error raised by the last commit, if any.
    pub fn take_fatal(&mut self) -> Option<LogError> {
        self.fatal.take()
    }

    /// Commands processed successfully so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

/// Consumes commands without processing them.
#[derive(Debug, Default)]
pub struct CommandSkipper {
    skipped: u64,
}

impl CommandSkipper {
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl PeekPollHandler for CommandSkipper {
    fn on_message(&mut self, _command: RecordView<'_>) -> Outcome {
        self.skipped += 1;
        Outcome::Poll
    }
}

/// Chooses between [`CommandHandler`] and [`CommandSkipper`] per command.
pub struct CommandPeekPollHandler<'a> {
    pub state: &'a dyn ServerState,
    pub handler: &'a mut CommandHandler,
    pub skipper: &'a mut CommandSkipper,
}

impl PeekPollHandler for CommandPeekPollHandler<'_> {
    fn on_message(&mut self, command: RecordView<'_>) -> Outcome {
        if self.state.process_commands() {
            self.handler.on_command(command)
        } else {
            self.skipper.on_message(command)
        }
    }
}
