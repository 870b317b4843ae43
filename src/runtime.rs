// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Runtime assembly.
//!
//! [`RuntimeBuilder`] validates the configuration, recovers state from the
//! logs and wires the duty cycle:
//!
//! ```text
//! [extra steps] -> Sequencer -> CommandPoller (one command) -> EventPoller (drain)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::command::{
    AlwaysActive, CommandHandler, CommandPeekPollHandler, CommandProcessor, CommandSkipper,
    EventRouter, FailurePolicy, ServerState,
};
use crate::config::ADMIN_SOURCE;
use crate::duty::{Backoff, DutyCycle, IdleStrategy, Step, StopHandle};
use crate::error::{ConfigError, Result, RuntimeError};
use crate::event::{CommandLoopback, DiscardingLoopback, EventApplier, EventHandler, LogLoopback, NoOutput, Output};
use crate::exception::{ExceptionHandler, LoggingExceptionHandler};
use crate::input::Input;
use crate::log::{same_log, LogPoller, LogPosition, MessageLog, SequencePolicy, SourceTrackingAppender};
use crate::recovery::{self, RecoveryReport};
use crate::sequence::{SequenceGenerator, SystemTimeSource, TimeSource};
use crate::sequencer::Sequencer;
use crate::timer::{AdminEventApplier, SharedTimers, TimerTriggerSource, Timers};

/// Counters published by the pipeline steps.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    commands_processed: AtomicU64,
    commands_skipped: AtomicU64,
    events_applied: AtomicU64,
    command_frame: AtomicU64,
    command_offset: AtomicU64,
    event_frame: AtomicU64,
    event_offset: AtomicU64,
}

impl RuntimeStats {
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Acquire)
    }

    pub fn commands_skipped(&self) -> u64 {
        self.commands_skipped.load(Ordering::Acquire)
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Acquire)
    }

    pub fn command_position(&self) -> LogPosition {
        LogPosition::new(
            self.command_frame.load(Ordering::Acquire),
            self.command_offset.load(Ordering::Acquire),
        )
    }

    pub fn event_position(&self) -> LogPosition {
        LogPosition::new(
            self.event_frame.load(Ordering::Acquire),
            self.event_offset.load(Ordering::Acquire),
        )
    }

    fn set_command_position(&self, position: LogPosition) {
        self.command_frame.store(position.frame, Ordering::Release);
        self.command_offset.store(position.offset, Ordering::Release);
    }

    fn set_event_position(&self, position: LogPosition) {
        self.event_frame.store(position.frame, Ordering::Release);
        self.event_offset.store(position.offset, Ordering::Release);
    }
}

struct CommandPollerStep {
    poller: LogPoller,
    state: Arc<dyn ServerState>,
    handler: CommandHandler,
    skipper: CommandSkipper,
    stats: Arc<RuntimeStats>,
}

impl Step for CommandPollerStep {
    fn name(&self) -> &'static str {
        "command-poller"
    }

    fn execute(&mut self) -> Result<usize> {
        let mut dispatch = CommandPeekPollHandler {
            state: self.state.as_ref(),
            handler: &mut self.handler,
            skipper: &mut self.skipper,
        };
        let work = self
            .poller
            .peek_or_poll(&mut dispatch)
            .map_err(|e| RuntimeError::storage("command-poller", e))?;

        if let Some(e) = self.handler.take_fatal() {
            return Err(RuntimeError::storage("command-poller", e));
        }
        if work > 0 {
            self.stats
                .commands_processed
                .store(self.handler.processed(), Ordering::Release);
            self.stats
                .commands_skipped
                .store(self.skipper.skipped(), Ordering::Release);
            self.stats.set_command_position(self.poller.position());
        }
        Ok(work)
    }
}

struct EventPollerStep {
    poller: LogPoller,
    handler: EventHandler,
    stats: Arc<RuntimeStats>,
}

impl Step for EventPollerStep {
    fn name(&self) -> &'static str {
        "event-poller"
    }

    fn execute(&mut self) -> Result<usize> {
        let work = self
            .poller
            .drain(&mut self.handler)
            .map_err(|e| RuntimeError::storage("event-poller", e))?;
        if work > 0 {
            self.stats
                .events_applied
                .store(self.handler.applied(), Ordering::Release);
            self.stats.set_event_position(self.poller.position());
        }
        Ok(work)
    }
}

/// An assembled runtime, ready to run.
pub struct Runtime {
    duty: DutyCycle,
    timers: SharedTimers,
    stats: Arc<RuntimeStats>,
    recovery: RecoveryReport,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Runs the duty cycle until the stop handle fires or storage fails.
    pub fn run(&mut self) -> Result<()> {
        self.duty.run()
    }

    /// Executes one cycle and returns the work done.
    pub fn run_once(&mut self) -> Result<usize> {
        self.duty.run_once()
    }

    /// Executes cycles until one does no work, at most `max_cycles`.
    pub fn run_until_idle(&mut self, max_cycles: usize) -> Result<usize> {
        self.duty.run_until_idle(max_cycles)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.duty.stop_handle()
    }

    pub fn timers(&self) -> &SharedTimers {
        &self.timers
    }

    pub fn stats(&self) -> &Arc<RuntimeStats> {
        &self.stats
    }

    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }
}

pub struct RuntimeBuilder {
    command_log: Option<Arc<dyn MessageLog>>,
    event_log: Option<Arc<dyn MessageLog>>,
    processor: Option<Box<dyn CommandProcessor>>,
    applier: Option<Box<dyn EventApplier>>,
    inputs: Vec<Box<dyn Input>>,
    output: Box<dyn Output>,
    time: Arc<dyn TimeSource>,
    state: Arc<dyn ServerState>,
    exceptions: Arc<dyn ExceptionHandler>,
    failure_policy: FailurePolicy,
    sequence_policy: SequencePolicy,
    idle: Box<dyn IdleStrategy>,
    timers: Option<SharedTimers>,
    steps: Vec<Box<dyn Step>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            command_log: None,
            event_log: None,
            processor: None,
            applier: None,
            inputs: Vec::new(),
            output: Box::new(NoOutput),
            time: Arc::new(SystemTimeSource),
            state: Arc::new(AlwaysActive),
            exceptions: Arc::new(LoggingExceptionHandler),
            failure_policy: FailurePolicy::default(),
            sequence_policy: SequencePolicy::default(),
            idle: Box::new(Backoff::default()),
            timers: None,
            steps: Vec::new(),
        }
    }

    pub fn command_log(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.command_log = Some(log);
        self
    }

    pub fn event_log(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.event_log = Some(log);
        self
    }

    pub fn processor(mut self, processor: impl CommandProcessor + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    pub fn applier(mut self, applier: impl EventApplier + 'static) -> Self {
        self.applier = Some(Box::new(applier));
        self
    }

    pub fn input(mut self, input: impl Input + 'static) -> Self {
        self.inputs.push(Box::new(input));
        self
    }

    pub fn output(mut self, output: impl Output + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn server_state(mut self, state: Arc<dyn ServerState>) -> Self {
        self.state = state;
        self
    }

    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exceptions = handler;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn sequence_policy(mut self, policy: SequencePolicy) -> Self {
        self.sequence_policy = policy;
        self
    }

    pub fn idle_strategy(mut self, idle: Box<dyn IdleStrategy>) -> Self {
        self.idle = idle;
        self
    }

    /// Adds a step that runs at the start of every cycle, ahead of the
    /// sequencer. Used to drive replication.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Shares a timer registry with the caller, mainly for inspection.
    pub fn timers(mut self, timers: SharedTimers) -> Self {
        self.timers = Some(timers);
        self
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let command_log = self.command_log.as_ref().ok_or(ConfigError::Missing("command log"))?;
        let event_log = self.event_log.as_ref().ok_or(ConfigError::Missing("event log"))?;
        if self.processor.is_none() {
            return Err(ConfigError::Missing("command processor"));
        }
        if self.applier.is_none() {
            return Err(ConfigError::Missing("event applier"));
        }
        if same_log(command_log, event_log) {
            return Err(ConfigError::SharedLog);
        }
        if let FailurePolicy::Retry { max_attempts: 0 } = self.failure_policy {
            return Err(ConfigError::Invalid("retry policy needs at least one attempt".into()));
        }

        let mut seen = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let id = input.id();
            if id <= ADMIN_SOURCE {
                return Err(ConfigError::ReservedInput(id));
            }
            if seen.contains(&id) {
                return Err(ConfigError::DuplicateInput(id));
            }
            seen.push(id);
        }
        Ok(())
    }

    /// Validates the configuration, recovers from the logs and wires the
    /// duty cycle.
    pub fn build(self) -> Result<Runtime> {
        self.validate()?;

        let RuntimeBuilder {
            command_log,
            event_log,
            processor,
            applier,
            inputs,
            output,
            time,
            state,
            exceptions,
            failure_policy,
            sequence_policy,
            idle,
            timers,
            steps,
        } = self;
        let (Some(command_log), Some(event_log), Some(processor), Some(applier)) =
            (command_log, event_log, processor, applier)
        else {
            return Err(ConfigError::Missing("runtime component").into());
        };

        let appender = Arc::new(
            SourceTrackingAppender::recover(command_log.clone(), sequence_policy)
                .map_err(|e| RuntimeError::storage("recovery", e))?,
        );
        let admin_sequence = Arc::new(SequenceGenerator::after(appender.last_sequence(ADMIN_SOURCE)));
        let timers = timers.unwrap_or_else(Timers::shared);

        let mut events = EventHandler::new(
            Box::new(NoOutput),
            AdminEventApplier::new(timers.clone()),
            applier,
            Box::new(DiscardingLoopback),
            exceptions.clone(),
        );
        let report = recovery::recover(command_log.as_ref(), event_log.as_ref(), &mut events)
            .map_err(|e| RuntimeError::storage("recovery", e))?;
        let loopback: Box<dyn CommandLoopback> =
            Box::new(LogLoopback::new(appender.clone(), admin_sequence.clone(), time.clone()));
        events.replace_sinks(output, loopback);

        let mut sequencer = Sequencer::new(appender, admin_sequence, time.clone());
        sequencer.add_input(Box::new(TimerTriggerSource::new(
            timers.clone(),
            time.clone(),
            state.clone(),
        )))?;
        for input in inputs {
            sequencer.add_input(input)?;
        }

        let stats = Arc::new(RuntimeStats::default());
        stats.set_command_position(report.command_position);
        stats.set_event_position(report.event_position);
        let (command_poller, event_poller) = recovery::pollers(&report, command_log, event_log.clone());

        let commands = CommandPollerStep {
            poller: command_poller,
            state,
            handler: CommandHandler::new(
                processor,
                EventRouter::new(time.clone(), timers.clone()),
                event_log,
                exceptions,
                failure_policy,
            ),
            skipper: CommandSkipper::default(),
            stats: stats.clone(),
        };
        let events = EventPollerStep {
            poller: event_poller,
            handler: events,
            stats: stats.clone(),
        };

        let mut duty = DutyCycle::new(idle);
        for step in steps {
            duty.add_step(step);
        }
        duty.add_step(Box::new(sequencer));
        duty.add_step(Box::new(commands));
        duty.add_step(Box::new(events));

        tracing::info!(
            "Runtime assembled: {} events replayed, {} timers registered",
            report.events_replayed,
            crate::timer::lock(&timers).len()
        );

        Ok(Runtime {
            duty,
            timers,
            stats,
            recovery: report,
        })
    }
}
