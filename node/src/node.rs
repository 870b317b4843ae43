// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Node assembly: file-backed logs, the counter application and a channel
//! input wired into one runtime.

use std::sync::Arc;

use sequent_kernel::duty::StopHandle;
use sequent_kernel::recovery::RecoveryReport;
use sequent_kernel::runtime::{Runtime, RuntimeStats};
use sequent_persistence::open_log;

use crate::config::NodeConfig;
use crate::counter::{CounterApplier, CounterProcessor, CounterState};
use crate::errors::Result;
use crate::input::{ChannelInput, CommandSender};

pub struct Node {
    runtime: Runtime,
    sender: CommandSender,
    counter: Arc<CounterState>,
}

impl Node {
    /// Opens (or creates) the logs under `config.data_dir` and recovers the
    /// counter from the event log.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let command_log = open_log(config.command_log_path(), config.region_capacity)?;
        let event_log = open_log(config.event_log_path(), config.region_capacity)?;
        let (input, sender) = ChannelInput::new(config.input_id, config.channel_capacity, config.input_batch);
        let counter = Arc::new(CounterState::default());

        let runtime = Runtime::builder()
            .command_log(Arc::new(command_log))
            .event_log(Arc::new(event_log))
            .processor(CounterProcessor::new(counter.clone()))
            .applier(CounterApplier::new(counter.clone()))
            .input(input)
            .failure_policy(config.failure_policy)
            .sequence_policy(config.sequence_policy)
            .idle_strategy(config.idle.build())
            .build()?;

        let report = runtime.recovery();
        tracing::info!(
            "Node recovered: {} events replayed, counter at {}, resuming commands at {:?}",
            report.events_replayed,
            counter.value(),
            report.command_position
        );

        Ok(Self {
            runtime,
            sender,
            counter,
        })
    }

    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn counter(&self) -> Arc<CounterState> {
        self.counter.clone()
    }

    pub fn stats(&self) -> Arc<RuntimeStats> {
        self.runtime.stats().clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.runtime.stop_handle()
    }

    pub fn recovery(&self) -> &RecoveryReport {
        self.runtime.recovery()
    }

    /// Runs cycles until one does no work. For tests and tools.
    pub fn run_until_idle(&mut self, max_cycles: usize) -> Result<usize> {
        Ok(self.runtime.run_until_idle(max_cycles)?)
    }

    /// Runs the duty cycle on the calling thread until stopped.
    pub fn run(mut self) -> Result<()> {
        self.runtime.run()?;
        tracing::info!("Node stopped at counter {}", self.counter.value());
        Ok(())
    }
}
