// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Duty Cycle
//!
//! A single-threaded cooperative scheduler. Each cycle executes every step
//! once, in registration order, and hands the total amount of work done to
//! the idle strategy. No step may block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// One unit of work in the duty cycle.
pub trait Step: Send {
    fn name(&self) -> &'static str;

    /// Does whatever work is ready and returns how much was done. Zero
    /// means idle.
    fn execute(&mut self) -> Result<usize, RuntimeError>;
}

/// Reacts to the amount of work done in a cycle.
pub trait IdleStrategy: Send {
    fn idle(&mut self, work_count: usize);

    fn reset(&mut self) {}
}

/// Never yields the CPU.
#[derive(Clone, Copy, Debug, Default)]
pub struct BusySpin;

impl IdleStrategy for BusySpin {
    fn idle(&mut self, work_count: usize) {
        if work_count == 0 {
            std::hint::spin_loop();
        }
    }
}

/// Does nothing between cycles.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOp;

impl IdleStrategy for NoOp {
    fn idle(&mut self, _work_count: usize) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub max_spins: u32,
    pub max_yields: u32,
    pub min_park_micros: u64,
    pub max_park_micros: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_spins: 100,
            max_yields: 10,
            min_park_micros: 1,
            max_park_micros: 1_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BackoffState {
    Spinning(u32),
    Yielding(u32),
    Parking(Duration),
}

/// Spins, then yields, then parks with a park time that doubles up to a
/// ceiling. Any work resets it to spinning.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    state: BackoffState,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: BackoffState::Spinning(0),
        }
    }

    fn min_park(&self) -> Duration {
        Duration::from_micros(self.config.min_park_micros.max(1))
    }

    fn max_park(&self) -> Duration {
        Duration::from_micros(self.config.max_park_micros.max(self.config.min_park_micros).max(1))
    }

    /// Current park time, if the strategy has reached the parking phase.
    pub fn park_time(&self) -> Option<Duration> {
        match self.state {
            BackoffState::Parking(d) => Some(d),
            _ => None,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl IdleStrategy for Backoff {
    fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }

        self.state = match self.state {
            BackoffState::Spinning(n) if n < self.config.max_spins => {
                std::hint::spin_loop();
                BackoffState::Spinning(n + 1)
            }
            BackoffState::Spinning(_) => BackoffState::Yielding(0),
            BackoffState::Yielding(n) if n < self.config.max_yields => {
                std::thread::yield_now();
                BackoffState::Yielding(n + 1)
            }
            BackoffState::Yielding(_) => {
                let park = self.min_park();
                std::thread::park_timeout(park);
                BackoffState::Parking(park)
            }
            BackoffState::Parking(current) => {
                std::thread::park_timeout(current);
                BackoffState::Parking((current * 2).min(self.max_park()))
            }
        };
    }

    fn reset(&mut self) {
        self.state = BackoffState::Spinning(0);
    }
}

/// Idle strategy selection, as found in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IdleConfig {
    BusySpin,
    NoOp,
    Backoff(BackoffConfig),
}

impl Default for IdleConfig {
    fn default() -> Self {
        IdleConfig::Backoff(BackoffConfig::default())
    }
}

impl IdleConfig {
    pub fn build(self) -> Box<dyn IdleStrategy> {
        match self {
            IdleConfig::BusySpin => Box::new(BusySpin),
            IdleConfig::NoOp => Box::new(NoOp),
            IdleConfig::Backoff(config) => Box::new(Backoff::new(config)),
        }
    }
}

/// Shared stop flag, checked once per cycle.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct DutyCycle {
    steps: Vec<Box<dyn Step>>,
    idle: Box<dyn IdleStrategy>,
    stop: StopHandle,
    cycles: u64,
}

impl DutyCycle {
    pub fn new(idle: Box<dyn IdleStrategy>) -> Self {
        Self {
            steps: Vec::new(),
            idle,
            stop: StopHandle::new(),
            cycles: 0,
        }
    }

    pub fn add_step(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Executes every step once without idling and returns the work done.
    pub fn run_once(&mut self) -> Result<usize, RuntimeError> {
        let mut work = 0;
        for step in &mut self.steps {
            work += step.execute().map_err(|e| {
                tracing::error!("Step {} failed: {}", step.name(), e);
                e
            })?;
        }
        self.cycles += 1;
        Ok(work)
    }

    /// Runs cycles until stopped. Storage errors end the loop.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        tracing::info!("Duty cycle started with {} steps", self.steps.len());
        while !self.stop.is_stopped() {
            let work = self.run_once()?;
            self.idle.idle(work);
        }
        tracing::info!("Duty cycle stopped after {} cycles", self.cycles);
        Ok(())
    }

    /// Runs cycles until a cycle does no work, up to `max_cycles`. Returns
    /// the total work done.
    pub fn run_until_idle(&mut self, max_cycles: usize) -> Result<usize, RuntimeError> {
        let mut total = 0;
        for _ in 0..max_cycles {
            let work = self.run_once()?;
            if work == 0 {
                break;
            }
            total += work;
        }
        Ok(total)
    }
}
