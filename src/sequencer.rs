// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequencer
//!
//! Once per duty cycle the sequencer polls every input, stamps each raw
//! message with {source, next sequence of that source, now} and appends it
//! to the command log. It is the only origin of new command records apart
//! from the command loopback.
//!
//! # Invariants
//! - Per input, poll order is log order
//! - Admin inputs share the admin sequence space, which never overlaps a
//!   user source because the admin source id is reserved
//! - Inputs are visited round-robin, once per cycle
//! - A message the log refuses (oversized, malformed) is dropped and
//!   reported; only storage failures stop the cycle

use std::sync::Arc;

use crate::config::ADMIN_SOURCE;
use crate::duty::Step;
use crate::error::{ConfigError, LogError, RuntimeError};
use crate::input::Input;
use crate::log::{AppendOutcome, SourceTrackingAppender};
use crate::sequence::{SequenceGenerator, TimeSource};

struct Source {
    input: Box<dyn Input>,
    sequence: Arc<SequenceGenerator>,
}

pub struct Sequencer {
    sources: Vec<Source>,
    admin_sequence: Arc<SequenceGenerator>,
    time: Arc<dyn TimeSource>,
    appender: Arc<SourceTrackingAppender>,
}

impl Sequencer {
    pub fn new(
        appender: Arc<SourceTrackingAppender>,
        admin_sequence: Arc<SequenceGenerator>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            sources: Vec::new(),
            admin_sequence,
            time,
            appender,
        }
    }

    /// Registers an input. Inputs with the admin id share the admin
    /// sequence; every other id must be unique. Sequences continue after the
    /// last one the command log holds for that source.
    pub fn add_input(&mut self, input: Box<dyn Input>) -> Result<(), ConfigError> {
        let id = input.id();
        let sequence = if id == ADMIN_SOURCE {
            self.admin_sequence.clone()
        } else {
            if self.sources.iter().any(|s| s.input.id() == id) {
                return Err(ConfigError::DuplicateInput(id));
            }
            Arc::new(SequenceGenerator::after(self.appender.last_sequence(id)))
        };
        self.sources.push(Source { input, sequence });
        Ok(())
    }

    pub fn input_count(&self) -> usize {
        self.sources.len()
    }

    /// Polls each input once and returns the number of messages sequenced.
    pub fn sequence_all(&mut self) -> Result<usize, LogError> {
        let mut total = 0;
        for source in &mut self.sources {
            let id = source.input.id();
            let sequence = &source.sequence;
            let time = &self.time;
            let appender = &self.appender;
            let mut failure: Option<LogError> = None;

            let polled = source.input.poll(&mut |kind, payload: &[u8]| {
                if failure.is_some() {
                    return;
                }
                match appender.append_next(id, sequence, kind, time.now(), payload) {
                    Ok(AppendOutcome::Appended) => {}
                    Ok(AppendOutcome::Duplicate) => {
                        tracing::debug!("Sequencer: duplicate from source {} ignored", id)
                    }
                    Err(e) if e.is_rejection() => {
                        metrics::increment_counter!("sequent_commands_rejected_total");
                        tracing::error!("Sequencer: dropped message type {} from source {}: {}", kind, id, e);
                    }
                    Err(e) => failure = Some(e),
                }
            });

            if let Some(e) = failure {
                tracing::error!("Sequencer: append failed for source {}: {}", id, e);
                return Err(e);
            }
            total += polled;
        }

        if total > 0 {
            metrics::counter!("sequent_commands_sequenced_total", total as u64);
        }
        Ok(total)
    }
}

impl Step for Sequencer {
    fn name(&self) -> &'static str {
        "sequencer"
    }

    fn execute(&mut self) -> Result<usize, RuntimeError> {
        self.sequence_all()
            .map_err(|e| RuntimeError::storage(self.name(), e))
    }
}
