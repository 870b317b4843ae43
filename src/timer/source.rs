// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Timer trigger source.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::{lock, SharedTimers, Timer};
use crate::admin::AdminCommand;
use crate::command::ServerState;
use crate::config::ADMIN_SOURCE;
use crate::input::{Input, RawHandler};
use crate::sequence::TimeSource;
use crate::wire::AdminKind;

/// Admin input that turns expired timers into `TRIGGER_TIMER` commands.
///
/// A timer stays registered until its `TIMER_EXPIRED` event has been
/// applied, which can be several cycles after the trigger was sequenced.
/// Triggered ids are remembered until the timer leaves the registry so one
/// expiry yields one trigger.
///
/// Triggers are only issued while the node processes commands. A passive
/// node would skip them, so it forgets what it triggered and starts afresh
/// once it becomes active again.
pub struct TimerTriggerSource {
    timers: SharedTimers,
    time: Arc<dyn TimeSource>,
    state: Arc<dyn ServerState>,
    triggered: FxHashSet<i64>,
}

impl TimerTriggerSource {
    pub fn new(timers: SharedTimers, time: Arc<dyn TimeSource>, state: Arc<dyn ServerState>) -> Self {
        Self {
            timers,
            time,
            state,
            triggered: FxHashSet::default(),
        }
    }
}

impl Input for TimerTriggerSource {
    fn id(&self) -> i32 {
        ADMIN_SOURCE
    }

    fn poll(&mut self, handler: &mut RawHandler<'_>) -> usize {
        if !self.state.process_commands() {
            self.triggered.clear();
            return 0;
        }
        let now = self.time.now();

        // Collect under the lock, hand over after releasing it.
        let due: Vec<Timer> = {
            let timers = lock(&self.timers);
            self.triggered.retain(|id| timers.contains(*id));
            timers
                .expired(now)
                .filter(|t| !self.triggered.contains(&t.id))
                .copied()
                .collect()
        };

        for timer in &due {
            self.triggered.insert(timer.id);
            handler(
                AdminKind::TriggerTimer.code(),
                &AdminCommand::TriggerTimer(*timer).encode(),
            );
        }
        if !due.is_empty() {
            tracing::debug!("Triggered {} expired timers at {}", due.len(), now);
        }
        due.len()
    }
}
