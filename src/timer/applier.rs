// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Applies admin timer events to the registry.

use super::{lock, SharedTimers};
use crate::admin::AdminEvent;
use crate::error::WireError;
use crate::wire::RecordView;

pub struct AdminEventApplier {
    timers: SharedTimers,
}

impl AdminEventApplier {
    pub fn new(timers: SharedTimers) -> Self {
        Self { timers }
    }

    /// Mutates the registry for timer events. Returns the decoded event, or
    /// `None` when the record is not an admin event.
    pub fn apply(&mut self, event: RecordView<'_>) -> Result<Option<AdminEvent>, WireError> {
        let Some(admin) = AdminEvent::decode(event)? else {
            return Ok(None);
        };

        let mut timers = lock(&self.timers);
        match admin {
            AdminEvent::TimerStarted(timer) => {
                if timers.add(timer).is_some() {
                    tracing::warn!("Timer {} started twice", timer.id);
                }
            }
            AdminEvent::TimerStopped(timer) | AdminEvent::TimerExpired(timer) => {
                if timers.remove(timer.id).is_none() {
                    tracing::debug!("Timer {} was not registered", timer.id);
                }
            }
        }
        Ok(Some(admin))
    }

    pub fn timers(&self) -> &SharedTimers {
        &self.timers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Timer, Timers};
    use crate::wire::{encode_record, AdminKind, RecordHeader};

    fn event(kind: AdminKind, timer: Timer) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_record(&mut buf, &RecordHeader::new(0, 1, 0, kind.code(), 0), &timer.encode()).unwrap();
        buf
    }

    #[test]
    fn test_started_then_expired() {
        let timers = Timers::shared();
        let mut applier = AdminEventApplier::new(timers.clone());
        let timer = Timer::new(2, 8, 50);

        let started = event(AdminKind::TimerStarted, timer);
        applier.apply(RecordView::new(&started, 0).unwrap()).unwrap();
        assert_eq!(lock(&timers).get(8), Some(&timer));

        let expired = event(AdminKind::TimerExpired, timer);
        let applied = applier.apply(RecordView::new(&expired, 0).unwrap()).unwrap();
        assert_eq!(applied, Some(AdminEvent::TimerExpired(timer)));
        assert!(lock(&timers).is_empty());
    }
}
