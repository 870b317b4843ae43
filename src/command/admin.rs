// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Built-in processing of admin commands.

use super::router::EventRouter;
use crate::admin::{AdminCommand, AdminEvent};
use crate::wire::RecordView;

/// Turns timer commands into timer events.
///
/// A trigger is stale when the timer was stopped, or already expired, after
/// the trigger was sequenced. Stale triggers route nothing.
#[derive(Debug, Default)]
pub struct AdminCommandProcessor;

impl AdminCommandProcessor {
    pub fn process(&mut self, command: RecordView<'_>, router: &mut EventRouter) -> anyhow::Result<()> {
        let Some(admin) = AdminCommand::decode(command)? else {
            return Ok(());
        };

        match admin {
            AdminCommand::TriggerTimer(trigger) => match router.timer(trigger.id) {
                Some(timer) => router.route_admin(AdminEvent::TimerExpired(timer))?,
                None => tracing::debug!("Ignoring stale trigger for timer {}", trigger.id),
            },
            AdminCommand::StartTimer {
                timer_type,
                timeout,
            } => {
                router.start_timer(timer_type, timeout)?;
            }
            AdminCommand::StopTimer { id } => {
                if !router.stop_timer(id)? {
                    tracing::debug!("Stop requested for unknown timer {}", id);
                }
            }
        }
        Ok(())
    }
}
