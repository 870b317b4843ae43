// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Admin commands and events.
//!
//! Every admin record carries a timer payload. `START_TIMER` leaves the id
//! at zero because the id is assigned while the command is processed, and
//! `STOP_TIMER` only fills in the id.

use crate::error::WireError;
use crate::timer::Timer;
use crate::wire::{AdminKind, RecordKind, RecordView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    TriggerTimer(Timer),
    StartTimer { timer_type: i32, timeout: i64 },
    StopTimer { id: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminEvent {
    TimerStarted(Timer),
    TimerStopped(Timer),
    TimerExpired(Timer),
}

impl AdminCommand {
    pub fn kind(&self) -> AdminKind {
        match self {
            AdminCommand::TriggerTimer(_) => AdminKind::TriggerTimer,
            AdminCommand::StartTimer { .. } => AdminKind::StartTimer,
            AdminCommand::StopTimer { .. } => AdminKind::StopTimer,
        }
    }

    pub fn encode(&self) -> [u8; crate::timer::TIMER_PAYLOAD_LENGTH] {
        let timer = match *self {
            AdminCommand::TriggerTimer(timer) => timer,
            AdminCommand::StartTimer {
                timer_type,
                timeout,
            } => Timer::new(timer_type, 0, timeout),
            AdminCommand::StopTimer { id } => Timer::new(0, id, 0),
        };
        timer.encode()
    }

    /// Decodes an admin command. Returns `None` for records that are not
    /// admin commands.
    pub fn decode(record: RecordView<'_>) -> Result<Option<Self>, WireError> {
        let kind = match record.kind() {
            RecordKind::Admin(kind) if kind.is_command() => kind,
            _ => return Ok(None),
        };
        let timer = Timer::decode(record.kind_code(), record.payload())?;
        Ok(Some(match kind {
            AdminKind::TriggerTimer => AdminCommand::TriggerTimer(timer),
            AdminKind::StartTimer => AdminCommand::StartTimer {
                timer_type: timer.timer_type,
                timeout: timer.timeout,
            },
            _ => AdminCommand::StopTimer { id: timer.id },
        }))
    }
}

impl AdminEvent {
    pub fn kind(&self) -> AdminKind {
        match self {
            AdminEvent::TimerStarted(_) => AdminKind::TimerStarted,
            AdminEvent::TimerStopped(_) => AdminKind::TimerStopped,
            AdminEvent::TimerExpired(_) => AdminKind::TimerExpired,
        }
    }

    pub fn timer(&self) -> Timer {
        match *self {
            AdminEvent::TimerStarted(t) | AdminEvent::TimerStopped(t) | AdminEvent::TimerExpired(t) => t,
        }
    }

    /// Decodes an admin event. Returns `None` for records that are not admin
    /// events.
    pub fn decode(record: RecordView<'_>) -> Result<Option<Self>, WireError> {
        let kind = match record.kind() {
            RecordKind::Admin(kind) if !kind.is_command() => kind,
            _ => return Ok(None),
        };
        let timer = Timer::decode(record.kind_code(), record.payload())?;
        Ok(Some(match kind {
            AdminKind::TimerStarted => AdminEvent::TimerStarted(timer),
            AdminKind::TimerStopped => AdminEvent::TimerStopped(timer),
            _ => AdminEvent::TimerExpired(timer),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_record, RecordHeader};

    fn record(kind: AdminKind, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_record(&mut buf, &RecordHeader::new(0, 1, 0, kind.code(), 0), payload).unwrap();
        buf
    }

    #[test]
    fn test_start_timer_command_decodes() {
        let command = AdminCommand::StartTimer {
            timer_type: 3,
            timeout: 1_000,
        };
        let buf = record(command.kind(), &command.encode());
        let view = RecordView::new(&buf, 0).unwrap();
        assert_eq!(AdminCommand::decode(view).unwrap(), Some(command));
        assert_eq!(AdminEvent::decode(view).unwrap(), None);
    }

    #[test]
    fn test_application_record_is_not_admin() {
        let mut buf = Vec::new();
        encode_record(&mut buf, &RecordHeader::new(1, 1, 0, 5, 0), b"hello").unwrap();
        let view = RecordView::new(&buf, 0).unwrap();
        assert_eq!(AdminCommand::decode(view).unwrap(), None);
    }

    #[test]
    fn test_malformed_admin_payload_is_an_error() {
        let buf = record(AdminKind::TimerExpired, b"short");
        let view = RecordView::new(&buf, 0).unwrap();
        assert!(AdminEvent::decode(view).is_err());
    }
}
