// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record type tags.
//!
//! Negative codes are reserved for the runtime's admin commands and events.
//! Non-negative codes belong to the application and are opaque here.

pub const TRIGGER_TIMER: i32 = -1;
pub const START_TIMER: i32 = -2;
pub const STOP_TIMER: i32 = -3;
pub const TIMER_STARTED: i32 = -11;
pub const TIMER_STOPPED: i32 = -12;
pub const TIMER_EXPIRED: i32 = -13;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdminKind {
    TriggerTimer,
    StartTimer,
    StopTimer,
    TimerStarted,
    TimerStopped,
    TimerExpired,
}

impl AdminKind {
    pub fn code(self) -> i32 {
        match self {
            AdminKind::TriggerTimer => TRIGGER_TIMER,
            AdminKind::StartTimer => START_TIMER,
            AdminKind::StopTimer => STOP_TIMER,
            AdminKind::TimerStarted => TIMER_STARTED,
            AdminKind::TimerStopped => TIMER_STOPPED,
            AdminKind::TimerExpired => TIMER_EXPIRED,
        }
    }

    pub fn is_command(self) -> bool {
        matches!(
            self,
            AdminKind::TriggerTimer | AdminKind::StartTimer | AdminKind::StopTimer
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            AdminKind::TriggerTimer => "TRIGGER_TIMER",
            AdminKind::StartTimer => "START_TIMER",
            AdminKind::StopTimer => "STOP_TIMER",
            AdminKind::TimerStarted => "TIMER_STARTED",
            AdminKind::TimerStopped => "TIMER_STOPPED",
            AdminKind::TimerExpired => "TIMER_EXPIRED",
        }
    }
}

/// The single decode point for record type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Admin(AdminKind),
    /// Negative code with no admin meaning (written by a newer runtime).
    Reserved(i32),
    Application(i32),
}

impl RecordKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            TRIGGER_TIMER => RecordKind::Admin(AdminKind::TriggerTimer),
            START_TIMER => RecordKind::Admin(AdminKind::StartTimer),
            STOP_TIMER => RecordKind::Admin(AdminKind::StopTimer),
            TIMER_STARTED => RecordKind::Admin(AdminKind::TimerStarted),
            TIMER_STOPPED => RecordKind::Admin(AdminKind::TimerStopped),
            TIMER_EXPIRED => RecordKind::Admin(AdminKind::TimerExpired),
            c if c < 0 => RecordKind::Reserved(c),
            c => RecordKind::Application(c),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            RecordKind::Admin(kind) => kind.code(),
            RecordKind::Reserved(c) | RecordKind::Application(c) => c,
        }
    }

    pub fn is_admin(self) -> bool {
        !matches!(self, RecordKind::Application(_))
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecordKind::Admin(kind) => f.write_str(kind.name()),
            RecordKind::Reserved(c) => write!(f, "RESERVED({c})"),
            RecordKind::Application(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_codes_decode_to_admin_kinds() {
        for kind in [
            AdminKind::TriggerTimer,
            AdminKind::StartTimer,
            AdminKind::StopTimer,
            AdminKind::TimerStarted,
            AdminKind::TimerStopped,
            AdminKind::TimerExpired,
        ] {
            assert_eq!(RecordKind::from_code(kind.code()), RecordKind::Admin(kind));
        }
    }

    #[test]
    fn test_unknown_negative_code_is_reserved() {
        assert_eq!(RecordKind::from_code(-99), RecordKind::Reserved(-99));
        assert!(RecordKind::from_code(-99).is_admin());
        assert_eq!(RecordKind::from_code(7), RecordKind::Application(7));
        assert!(!RecordKind::from_code(0).is_admin());
    }
}
