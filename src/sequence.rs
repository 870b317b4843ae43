// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequence generators and time sources.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::INITIAL_SEQUENCE;

/// Monotonic counter for one sequence space (an input, the admin channel,
/// timer ids). Instances are injected, never global.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicI64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(INITIAL_SEQUENCE)
    }

    pub fn starting_at(next: i64) -> Self {
        Self {
            next: AtomicI64::new(next),
        }
    }

    /// Generator that continues after `last`, or from the start if nothing
    /// was issued yet.
    pub fn after(last: Option<i64>) -> Self {
        match last {
            Some(last) => Self::starting_at(last.saturating_add(1).max(INITIAL_SEQUENCE)),
            None => Self::new(),
        }
    }

    pub fn next(&self) -> i64 {
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    /// The value the next call to [`next`](Self::next) returns.
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Acquire)
    }

    /// Ensures values up to and including `seen` are never handed out.
    pub fn advance_past(&self, seen: i64) {
        self.next.fetch_max(seen.saturating_add(1), Ordering::AcqRel);
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock used to stamp records.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Externally driven clock for deterministic runs.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicI64,
}

impl ManualTimeSource {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, delta: i64) -> i64 {
        self.now.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_monotonic() {
        let gen = SequenceGenerator::new();
        assert_eq!(gen.next(), 1);
        assert_eq!(gen.next(), 2);
        assert_eq!(gen.peek(), 3);
    }

    #[test]
    fn test_after_continues_from_last() {
        assert_eq!(SequenceGenerator::after(Some(41)).next(), 42);
        assert_eq!(SequenceGenerator::after(None).next(), INITIAL_SEQUENCE);
        assert_eq!(SequenceGenerator::after(Some(-5)).next(), INITIAL_SEQUENCE);
    }

    #[test]
    fn test_advance_past_never_moves_backwards() {
        let gen = SequenceGenerator::starting_at(10);
        gen.advance_past(3);
        assert_eq!(gen.peek(), 10);
        gen.advance_past(20);
        assert_eq!(gen.next(), 21);
    }

    #[test]
    fn test_manual_time_source() {
        let time = ManualTimeSource::new(100);
        assert_eq!(time.now(), 100);
        assert_eq!(time.advance(5), 105);
        time.set(7);
        assert_eq!(time.now(), 7);
    }
}
