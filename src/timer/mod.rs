// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Timers
//!
//! A timer is started and stopped by events, so the registry is always a
//! pure function of the event log. The lifecycle is
//! `none -> started -> (expired | stopped) -> none`.
//!
//! # Payload
//! ```text
//! [type: i32][id: i64][timeout: i64]   20 bytes, little-endian
//! ```

pub mod applier;
pub mod source;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::WireError;
use crate::sequence::SequenceGenerator;

pub use applier::AdminEventApplier;
pub use source::TimerTriggerSource;

pub const TIMER_PAYLOAD_LENGTH: usize = 4 + 8 + 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timer {
    /// Application-defined timer type.
    pub timer_type: i32,
    pub id: i64,
    /// Absolute expiry time, in the units of the runtime's time source.
    pub timeout: i64,
}

impl Timer {
    pub fn new(timer_type: i32, id: i64, timeout: i64) -> Self {
        Self {
            timer_type,
            id,
            timeout,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.timeout <= now
    }

    pub fn encode(&self) -> [u8; TIMER_PAYLOAD_LENGTH] {
        let mut out = [0u8; TIMER_PAYLOAD_LENGTH];
        LittleEndian::write_i32(&mut out[0..4], self.timer_type);
        LittleEndian::write_i64(&mut out[4..12], self.id);
        LittleEndian::write_i64(&mut out[12..20], self.timeout);
        out
    }

    /// Decodes a timer payload carried by a record of type `kind`.
    pub fn decode(kind: i32, payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() != TIMER_PAYLOAD_LENGTH {
            return Err(WireError::InvalidPayload {
                kind,
                expected: TIMER_PAYLOAD_LENGTH,
                found: payload.len(),
            });
        }
        Ok(Self {
            timer_type: LittleEndian::read_i32(&payload[0..4]),
            id: LittleEndian::read_i64(&payload[4..12]),
            timeout: LittleEndian::read_i64(&payload[12..20]),
        })
    }
}

/// Registry of running timers, ordered by id.
#[derive(Debug, Default)]
pub struct Timers {
    registry: BTreeMap<i64, Timer>,
    ids: SequenceGenerator,
}

pub type SharedTimers = Arc<Mutex<Timers>>;

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTimers {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Reserves the id for a timer about to be started.
    pub fn next_id(&self) -> i64 {
        self.ids.next()
    }

    /// Registers a started timer. The id generator moves past its id so ids
    /// stay unique after replay.
    pub fn add(&mut self, timer: Timer) -> Option<Timer> {
        self.ids.advance_past(timer.id);
        self.registry.insert(timer.id, timer)
    }

    pub fn remove(&mut self, id: i64) -> Option<Timer> {
        self.registry.remove(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Timer> {
        self.registry.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.registry.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Timers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.registry.values()
    }

    /// Expired timers at `now`, in id order.
    pub fn expired(&self, now: i64) -> impl Iterator<Item = &Timer> {
        self.registry.values().filter(move |t| t.is_expired(now))
    }
}

/// Locks a shared registry, recovering from a poisoned lock.
pub fn lock(timers: &SharedTimers) -> std::sync::MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_payload_layout() {
        let timer = Timer::new(7, 0x0102, -5);
        let bytes = timer.encode();
        assert_eq!(LittleEndian::read_i32(&bytes[0..]), 7);
        assert_eq!(LittleEndian::read_i64(&bytes[4..]), 0x0102);
        assert_eq!(LittleEndian::read_i64(&bytes[12..]), -5);
        assert_eq!(Timer::decode(-11, &bytes).unwrap(), timer);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = Timer::decode(-13, &[0u8; 19]).unwrap_err();
        assert_eq!(
            err,
            WireError::InvalidPayload {
                kind: -13,
                expected: 20,
                found: 19
            }
        );
    }

    #[test]
    fn test_add_advances_id_generator() {
        let mut timers = Timers::new();
        timers.add(Timer::new(1, 40, 100));
        assert_eq!(timers.next_id(), 41);
        timers.add(Timer::new(1, 3, 100));
        assert_eq!(timers.next_id(), 42);
    }

    #[test]
    fn test_expired_in_id_order() {
        let mut timers = Timers::new();
        timers.add(Timer::new(1, 9, 50));
        timers.add(Timer::new(1, 2, 10));
        timers.add(Timer::new(1, 5, 500));
        let ids: Vec<i64> = timers.expired(50).map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }
}
