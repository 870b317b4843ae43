// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Log containment.

use super::log::RaftLog;

/// Where a claimed (index, term) pair stands relative to a local log.
///
/// This is a value, not an error: replication branches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Containment {
    /// The local log holds `index` with the same term.
    In,
    /// The local log ends before `index`.
    Out,
    /// The local log holds `index` with a different term.
    Conflict,
}

impl Containment {
    /// Classifies `(index, term)` against `log`. A negative index names the
    /// position before the first entry, which every log contains.
    pub fn of<L: RaftLog + ?Sized>(index: i64, term: i32, log: &L) -> Self {
        if index < 0 {
            return Containment::In;
        }
        if index >= log.size() {
            return Containment::Out;
        }
        match log.term(index) {
            Some(t) if t == term => Containment::In,
            _ => Containment::Conflict,
        }
    }
}
