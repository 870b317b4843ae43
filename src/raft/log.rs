// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Raft Log
//!
//! # Invariants
//! - Indices are 0-based and dense
//! - Terms never decrease along the log
//! - `current_term` and `voted_for` change together; the only mutators are
//!   [`RaftLog::vote_for`] and the two `clear_vote_for_*` methods
//! - `commit_index <= size - 1`, and committed entries are never truncated

use std::sync::Arc;

use crate::error::{LogError, LogResult};

/// `voted_for` value before a vote is cast in the current term.
pub const NOT_VOTED_YET: i32 = -1;

/// One replicated entry: a frame of encoded records tagged with the term of
/// the leader that created it. An empty frame is a leader no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaftEntry {
    pub term: i32,
    pub frame: Arc<[u8]>,
}

impl RaftEntry {
    pub fn new(term: i32, frame: Arc<[u8]>) -> Self {
        Self { term, frame }
    }

    pub fn is_noop(&self) -> bool {
        self.frame.is_empty()
    }
}

pub trait RaftLog: Send {
    fn size(&self) -> i64;

    /// Term of the entry at `index`, `None` if out of range.
    fn term(&self, index: i64) -> Option<i32>;

    fn entry(&self, index: i64) -> Option<&RaftEntry>;

    /// Appends an entry and returns its index.
    fn append(&mut self, term: i32, frame: Arc<[u8]>) -> LogResult<i64>;

    /// Destroys every entry at `from` and after.
    fn truncate(&mut self, from: i64) -> LogResult<()>;

    fn current_term(&self) -> i32;

    fn voted_for(&self) -> i32;

    fn vote_for(&mut self, candidate: i32) -> LogResult<()>;

    fn clear_vote_for_and_set_current_term(&mut self, term: i32) -> LogResult<()>;

    /// Starts a new term without a vote and returns it.
    fn clear_vote_for_and_inc_current_term(&mut self) -> LogResult<i32>;

    /// Highest committed index, -1 when nothing is committed.
    fn commit_index(&self) -> i64;

    fn set_commit_index(&mut self, index: i64) -> LogResult<()>;

    fn last_index(&self) -> i64 {
        self.size() - 1
    }

    /// Term of the last entry, 0 for an empty log.
    fn last_term(&self) -> i32 {
        self.term(self.last_index()).unwrap_or(0)
    }
}

/// Checks shared by every log implementation.
pub(crate) fn check_append(log: &(impl RaftLog + ?Sized), term: i32) -> LogResult<()> {
    let last_term = log.last_term();
    if log.size() > 0 && term < last_term {
        return Err(LogError::TermRegression { term, last_term });
    }
    Ok(())
}

pub(crate) fn check_truncate(log: &(impl RaftLog + ?Sized), from: i64) -> LogResult<()> {
    if from <= log.commit_index() {
        return Err(LogError::TruncateCommitted {
            from,
            commit_index: log.commit_index(),
        });
    }
    Ok(())
}

pub(crate) fn check_commit_index(log: &(impl RaftLog + ?Sized), index: i64) -> LogResult<()> {
    if index > log.last_index() {
        return Err(LogError::IndexOutOfRange {
            index,
            size: log.size(),
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct InMemoryRaftLog {
    entries: Vec<RaftEntry>,
    current_term: i32,
    voted_for: i32,
    commit_index: i64,
}

impl Default for InMemoryRaftLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRaftLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_term: 0,
            voted_for: NOT_VOTED_YET,
            commit_index: -1,
        }
    }
}

impl RaftLog for InMemoryRaftLog {
    fn size(&self) -> i64 {
        self.entries.len() as i64
    }

    fn term(&self, index: i64) -> Option<i32> {
        self.entry(index).map(|e| e.term)
    }

    fn entry(&self, index: i64) -> Option<&RaftEntry> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    fn append(&mut self, term: i32, frame: Arc<[u8]>) -> LogResult<i64> {
        check_append(&*self, term)?;
        self.entries.push(RaftEntry::new(term, frame));
        Ok(self.last_index())
    }

    fn truncate(&mut self, from: i64) -> LogResult<()> {
        check_truncate(&*self, from)?;
        if from < self.size() {
            self.entries.truncate(from.max(0) as usize);
        }
        Ok(())
    }

    fn current_term(&self) -> i32 {
        self.current_term
    }

    fn voted_for(&self) -> i32 {
        self.voted_for
    }

    fn vote_for(&mut self, candidate: i32) -> LogResult<()> {
        self.voted_for = candidate;
        Ok(())
    }

    fn clear_vote_for_and_set_current_term(&mut self, term: i32) -> LogResult<()> {
        self.voted_for = NOT_VOTED_YET;
        self.current_term = term;
        Ok(())
    }

    fn clear_vote_for_and_inc_current_term(&mut self) -> LogResult<i32> {
        self.voted_for = NOT_VOTED_YET;
        self.current_term += 1;
        Ok(self.current_term)
    }

    fn commit_index(&self) -> i64 {
        self.commit_index
    }

    fn set_commit_index(&mut self, index: i64) -> LogResult<()> {
        check_commit_index(&*self, index)?;
        self.commit_index = self.commit_index.max(index);
        Ok(())
    }
}
