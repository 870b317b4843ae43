// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! A message log replicated through Raft.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::log::RaftLog;
use super::node::RaftNode;
use crate::error::{LogError, LogResult};
use crate::log::{advance, LogPosition, MessageLog, Outcome, PeekPollHandler};
use crate::wire::{validate_records, RecordView};

pub type SharedRaftNode<L> = Arc<Mutex<RaftNode<L>>>;

pub fn lock_node<L: RaftLog>(node: &SharedRaftNode<L>) -> MutexGuard<'_, RaftNode<L>> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`MessageLog`] view of a Raft log.
///
/// Positions address entries: `frame` is the entry index and `offset` the
/// byte offset inside the entry's frame. Readers only ever see committed
/// entries, so what a poller consumed can never be truncated away.
pub struct ReplicatedLog<L: RaftLog> {
    node: SharedRaftNode<L>,
}

impl<L: RaftLog> ReplicatedLog<L> {
    pub fn new(node: SharedRaftNode<L>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &SharedRaftNode<L> {
        &self.node
    }
}

impl<L: RaftLog> MessageLog for ReplicatedLog<L> {
    /// Proposes `records` as one entry. Fails with [`LogError::NotLeader`]
    /// on followers and candidates.
    fn append(&self, records: &[u8]) -> LogResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_records(records)?;
        let index = lock_node(&self.node).propose(Arc::from(records))?;
        tracing::trace!("Proposed {} bytes as entry {}", records.len(), index);
        Ok(())
    }

    fn peek_or_poll(
        &self,
        position: &mut LogPosition,
        handler: &mut dyn PeekPollHandler,
    ) -> LogResult<usize> {
        // Take the frame under the lock, run the handler outside it.
        let frame = {
            let node = lock_node(&self.node);
            let log = node.log();
            loop {
                let index = i64::try_from(position.frame).map_err(|_| LogError::IndexOutOfRange {
                    index: i64::MAX,
                    size: log.size(),
                })?;
                if index > log.commit_index() {
                    return Ok(0);
                }
                let entry = log.entry(index).ok_or(LogError::IndexOutOfRange {
                    index,
                    size: log.size(),
                })?;
                if entry.is_noop() {
                    position.frame += 1;
                    position.offset = 0;
                    continue;
                }
                break entry.frame.clone();
            }
        };

        let view = RecordView::new(&frame, position.offset as usize)?;
        let record_len = view.encoded_len();
        let next = position.frame + 1;
        if handler.on_message(view) == Outcome::Poll {
            advance(position, record_len, frame.len(), next);
        }
        Ok(1)
    }
}
