// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Message transport and the Raft duty-cycle step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use super::log::RaftLog;
use super::message::Envelope;
use super::replicated::{lock_node, SharedRaftNode};
use crate::duty::Step;
use crate::error::{Result, RuntimeError};
use crate::sequence::TimeSource;

/// Moves envelopes between nodes. Must not block.
pub trait Transport: Send {
    fn send(&mut self, envelope: Envelope);

    /// Takes every envelope addressed to this node that has arrived.
    fn receive(&mut self) -> Vec<Envelope>;
}

#[derive(Default)]
struct NetworkState {
    queues: FxHashMap<i32, VecDeque<Envelope>>,
    isolated: FxHashSet<i32>,
}

/// In-process network connecting several nodes. Nodes can be isolated to
/// simulate partitions; messages to or from an isolated node are dropped.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self, id: i32) -> LocalTransport {
        LocalTransport {
            id,
            network: self.clone(),
        }
    }

    pub fn isolate(&self, id: i32) {
        self.lock().isolated.insert(id);
    }

    pub fn heal(&self, id: i32) {
        self.lock().isolated.remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct LocalTransport {
    id: i32,
    network: LocalNetwork,
}

impl Transport for LocalTransport {
    fn send(&mut self, envelope: Envelope) {
        let mut state = self.network.lock();
        if state.isolated.contains(&envelope.from) || state.isolated.contains(&envelope.to) {
            return;
        }
        state.queues.entry(envelope.to).or_default().push_back(envelope);
    }

    fn receive(&mut self) -> Vec<Envelope> {
        let mut state = self.network.lock();
        let isolated = state.isolated.contains(&self.id);
        let inbound: Vec<Envelope> = state
            .queues
            .get_mut(&self.id)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();
        if isolated {
            Vec::new()
        } else {
            inbound
        }
    }
}

/// Drives a Raft node from the duty cycle: delivers inbound messages, ticks
/// the clock and flushes the outbox.
pub struct RaftStep<L: RaftLog, T: Transport> {
    node: SharedRaftNode<L>,
    transport: T,
    time: Arc<dyn TimeSource>,
}

impl<L: RaftLog, T: Transport> RaftStep<L, T> {
    pub fn new(node: SharedRaftNode<L>, transport: T, time: Arc<dyn TimeSource>) -> Self {
        Self {
            node,
            transport,
            time,
        }
    }
}

impl<L: RaftLog, T: Transport> Step for RaftStep<L, T> {
    fn name(&self) -> &'static str {
        "raft"
    }

    fn execute(&mut self) -> Result<usize> {
        let now = self.time.now();
        let inbound = self.transport.receive();
        let received = inbound.len();
        let outbound = {
            let mut node = lock_node(&self.node);
            for envelope in inbound {
                node.handle(now, envelope.from, envelope.message)
                    .map_err(|e| RuntimeError::storage("raft", e))?;
            }
            node.tick(now).map_err(|e| RuntimeError::storage("raft", e))?;
            node.drain_outbox()
        };
        let work = received + outbound.len();
        for envelope in outbound {
            self.transport.send(envelope);
        }
        Ok(work)
    }
}
