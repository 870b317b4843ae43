// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Raft Replication
//!
//! Replicates the event log across nodes. The leader processes commands and
//! proposes each committed batch of events as one Raft entry; followers skip
//! commands and apply the events they receive. The role of the local node
//! drives the [`ServerState`](crate::command::ServerState) that switches the
//! command pipeline between the two modes.

pub mod containment;
pub mod log;
pub mod message;
pub mod node;
pub mod replicated;
pub mod transport;

pub use containment::Containment;
pub use log::{InMemoryRaftLog, RaftEntry, RaftLog, NOT_VOTED_YET};
pub use message::{AppendRequest, AppendResponse, Envelope, Message, VoteRequest, VoteResponse};
pub use node::{RaftConfig, RaftNode, Role};
pub use replicated::{lock_node, ReplicatedLog, SharedRaftNode};
pub use transport::{LocalNetwork, LocalTransport, RaftStep, Transport};
