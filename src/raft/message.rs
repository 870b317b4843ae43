// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Raft messages. Plain values; moving them between nodes is up to the
//! transport.

use super::log::RaftEntry;

/// Replicates entries after `prev_index`. Empty `entries` is a heartbeat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendRequest {
    pub term: i32,
    pub leader: i32,
    pub prev_index: i64,
    pub prev_term: i32,
    pub entries: Vec<RaftEntry>,
    pub leader_commit: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendResponse {
    pub term: i32,
    pub success: bool,
    /// On success, the last index known to match the leader. On failure, a
    /// hint: the highest index the leader should try next as `prev_index`.
    pub match_index: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteRequest {
    pub term: i32,
    pub candidate: i32,
    pub last_index: i64,
    pub last_term: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteResponse {
    pub term: i32,
    pub granted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    AppendRequest(AppendRequest),
    AppendResponse(AppendResponse),
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
}

impl Message {
    pub fn term(&self) -> i32 {
        match self {
            Message::AppendRequest(m) => m.term,
            Message::AppendResponse(m) => m.term,
            Message::VoteRequest(m) => m.term,
            Message::VoteResponse(m) => m.term,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub from: i32,
    pub to: i32,
    pub message: Message,
}
