// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Raft Node
//!
//! A passive state machine: time enters through [`RaftNode::tick`], peer
//! messages through [`RaftNode::handle`], and outgoing messages collect in
//! an outbox the caller drains. There is no I/O and no clock inside, so a
//! whole cluster can be driven deterministically from a test.
//!
//! # Roles
//! ```text
//! Follower --timeout--> Candidate --majority--> Leader
//!     ^                     |                     |
//!     +----higher term------+---------------------+
//! ```
//! The leader replicates its log with AppendEntries, checked on the follower
//! with [`Containment`]. An entry commits once a majority stores it and it
//! belongs to the leader's current term; earlier entries commit with it.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::containment::Containment;
use super::log::{RaftEntry, RaftLog, NOT_VOTED_YET};
use super::message::{AppendRequest, AppendResponse, Envelope, Message, VoteRequest, VoteResponse};
use crate::command::SharedServerState;
use crate::error::{ConfigError, LogError, LogResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    pub id: i32,
    pub peers: Vec<i32>,
    /// Election timeouts are drawn from `[min, max)`, in time source units.
    pub election_timeout_min: i64,
    pub election_timeout_max: i64,
    pub heartbeat_interval: i64,
    /// Most entries sent in one AppendEntries request.
    pub max_batch: usize,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            id: 1,
            peers: Vec::new(),
            election_timeout_min: 150,
            election_timeout_max: 300,
            heartbeat_interval: 50,
            max_batch: 64,
        }
    }
}

impl RaftConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id < 0 {
            return Err(ConfigError::Invalid(format!("raft node id {} is negative", self.id)));
        }
        if self.peers.contains(&self.id) {
            return Err(ConfigError::Invalid(format!("raft node {} lists itself as a peer", self.id)));
        }
        if self.election_timeout_min <= 0 || self.election_timeout_max <= self.election_timeout_min {
            return Err(ConfigError::Invalid("election timeout range is empty".into()));
        }
        if self.heartbeat_interval <= 0 || self.heartbeat_interval >= self.election_timeout_min {
            return Err(ConfigError::Invalid(
                "heartbeat interval must be positive and below the election timeout".into(),
            ));
        }
        if self.max_batch == 0 {
            return Err(ConfigError::Invalid("max_batch must be at least 1".into()));
        }
        Ok(())
    }

    fn quorum(&self) -> usize {
        (self.peers.len() + 1) / 2 + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

pub struct RaftNode<L: RaftLog> {
    config: RaftConfig,
    log: L,
    role: Role,
    leader: Option<i32>,
    votes: FxHashSet<i32>,
    next_index: FxHashMap<i32, i64>,
    match_index: FxHashMap<i32, i64>,
    election_deadline: i64,
    heartbeat_due: i64,
    rng: u64,
    outbox: Vec<Envelope>,
    server_state: Option<Arc<SharedServerState>>,
}

impl<L: RaftLog> RaftNode<L> {
    pub fn new(config: RaftConfig, log: L, now: i64) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = (config.id as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut node = Self {
            config,
            log,
            role: Role::Follower,
            leader: None,
            votes: FxHashSet::default(),
            next_index: FxHashMap::default(),
            match_index: FxHashMap::default(),
            election_deadline: 0,
            heartbeat_due: 0,
            rng: seed | 1,
            outbox: Vec::new(),
            server_state: None,
        };
        node.reset_election_deadline(now);
        Ok(node)
    }

    /// Keeps `state` active exactly while this node leads.
    pub fn with_server_state(mut self, state: Arc<SharedServerState>) -> Self {
        state.set_active(self.role == Role::Leader);
        self.server_state = Some(state);
        self
    }

    pub fn id(&self) -> i32 {
        self.config.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn leader(&self) -> Option<i32> {
        self.leader
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn current_term(&self) -> i32 {
        self.log.current_term()
    }

    pub fn commit_index(&self) -> i64 {
        self.log.commit_index()
    }

    /// Takes every message produced since the last call.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }

    fn reset_election_deadline(&mut self, now: i64) {
        let span = (self.config.election_timeout_max - self.config.election_timeout_min).max(1) as u64;
        let jitter = (self.next_random() % span) as i64;
        self.election_deadline = now + self.config.election_timeout_min + jitter;
    }

    fn set_role(&mut self, role: Role) {
        if self.role != role {
            tracing::info!(
                "Raft node {} is now {:?} in term {}",
                self.config.id,
                role,
                self.log.current_term()
            );
        }
        self.role = role;
        if let Some(state) = &self.server_state {
            state.set_active(role == Role::Leader);
        }
    }

    fn send(&mut self, to: i32, message: Message) {
        self.outbox.push(Envelope {
            from: self.config.id,
            to,
            message,
        });
    }

    /// Advances time: starts an election when the leader has gone quiet, or
    /// sends heartbeats when leading.
    pub fn tick(&mut self, now: i64) -> LogResult<()> {
        match self.role {
            Role::Leader => {
                if now >= self.heartbeat_due {
                    self.broadcast_append(now);
                }
            }
            Role::Follower | Role::Candidate => {
                if now >= self.election_deadline {
                    self.start_election(now)?;
                }
            }
        }
        Ok(())
    }

    fn start_election(&mut self, now: i64) -> LogResult<()> {
        let term = self.log.clear_vote_for_and_inc_current_term()?;
        self.log.vote_for(self.config.id)?;
        self.leader = None;
        self.votes.clear();
        self.votes.insert(self.config.id);
        self.set_role(Role::Candidate);
        self.reset_election_deadline(now);
        tracing::debug!("Raft node {} starts election for term {}", self.config.id, term);

        if self.votes.len() >= self.config.quorum() {
            return self.become_leader(now);
        }

        let request = VoteRequest {
            term,
            candidate: self.config.id,
            last_index: self.log.last_index(),
            last_term: self.log.last_term(),
        };
        for peer in self.config.peers.clone() {
            self.send(peer, Message::VoteRequest(request));
        }
        Ok(())
    }

    fn become_leader(&mut self, now: i64) -> LogResult<()> {
        self.leader = Some(self.config.id);
        self.set_role(Role::Leader);
        let next = self.log.size();
        for &peer in &self.config.peers {
            self.next_index.insert(peer, next);
            self.match_index.insert(peer, -1);
        }
        // A no-op of the new term lets entries of earlier terms commit.
        let term = self.log.current_term();
        self.log.append(term, Arc::from(Vec::new()))?;
        self.advance_commit()?;
        self.broadcast_append(now);
        Ok(())
    }

    fn step_down(&mut self, term: i32, now: i64) -> LogResult<()> {
        if term > self.log.current_term() {
            self.log.clear_vote_for_and_set_current_term(term)?;
        }
        if self.role != Role::Follower {
            self.set_role(Role::Follower);
            self.reset_election_deadline(now);
        }
        Ok(())
    }

    /// Handles one message from peer `from`.
    pub fn handle(&mut self, now: i64, from: i32, message: Message) -> LogResult<()> {
        if message.term() > self.log.current_term() {
            self.leader = None;
            self.step_down(message.term(), now)?;
        }

        match message {
            Message::VoteRequest(request) => self.on_vote_request(now, from, request),
            Message::VoteResponse(response) => self.on_vote_response(now, from, response),
            Message::AppendRequest(request) => self.on_append_request(now, from, request),
            Message::AppendResponse(response) => self.on_append_response(from, response),
        }
    }

    fn on_vote_request(&mut self, now: i64, from: i32, request: VoteRequest) -> LogResult<()> {
        let term = self.log.current_term();
        let voted_for = self.log.voted_for();
        let up_to_date = request.last_term > self.log.last_term()
            || (request.last_term == self.log.last_term() && request.last_index >= self.log.last_index());
        let granted = request.term == term
            && (voted_for == NOT_VOTED_YET || voted_for == request.candidate)
            && up_to_date;

        if granted {
            self.log.vote_for(request.candidate)?;
            self.reset_election_deadline(now);
            tracing::debug!("Raft node {} votes for {} in term {}", self.config.id, request.candidate, term);
        }
        self.send(from, Message::VoteResponse(VoteResponse { term, granted }));
        Ok(())
    }

    fn on_vote_response(&mut self, now: i64, from: i32, response: VoteResponse) -> LogResult<()> {
        if self.role != Role::Candidate || response.term != self.log.current_term() || !response.granted {
            return Ok(());
        }
        self.votes.insert(from);
        if self.votes.len() >= self.config.quorum() {
            self.become_leader(now)?;
        }
        Ok(())
    }

    fn on_append_request(&mut self, now: i64, from: i32, request: AppendRequest) -> LogResult<()> {
        let term = self.log.current_term();
        if request.term < term {
            self.send(
                from,
                Message::AppendResponse(AppendResponse {
                    term,
                    success: false,
                    match_index: self.log.last_index(),
                }),
            );
            return Ok(());
        }

        if self.role != Role::Follower {
            self.set_role(Role::Follower);
        }
        self.leader = Some(request.leader);
        self.reset_election_deadline(now);

        let response = match Containment::of(request.prev_index, request.prev_term, &self.log) {
            Containment::Out => AppendResponse {
                term,
                success: false,
                match_index: self.log.last_index(),
            },
            Containment::Conflict => {
                self.log.truncate(request.prev_index)?;
                AppendResponse {
                    term,
                    success: false,
                    match_index: request.prev_index - 1,
                }
            }
            Containment::In => {
                let mut index = request.prev_index;
                for entry in request.entries {
                    index += 1;
                    match Containment::of(index, entry.term, &self.log) {
                        Containment::In => continue,
                        Containment::Conflict => {
                            self.log.truncate(index)?;
                            self.log.append(entry.term, entry.frame)?;
                        }
                        Containment::Out => {
                            self.log.append(entry.term, entry.frame)?;
                        }
                    }
                }
                let commit = request.leader_commit.min(index);
                if commit > self.log.commit_index() {
                    self.log.set_commit_index(commit)?;
                }
                AppendResponse {
                    term,
                    success: true,
                    match_index: index,
                }
            }
        };
        self.send(from, Message::AppendResponse(response));
        Ok(())
    }

    fn on_append_response(&mut self, from: i32, response: AppendResponse) -> LogResult<()> {
        if self.role != Role::Leader || response.term != self.log.current_term() {
            return Ok(());
        }

        if response.success {
            let matched = self.match_index.entry(from).or_insert(-1);
            *matched = (*matched).max(response.match_index);
            let next = *matched + 1;
            self.next_index.insert(from, next);
            self.advance_commit()?;
            if next < self.log.size() {
                self.send_append(from);
            }
        } else {
            let current = self.next_index.get(&from).copied().unwrap_or(0);
            let next = (current - 1).min(response.match_index + 1).max(0);
            self.next_index.insert(from, next);
            self.send_append(from);
        }
        Ok(())
    }

    fn advance_commit(&mut self) -> LogResult<()> {
        let term = self.log.current_term();
        let mut index = self.log.last_index();
        while index > self.log.commit_index() {
            if self.log.term(index) == Some(term) {
                let replicas = 1 + self.match_index.values().filter(|&&m| m >= index).count();
                if replicas >= self.config.quorum() {
                    self.log.set_commit_index(index)?;
                    tracing::debug!("Raft node {} commits through {}", self.config.id, index);
                    break;
                }
            } else {
                break;
            }
            index -= 1;
        }
        Ok(())
    }

    fn send_append(&mut self, peer: i32) {
        let next = self
            .next_index
            .get(&peer)
            .copied()
            .unwrap_or(self.log.size())
            .clamp(0, self.log.size());
        let prev_index = next - 1;
        let end = (next + self.config.max_batch as i64).min(self.log.size());
        let entries: Vec<RaftEntry> = (next..end).filter_map(|i| self.log.entry(i).cloned()).collect();
        let request = AppendRequest {
            term: self.log.current_term(),
            leader: self.config.id,
            prev_index,
            prev_term: self.log.term(prev_index).unwrap_or(0),
            entries,
            leader_commit: self.log.commit_index(),
        };
        self.send(peer, Message::AppendRequest(request));
    }

    fn broadcast_append(&mut self, now: i64) {
        for peer in self.config.peers.clone() {
            self.send_append(peer);
        }
        self.heartbeat_due = now + self.config.heartbeat_interval;
    }

    /// Appends `frame` as one entry of the current term. Only the leader
    /// accepts proposals.
    pub fn propose(&mut self, frame: Arc<[u8]>) -> LogResult<i64> {
        if self.role != Role::Leader {
            return Err(LogError::NotLeader);
        }
        let term = self.log.current_term();
        let index = self.log.append(term, frame)?;
        self.advance_commit()?;
        for peer in self.config.peers.clone() {
            let next = self.next_index.get(&peer).copied().unwrap_or(index);
            if next >= index {
                self.send_append(peer);
            }
        }
        Ok(index)
    }
}
