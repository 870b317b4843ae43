// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Channel-backed command input.
//!
//! Tasks and threads submit commands through a [`CommandSender`]; the
//! sequencer drains the receiving end without blocking.

use sequent_kernel::input::{Input, RawHandler};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::errors::{NodeError, Result};

/// A command waiting to be sequenced: (type, payload).
pub type PendingCommand = (i32, Vec<u8>);

pub struct ChannelInput {
    id: i32,
    receiver: mpsc::Receiver<PendingCommand>,
    batch: usize,
}

#[derive(Clone)]
pub struct CommandSender {
    sender: mpsc::Sender<PendingCommand>,
}

impl ChannelInput {
    pub fn new(id: i32, capacity: usize, batch: usize) -> (Self, CommandSender) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let input = Self {
            id,
            receiver,
            batch: batch.max(1),
        };
        (input, CommandSender { sender })
    }
}

impl Input for ChannelInput {
    fn id(&self) -> i32 {
        self.id
    }

    fn poll(&mut self, handler: &mut RawHandler<'_>) -> usize {
        let mut delivered = 0;
        while delivered < self.batch {
            match self.receiver.try_recv() {
                Ok((kind, payload)) => {
                    handler(kind, &payload);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }
}

impl CommandSender {
    /// Waits for room in the channel.
    pub async fn submit(&self, kind: i32, payload: Vec<u8>) -> Result<()> {
        self.sender
            .send((kind, payload))
            .await
            .map_err(|_| NodeError::Closed)
    }

    /// Fails with [`NodeError::Backpressure`] when the channel is full.
    pub fn try_submit(&self, kind: i32, payload: Vec<u8>) -> Result<()> {
        self.sender.try_send((kind, payload)).map_err(|e| match e {
            TrySendError::Full(_) => NodeError::Backpressure,
            TrySendError::Closed(_) => NodeError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_respects_batch_and_backpressure() {
        let (mut input, sender) = ChannelInput::new(7, 3, 2);
        for i in 0..3 {
            sender.try_submit(i, vec![i as u8]).unwrap();
        }
        assert!(matches!(sender.try_submit(9, Vec::new()), Err(NodeError::Backpressure)));

        let mut seen = Vec::new();
        assert_eq!(input.poll(&mut |kind, payload: &[u8]| seen.push((kind, payload.to_vec()))), 2);
        assert_eq!(input.poll(&mut |kind, payload: &[u8]| seen.push((kind, payload.to_vec()))), 1);
        assert_eq!(seen, vec![(0, vec![0]), (1, vec![1]), (2, vec![2])]);
        assert_eq!(input.id(), 7);
    }
}
