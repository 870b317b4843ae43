// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Command inputs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives raw messages from an input as (type, payload).
pub type RawHandler<'h> = dyn FnMut(i32, &[u8]) + 'h;

/// A producer of raw commands.
///
/// The sequencer polls every input once per cycle. An input hands over the
/// messages that are ready and returns how many it delivered; it must not
/// block. The payload borrow ends with the callback.
pub trait Input: Send {
    /// Source id stamped on every command from this input.
    fn id(&self) -> i32;

    fn poll(&mut self, handler: &mut RawHandler<'_>) -> usize;
}

/// In-process queue input. Clone the [`QueueHandle`] to submit from other
/// threads.
pub struct QueueInput {
    id: i32,
    queue: Arc<Mutex<VecDeque<(i32, Vec<u8>)>>>,
    batch: usize,
}

#[derive(Clone)]
pub struct QueueHandle {
    queue: Arc<Mutex<VecDeque<(i32, Vec<u8>)>>>,
}

impl QueueInput {
    /// `batch` bounds how many messages one poll drains.
    pub fn new(id: i32, batch: usize) -> (Self, QueueHandle) {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let input = Self {
            id,
            queue: queue.clone(),
            batch: batch.max(1),
        };
        (input, QueueHandle { queue })
    }
}

impl QueueHandle {
    pub fn submit(&self, kind: i32, payload: impl Into<Vec<u8>>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((kind, payload.into()));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Input for QueueInput {
    fn id(&self) -> i32 {
        self.id
    }

    fn poll(&mut self, handler: &mut RawHandler<'_>) -> usize {
        let drained: Vec<(i32, Vec<u8>)> = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let take = queue.len().min(self.batch);
            queue.drain(..take).collect()
        };
        for (kind, payload) in &drained {
            handler(*kind, payload);
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_input_respects_batch() {
        let (mut input, handle) = QueueInput::new(4, 2);
        for i in 0..5u8 {
            handle.submit(1, vec![i]);
        }

        let mut seen = Vec::new();
        let n = input.poll(&mut |_, payload: &[u8]| seen.push(payload[0]));
        assert_eq!(n, 2);
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(handle.pending(), 3);
    }
}
