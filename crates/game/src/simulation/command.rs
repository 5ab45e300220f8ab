use std::collections::VecDeque;

use crate::message::PlayerInput;
use crate::net::sequence_greater_than;

/// Per-player FIFO of inputs waiting for the tick loop. Overflow drops the
/// oldest entry; inputs at or behind the last processed sequence are skipped.
#[derive(Debug)]
pub struct InputBuffer {
    inputs: VecDeque<PlayerInput>,
    max_size: usize,
    last_processed: u32,
}

impl InputBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            inputs: VecDeque::with_capacity(max_size),
            max_size,
            last_processed: 0,
        }
    }

    pub fn push(&mut self, input: PlayerInput) {
        if !sequence_greater_than(input.input_sequence, self.last_processed) {
            return;
        }
        if self.inputs.len() >= self.max_size {
            self.inputs.pop_front();
        }
        self.inputs.push_back(input);
    }

    pub fn pop(&mut self) -> Option<PlayerInput> {
        while let Some(input) = self.inputs.pop_front() {
            if sequence_greater_than(input.input_sequence, self.last_processed) {
                self.last_processed = input.input_sequence;
                return Some(input);
            }
        }
        None
    }

    pub fn last_processed(&self) -> u32 {
        self.last_processed
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
