//! Message history
//!
//! The bounded FIFO of recent chat messages shared by every client handler.

use log::debug;
use std::collections::VecDeque;

/// Bounded FIFO of the most recent messages.
///
/// Appending beyond capacity evicts the oldest entry first. Readers never see
/// the deque directly; they take an ordered snapshot copy.
pub struct MessageHistory {
    messages: VecDeque<String>,
    capacity: usize,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends one message, evicting the oldest entry when over capacity.
    pub fn append(&mut self, message: String) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Returns an ordered copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Logs every entry at debug level. Development visibility only; has no
    /// effect on state.
    pub fn dump(&self) {
        debug!("History holds {} message(s):", self.messages.len());
        for (index, message) in self.messages.iter().enumerate() {
            debug!("  [{}] {}", index, message);
        }
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
