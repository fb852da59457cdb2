//! Per-session bounded offline queue.

use std::collections::VecDeque;

/// FIFO of command ids waiting for an avatar.
///
/// On overflow the oldest ids are evicted so the newest commands survive.
#[derive(Debug)]
pub struct OfflineQueue {
    ids: VecDeque<String>,
    capacity: usize,
}

impl OfflineQueue {
    /// Create an empty queue holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            capacity,
        }
    }

    /// Append `id`, returning the ids evicted to stay within capacity.
    pub fn push(&mut self, id: String) -> Vec<String> {
        self.ids.push_back(id);
        let excess = self.ids.len().saturating_sub(self.capacity);
        self.ids.drain(..excess).collect()
    }

    /// Remove `id` wherever it sits. Returns `true` if it was queued.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|queued| queued != id);
        self.ids.len() != before
    }

    /// Take every id in FIFO order.
    pub fn into_ids(self) -> VecDeque<String> {
        self.ids
    }

    /// Queued ids, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of queued ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
