//! EventStore: bounded FIFO of pending events.

use std::collections::VecDeque;

/// Ordered pending events, oldest first.
///
/// Design:
/// - Not synchronized on its own; it lives inside the send queue state and is
///   only touched under the queue lock.
/// - Overflow policy is drop-oldest: `add` never rejects.
/// - `removed` counts every event that ever left the front. It doubles as the
///   absolute position of the current head, so a caller that peeked the head
///   can later remove exactly that event and nothing newer.
#[derive(Debug, Clone)]
pub struct EventStore<E> {
    items: VecDeque<E>,
    max_count: usize,
    removed: u64,
}

impl<E> EventStore<E> {
    /// `max_count` is clamped to at least 1.
    pub fn new(max_count: usize) -> Self {
        let max_count = max_count.max(1);
        Self {
            items: VecDeque::with_capacity(max_count.min(1024)),
            max_count,
            removed: 0,
        }
    }

    /// Build a store from restored events, keeping only the newest `max_count`.
    pub fn from_events(events: Vec<E>, max_count: usize) -> Self {
        let mut store = Self::new(max_count);
        for event in events {
            store.add(event);
        }
        store
    }

    /// Append to the tail. Returns the evicted head when the store was full.
    pub fn add(&mut self, event: E) -> Option<E> {
        let evicted = if self.items.len() >= self.max_count {
            self.dequeue_head()
        } else {
            None
        };
        self.items.push_back(event);
        evicted
    }

    pub fn peek_head(&self) -> Option<&E> {
        self.items.front()
    }

    pub fn dequeue_head(&mut self) -> Option<E> {
        let head = self.items.pop_front()?;
        self.removed += 1;
        Some(head)
    }

    /// Absolute position of the current head.
    pub fn head_position(&self) -> u64 {
        self.removed
    }

    /// Remove the head only if it is still the event seen at `position`.
    ///
    /// Returns `None` when that event already left the store (evicted,
    /// cleared, dropped).
    pub fn dequeue_at(&mut self, position: u64) -> Option<E> {
        if self.removed != position {
            return None;
        }
        self.dequeue_head()
    }

    /// Drop everything. Returns how many events were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        self.removed += dropped as u64;
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }
}

impl<E: Clone> EventStore<E> {
    pub fn snapshot(&self) -> Vec<E> {
        self.items.iter().cloned().collect()
    }
}
