use std::collections::VecDeque;

use mlfq_core::SlotIndex;

/// Bounded FIFO of slot indices.
///
/// Used for the three ready levels and the blocked set. Insertion order is
/// priority order among equals. Capacity equals the process table size and
/// each slot sits in at most one queue, so overflow or a duplicate entry is
/// a scheduler bug and panics.
#[derive(Debug, Clone)]
pub struct SlotQueue {
    items: VecDeque<SlotIndex>,
    capacity: usize,
}

impl SlotQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `slot` at the tail.
    ///
    /// # Panics
    /// If the queue is full or already holds `slot`.
    pub fn enqueue(&mut self, slot: SlotIndex) {
        assert!(
            self.items.len() < self.capacity,
            "slot queue overflow: capacity {} exceeded by slot {slot}",
            self.capacity
        );
        assert!(!self.contains(slot), "slot {slot} enqueued twice");
        self.items.push_back(slot);
    }

    pub fn dequeue(&mut self) -> Option<SlotIndex> {
        self.items.pop_front()
    }

    /// Remove `slot` wherever it sits, keeping the order of the rest.
    /// Returns whether it was present.
    pub fn remove_value(&mut self, slot: SlotIndex) -> bool {
        match self.items.iter().position(|&s| s == slot) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, slot: SlotIndex) -> bool {
        self.items.contains(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current contents, head first.
    pub fn snapshot(&self) -> Vec<SlotIndex> {
        self.items.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.items.iter().copied()
    }
}
