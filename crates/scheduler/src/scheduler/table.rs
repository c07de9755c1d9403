use mlfq_core::{CoreError, Nanos, SimTime, SlotIndex, WorkerId};

use super::types::QueueLevel;

/// Scheduling state for one worker.
///
/// When `occupied` is false every other field is stale and must not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSlot {
    pub occupied: bool,
    pub worker: WorkerId,
    /// Simulated time of admission.
    pub start_time: SimTime,
    /// Simulated CPU time consumed across all dispatches.
    pub cpu_time_used: Nanos,
    pub level: QueueLevel,
    pub blocked: bool,
    /// Meaningful only while `blocked`.
    pub unblock_deadline: SimTime,
}

/// Fixed-capacity table of [`ProcessSlot`]s.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: Vec<ProcessSlot>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![ProcessSlot::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Lowest-indexed free slot.
    pub fn find_free_slot(&self) -> Option<SlotIndex> {
        self.slots.iter().position(|s| !s.occupied)
    }

    /// Hand a free slot to `worker`, starting it at level 0.
    pub fn occupy(&mut self, index: SlotIndex, worker: WorkerId, now: SimTime) -> Result<(), CoreError> {
        let slot = self.get_mut(index)?;
        debug_assert!(!slot.occupied, "slot {index} admitted while occupied");
        *slot = ProcessSlot {
            occupied: true,
            worker,
            start_time: now,
            cpu_time_used: 0,
            level: QueueLevel::Q0,
            blocked: false,
            unblock_deadline: SimTime::ZERO,
        };
        Ok(())
    }

    /// Free a slot, returning the worker that held it.
    pub fn release(&mut self, index: SlotIndex) -> Result<Option<WorkerId>, CoreError> {
        let slot = self.get_mut(index)?;
        let previous = slot.occupied.then_some(slot.worker);
        *slot = ProcessSlot::default();
        Ok(previous)
    }

    pub fn get(&self, index: SlotIndex) -> Result<&ProcessSlot, CoreError> {
        let capacity = self.slots.len();
        self.slots
            .get(index)
            .ok_or(CoreError::SlotOutOfRange { index, capacity })
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> Result<&mut ProcessSlot, CoreError> {
        let capacity = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(CoreError::SlotOutOfRange { index, capacity })
    }

    /// Occupied slots with their indices, in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, &ProcessSlot)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.occupied)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupied).count()
    }
}
