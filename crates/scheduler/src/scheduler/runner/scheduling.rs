use mlfq_core::SlotIndex;

use crate::scheduler::error::SchedulerError;
use crate::scheduler::trace::TraceEvent;
use crate::scheduler::types::QueueLevel;

use super::Scheduler;

impl Scheduler {
    /// Move every blocked worker whose deadline has passed to the tail of
    /// queue 0, in blocked-set order. Returns how many were woken.
    pub(super) fn unblock_expired(&mut self) -> Result<usize, SchedulerError> {
        let mut due: Vec<SlotIndex> = Vec::new();
        for slot in self.blocked.iter() {
            if self.table.get(slot)?.unblock_deadline <= self.clock {
                due.push(slot);
            }
        }

        for &slot in &due {
            self.blocked.remove_value(slot);
            let entry = self.table.get_mut(slot)?;
            entry.blocked = false;
            entry.level = QueueLevel::Q0;
            let worker = entry.worker;
            self.ready[QueueLevel::Q0.index()].enqueue(slot);
            self.metrics.unblocked += 1;
            self.emit(TraceEvent::Unblocked { worker, slot, at: self.clock })?;
        }
        Ok(due.len())
    }

    /// Dequeue the head of the highest-priority non-empty ready queue.
    pub(super) fn select_next(&mut self) -> Option<(SlotIndex, QueueLevel)> {
        QueueLevel::ALL
            .into_iter()
            .find_map(|level| self.ready[level.index()].dequeue().map(|slot| (slot, level)))
    }

    /// Nothing ready: let simulated time pass.
    pub(super) async fn idle(&mut self) {
        self.clock.advance(self.config.idle_increment_ns);
        self.metrics.idle_ticks += 1;
        // Idle stretches never await anything else; give timers and
        // signal handlers a chance to run.
        tokio::task::yield_now().await;
    }

    /// Emit a queue snapshot once a full trace interval has passed since
    /// the last one. No-op without a trace sink.
    pub(super) fn maybe_snapshot(&mut self) -> Result<bool, SchedulerError> {
        if self.trace.is_none() {
            return Ok(false);
        }
        if self.clock.since(&self.last_snapshot) < u128::from(self.config.trace_interval_ns) {
            return Ok(false);
        }
        let snapshot = self.snapshot();
        self.last_snapshot = self.clock;
        self.metrics.snapshots += 1;
        self.emit(TraceEvent::Snapshot(snapshot))?;
        Ok(true)
    }
}
