use tracing::warn;

use crate::scheduler::error::SchedulerError;
use crate::scheduler::trace::TraceEvent;
use crate::scheduler::types::QueueLevel;

use super::Scheduler;

impl Scheduler {
    /// Whether another worker may be admitted right now.
    pub(super) fn can_admit(&self) -> bool {
        self.admitted < self.config.max_total && self.table.live_count() < self.config.max_concurrent
    }

    /// Admit at most one worker into the lowest free slot, at level 0.
    ///
    /// A spawn failure leaves the slot free; the next tick tries again.
    /// Returns whether a worker was admitted.
    pub(super) async fn try_admit(&mut self) -> Result<bool, SchedulerError> {
        if !self.can_admit() {
            return Ok(false);
        }
        let Some(slot) = self.table.find_free_slot() else {
            return Ok(false);
        };

        let worker = match self.spawner.spawn(slot).await {
            Ok(worker) => worker,
            Err(e) => {
                warn!(slot, error = %e, "Worker spawn failed, retrying next tick");
                self.metrics.spawn_failures += 1;
                self.emit(TraceEvent::SpawnFailed {
                    slot,
                    at: self.clock,
                    reason: e.to_string(),
                })?;
                return Ok(false);
            }
        };

        self.table.occupy(slot, worker, self.clock)?;
        self.ready[QueueLevel::Q0.index()].enqueue(slot);
        self.admitted += 1;
        self.metrics.admitted += 1;
        self.emit(TraceEvent::Admitted {
            worker,
            slot,
            level: QueueLevel::Q0,
            at: self.clock,
        })?;
        Ok(true)
    }
}
