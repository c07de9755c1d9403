use mlfq_core::{SlotIndex, WorkerId};
use mlfq_dispatch::{topics, DispatchError, DispatchReply, DispatchRequest, Message, Outcome};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::scheduler::error::SchedulerError;
use crate::scheduler::queue::SlotQueue;
use crate::scheduler::trace::{RunSummary, TraceEvent};
use crate::scheduler::types::{QueueLevel, RunOutcome};

use super::Scheduler;

impl Scheduler {
    /// One scheduling decision: admit, unblock, dispatch or idle, snapshot.
    pub async fn tick(&mut self) -> Result<(), SchedulerError> {
        self.metrics.ticks += 1;
        self.try_admit().await?;
        self.unblock_expired()?;
        match self.select_next() {
            Some((slot, level)) => self.dispatch(slot, level).await?,
            None => self.idle().await,
        }
        self.maybe_snapshot()?;
        Ok(())
    }

    /// Run one dispatch round-trip for the worker in `slot`, taken from the
    /// head of the `level` ready queue, and apply its outcome.
    pub(super) async fn dispatch(&mut self, slot: SlotIndex, level: QueueLevel) -> Result<(), SchedulerError> {
        let worker = self.table.get(slot)?.worker;
        debug_assert_eq!(self.table.get(slot)?.level, level, "slot {slot} queued at wrong level");
        let quantum = self.config.quantum_for(level);

        let overhead = self
            .rng
            .gen_range(self.config.dispatch_overhead_min_ns..=self.config.dispatch_overhead_max_ns);
        self.clock.advance(overhead);
        self.emit(TraceEvent::Dispatched {
            worker,
            slot,
            level,
            quantum,
            at: self.clock,
        })?;

        let request = Message::new(topics::DISPATCH_REQUEST, worker, &DispatchRequest { quantum })
            .map_err(|e| SchedulerError::dispatch(worker, e))?;
        let expected = request.correlation_id;
        let reply = self
            .sender
            .request(request, self.config.dispatch_timeout())
            .await
            .map_err(|e| SchedulerError::dispatch(worker, e))?;

        if reply.topic != topics::DISPATCH_REPLY {
            return Err(SchedulerError::dispatch(worker, DispatchError::UnexpectedTopic(reply.topic)));
        }
        if reply.worker != worker {
            return Err(SchedulerError::dispatch(
                worker,
                DispatchError::IdentityMismatch { expected: worker, actual: reply.worker },
            ));
        }
        if reply.correlation_id != expected {
            return Err(SchedulerError::dispatch(
                worker,
                DispatchError::CorrelationMismatch { expected, actual: reply.correlation_id },
            ));
        }
        let DispatchReply { used_time } = reply.decode().map_err(|e| SchedulerError::dispatch(worker, e))?;
        let outcome = Outcome::classify(used_time, quantum).map_err(|e| SchedulerError::dispatch(worker, e))?;

        self.clock.advance(outcome.used());
        self.table.get_mut(slot)?.cpu_time_used += outcome.used();
        self.metrics.record_dispatch(level, &outcome, overhead);
        self.apply_outcome(slot, worker, level, outcome).await
    }

    async fn apply_outcome(
        &mut self,
        slot: SlotIndex,
        worker: WorkerId,
        level: QueueLevel,
        outcome: Outcome,
    ) -> Result<(), SchedulerError> {
        match outcome {
            Outcome::Terminated { used } => {
                self.table.release(slot)?;
                self.spawner.release(worker).await;
                self.emit(TraceEvent::Terminated { worker, slot, used, at: self.clock })?;
            }
            Outcome::Blocked { used } => {
                let delay = self.rng.gen_range(1..=self.config.max_block_delay_ns);
                let until = self.clock.after(delay);
                let entry = self.table.get_mut(slot)?;
                entry.blocked = true;
                entry.unblock_deadline = until;
                self.blocked.enqueue(slot);
                self.emit(TraceEvent::Blocked { worker, slot, used, until, at: self.clock })?;
            }
            Outcome::Exhausted { used } => {
                let next = level.demoted();
                self.table.get_mut(slot)?.level = next;
                self.ready[next.index()].enqueue(slot);
                self.emit(TraceEvent::Requeued { worker, slot, used, level: next, at: self.clock })?;
            }
        }
        Ok(())
    }

    /// Whether the run still has anything to do.
    pub(super) fn has_work(&self) -> bool {
        self.admitted < self.config.max_total || self.table.live_count() > 0
    }

    fn sim_time_exceeded(&self) -> bool {
        self.config
            .max_sim_time_ns
            .is_some_and(|cap| self.clock.as_nanos() >= u128::from(cap))
    }

    /// Run until every admissible worker has terminated, a cap is hit or
    /// shutdown is requested. Live workers are always terminated and the
    /// trace flushed before returning, on success and on error alike.
    pub async fn run(&mut self) -> Result<RunOutcome, SchedulerError> {
        info!(
            max_concurrent = self.config.max_concurrent,
            max_total = self.config.max_total,
            base_quantum_ns = self.config.base_quantum_ns,
            "Scheduler starting"
        );
        let mut shutdown = self.shutdown.subscribe();
        // A cap too large to represent means no wall-clock cap.
        let deadline = Instant::now().checked_add(self.config.max_runtime());

        let result = self.run_loop(&mut shutdown, deadline).await;
        if let Err(e) = &result {
            error!(error = %e, clock = %self.clock, "Scheduler stopped on error");
        }
        let finished = self.finish(result.as_ref().ok().copied()).await;

        let outcome = result?;
        finished?;
        info!(%outcome, clock = %self.clock, "Scheduler stopped");
        Ok(outcome)
    }

    async fn run_loop(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> Result<RunOutcome, SchedulerError> {
        loop {
            if *shutdown.borrow() {
                return Ok(RunOutcome::Interrupted);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(RunOutcome::RuntimeLimit);
            }
            if !self.has_work() {
                return Ok(RunOutcome::Completed);
            }
            if self.sim_time_exceeded() {
                return Ok(RunOutcome::SimTimeLimit);
            }

            // Dropping the tick future abandons an in-flight dispatch.
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => return Ok(RunOutcome::Interrupted),
                _ = runtime_elapsed(deadline) => return Ok(RunOutcome::RuntimeLimit),
                res = self.tick() => res?,
            }
        }
    }

    /// Terminate every live worker, empty the queues, close the spawner and
    /// write the summary. Runs on every exit path.
    pub(super) async fn finish(&mut self, outcome: Option<RunOutcome>) -> Result<(), SchedulerError> {
        let live: Vec<(SlotIndex, WorkerId)> = self.table.occupied().map(|(i, s)| (i, s.worker)).collect();
        for (slot, worker) in live {
            self.spawner.terminate(worker).await;
            self.table.release(slot)?;
        }
        let capacity = self.table.capacity();
        self.ready = std::array::from_fn(|_| SlotQueue::new(capacity));
        self.blocked = SlotQueue::new(capacity);
        self.spawner.close().await;

        if let Some(outcome) = outcome {
            let m = &self.metrics;
            info!(
                admitted = m.admitted,
                terminated = m.terminated,
                dispatches = m.total_dispatches(),
                idle_ticks = m.idle_ticks,
                cpu_time_ns = m.cpu_time_ns,
                clock = %self.clock,
                "Run summary"
            );
            let summary = RunSummary {
                outcome,
                clock: self.clock,
                metrics: self.metrics.clone(),
            };
            self.emit(TraceEvent::Summary(summary))?;
        }
        if let Some(sink) = self.trace.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

async fn runtime_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
