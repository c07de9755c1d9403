use std::sync::Arc;

use mlfq_core::SimTime;
use mlfq_dispatch::{RequestSender, WorkerSpawner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::error::SchedulerError;
use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::queue::SlotQueue;
use crate::scheduler::table::ProcessTable;
use crate::scheduler::trace::{QueueSnapshot, TraceEvent, TraceSink};
use crate::scheduler::types::QueueLevel;

/// The MLFQ scheduler. Single owner of the clock, process table and queues.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    /// Simulated clock.
    pub(super) clock: SimTime,
    pub(super) table: ProcessTable,
    /// Ready queues indexed by [`QueueLevel::index`].
    pub(super) ready: [SlotQueue; 3],
    pub(super) blocked: SlotQueue,
    /// Workers admitted so far, including terminated ones.
    pub(super) admitted: usize,
    pub(super) metrics: SchedulerMetrics,
    /// Clock value of the last queue snapshot.
    pub(super) last_snapshot: SimTime,
    pub(super) rng: StdRng,
    pub(super) sender: Arc<dyn RequestSender>,
    pub(super) spawner: Arc<dyn WorkerSpawner>,
    pub(super) trace: Option<Box<dyn TraceSink>>,
    pub(super) shutdown: Arc<watch::Sender<bool>>,
}

/// Cloneable handle that asks a running [`Scheduler`] to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown. The run loop abandons any in-flight dispatch,
    /// terminates live workers and returns `RunOutcome::Interrupted`.
    pub fn trigger(&self) {
        info!("Scheduler shutdown requested");
        self.tx.send_replace(true);
    }
}

impl Scheduler {
    /// Create a scheduler. Out-of-range config values are reset to their
    /// defaults first.
    pub fn new(
        mut config: SchedulerConfig,
        sender: Arc<dyn RequestSender>,
        spawner: Arc<dyn WorkerSpawner>,
    ) -> Self {
        config.sanitize();
        let capacity = config.max_concurrent;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (tx, _rx) = watch::channel(false);

        Self {
            config,
            clock: SimTime::ZERO,
            table: ProcessTable::new(capacity),
            ready: std::array::from_fn(|_| SlotQueue::new(capacity)),
            blocked: SlotQueue::new(capacity),
            admitted: 0,
            metrics: SchedulerMetrics::default(),
            last_snapshot: SimTime::ZERO,
            rng,
            sender,
            spawner,
            trace: None,
            shutdown: Arc::new(tx),
        }
    }

    /// Attach a trace sink. Without one, events only reach `tracing` at
    /// debug level and no snapshots are taken.
    pub fn with_trace(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn ready_queue(&self, level: QueueLevel) -> &SlotQueue {
        &self.ready[level.index()]
    }

    pub fn blocked_queue(&self) -> &SlotQueue {
        &self.blocked
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn live_count(&self) -> usize {
        self.table.live_count()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Ordered contents of the three ready queues and the blocked set.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            at: self.clock,
            ready: std::array::from_fn(|i| self.ready[i].snapshot()),
            blocked: self.blocked.snapshot(),
        }
    }

    pub(super) fn emit(&mut self, event: TraceEvent) -> Result<(), SchedulerError> {
        debug!(kind = event.kind(), clock = %self.clock, "{event}");
        if let Some(sink) = self.trace.as_mut() {
            sink.record(&event)?;
        }
        Ok(())
    }
}
