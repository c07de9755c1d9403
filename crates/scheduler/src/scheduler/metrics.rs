use mlfq_core::Nanos;
use mlfq_dispatch::Outcome;

use super::types::QueueLevel;

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerMetrics {
    /// Scheduler loop iterations.
    pub ticks: u64,
    /// Ticks on which nothing was ready to run.
    pub idle_ticks: u64,
    /// Completed dispatches per source level.
    pub dispatches: [u64; 3],
    pub admitted: u64,
    pub terminated: u64,
    pub blocked: u64,
    pub unblocked: u64,
    /// Dispatches that ran the whole quantum.
    pub exhausted: u64,
    pub spawn_failures: u64,
    /// Simulated CPU time handed to workers.
    pub cpu_time_ns: Nanos,
    /// Simulated time spent on context switches.
    pub overhead_ns: Nanos,
    pub snapshots: u64,
}

impl SchedulerMetrics {
    /// Record a completed dispatch from `level`.
    pub fn record_dispatch(&mut self, level: QueueLevel, outcome: &Outcome, overhead: Nanos) {
        self.dispatches[level.index()] += 1;
        self.cpu_time_ns += outcome.used();
        self.overhead_ns += overhead;
        match outcome {
            Outcome::Terminated { .. } => self.terminated += 1,
            Outcome::Blocked { .. } => self.blocked += 1,
            Outcome::Exhausted { .. } => self.exhausted += 1,
        }
    }

    pub fn total_dispatches(&self) -> u64 {
        self.dispatches.iter().sum()
    }
}
