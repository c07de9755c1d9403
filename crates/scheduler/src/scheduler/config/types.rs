use std::path::PathBuf;
use std::time::Duration;

use mlfq_core::Nanos;
use serde::{Deserialize, Serialize};

use crate::scheduler::types::QueueLevel;

/// Scheduler configuration, typically parsed from TOML.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum workers alive at once (1-18).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum workers admitted over the whole run.
    #[serde(default = "default_max_total")]
    pub max_total: usize,
    /// Wall-clock cap on the run, in seconds.
    #[serde(default = "default_max_runtime_secs")]
    pub max_runtime_secs: u64,
    /// Optional cap on simulated time, in nanoseconds.
    #[serde(default)]
    pub max_sim_time_ns: Option<Nanos>,
    /// Quantum for level 0; each lower level doubles it.
    #[serde(default = "default_base_quantum_ns")]
    pub base_quantum_ns: Nanos,
    /// Simulated time between queue snapshots in the trace.
    #[serde(default = "default_trace_interval_ns")]
    pub trace_interval_ns: Nanos,
    /// Clock advance on a tick with nothing to run.
    #[serde(default = "default_idle_increment_ns")]
    pub idle_increment_ns: Nanos,
    /// Lower bound of the context-switch cost added before each dispatch.
    #[serde(default = "default_dispatch_overhead_min_ns")]
    pub dispatch_overhead_min_ns: Nanos,
    /// Upper bound (inclusive) of the context-switch cost.
    #[serde(default = "default_dispatch_overhead_max_ns")]
    pub dispatch_overhead_max_ns: Nanos,
    /// Upper bound (inclusive) of how long a blocked worker stays blocked.
    #[serde(default = "default_max_block_delay_ns")]
    pub max_block_delay_ns: Nanos,
    /// Wall-clock wait for a worker reply before the dispatch is declared failed.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    /// RNG seed for reproducible runs. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Trace file destination.
    #[serde(default = "default_trace_path")]
    pub trace_path: PathBuf,
    /// Whether to write the trace at all.
    #[serde(default = "default_trace_enabled")]
    pub trace_enabled: bool,
}

pub(super) fn default_max_concurrent() -> usize { 5 }
pub(super) fn default_max_total() -> usize { 100 }
pub(super) fn default_max_runtime_secs() -> u64 { 3 }
pub(super) fn default_base_quantum_ns() -> Nanos { 10_000_000 }
pub(super) fn default_trace_interval_ns() -> Nanos { 500_000_000 }
pub(super) fn default_idle_increment_ns() -> Nanos { 100_000 }
pub(super) fn default_dispatch_overhead_min_ns() -> Nanos { 100 }
pub(super) fn default_dispatch_overhead_max_ns() -> Nanos { 10_099 }
pub(super) fn default_max_block_delay_ns() -> Nanos { 500_000_000 }
pub(super) fn default_dispatch_timeout_ms() -> u64 { 5_000 }
pub(super) fn default_trace_path() -> PathBuf { PathBuf::from("msglog.out") }
pub(super) fn default_trace_enabled() -> bool { true }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_total: default_max_total(),
            max_runtime_secs: default_max_runtime_secs(),
            max_sim_time_ns: None,
            base_quantum_ns: default_base_quantum_ns(),
            trace_interval_ns: default_trace_interval_ns(),
            idle_increment_ns: default_idle_increment_ns(),
            dispatch_overhead_min_ns: default_dispatch_overhead_min_ns(),
            dispatch_overhead_max_ns: default_dispatch_overhead_max_ns(),
            max_block_delay_ns: default_max_block_delay_ns(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            seed: None,
            trace_path: default_trace_path(),
            trace_enabled: default_trace_enabled(),
        }
    }
}

impl SchedulerConfig {
    /// Quantum granted at `level`: `base × 2^level`.
    pub fn quantum_for(&self, level: QueueLevel) -> Nanos {
        self.base_quantum_ns << level.index()
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_secs)
    }
}
