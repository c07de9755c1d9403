use tracing::warn;

use super::types::*;
use crate::scheduler::types::SLOT_CAPACITY;

/// Largest base quantum whose level-2 quantum still fits the signed reply.
const MAX_BASE_QUANTUM_NS: u64 = (i64::MAX as u64) >> 2;

impl SchedulerConfig {
    /// Replace every out-of-range value with its default.
    ///
    /// Returns the names of the fields that were reset, each of which is
    /// also logged at `warn`. A sanitized config never makes the scheduler
    /// panic or divide by zero.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut reset = Vec::new();

        if !(1..=SLOT_CAPACITY).contains(&self.max_concurrent) {
            reset.push(("max_concurrent", self.max_concurrent.to_string()));
            self.max_concurrent = default_max_concurrent();
        }
        if self.max_total == 0 {
            reset.push(("max_total", self.max_total.to_string()));
            self.max_total = default_max_total();
        }
        if self.max_runtime_secs == 0 {
            reset.push(("max_runtime_secs", self.max_runtime_secs.to_string()));
            self.max_runtime_secs = default_max_runtime_secs();
        }
        if self.max_sim_time_ns == Some(0) {
            reset.push(("max_sim_time_ns", "0".to_string()));
            self.max_sim_time_ns = None;
        }
        if !(1..=MAX_BASE_QUANTUM_NS).contains(&self.base_quantum_ns) {
            reset.push(("base_quantum_ns", self.base_quantum_ns.to_string()));
            self.base_quantum_ns = default_base_quantum_ns();
        }
        if self.trace_interval_ns == 0 {
            reset.push(("trace_interval_ns", "0".to_string()));
            self.trace_interval_ns = default_trace_interval_ns();
        }
        if self.idle_increment_ns == 0 {
            reset.push(("idle_increment_ns", "0".to_string()));
            self.idle_increment_ns = default_idle_increment_ns();
        }
        if self.dispatch_overhead_min_ns > self.dispatch_overhead_max_ns {
            reset.push((
                "dispatch_overhead_ns",
                format!("{}..={}", self.dispatch_overhead_min_ns, self.dispatch_overhead_max_ns),
            ));
            self.dispatch_overhead_min_ns = default_dispatch_overhead_min_ns();
            self.dispatch_overhead_max_ns = default_dispatch_overhead_max_ns();
        }
        if self.max_block_delay_ns == 0 {
            reset.push(("max_block_delay_ns", "0".to_string()));
            self.max_block_delay_ns = default_max_block_delay_ns();
        }
        if self.dispatch_timeout_ms == 0 {
            reset.push(("dispatch_timeout_ms", "0".to_string()));
            self.dispatch_timeout_ms = default_dispatch_timeout_ms();
        }
        if self.trace_path.as_os_str().is_empty() {
            reset.push(("trace_path", String::new()));
            self.trace_path = default_trace_path();
        }

        for (field, value) in &reset {
            warn!(field, value = %value, "config value out of range, using default");
        }
        reset.into_iter().map(|(field, _)| field).collect()
    }
}
