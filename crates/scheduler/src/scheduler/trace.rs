//! Simulation trace: the run's output artifact.
//!
//! Distinct from `tracing` diagnostics. Each [`TraceEvent`] renders as one
//! human-readable line; snapshots render as a short block.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use mlfq_core::{Nanos, SimTime, SlotIndex, WorkerId};

use super::error::SchedulerError;
use super::metrics::SchedulerMetrics;
use super::types::{QueueLevel, RunOutcome};

/// Ordered contents of every container at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub at: SimTime,
    pub ready: [Vec<SlotIndex>; 3],
    pub blocked: Vec<SlotIndex>,
}

/// End-of-run statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub clock: SimTime,
    pub metrics: SchedulerMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Admitted {
        worker: WorkerId,
        slot: SlotIndex,
        level: QueueLevel,
        at: SimTime,
    },
    SpawnFailed {
        slot: SlotIndex,
        at: SimTime,
        reason: String,
    },
    Dispatched {
        worker: WorkerId,
        slot: SlotIndex,
        level: QueueLevel,
        quantum: Nanos,
        at: SimTime,
    },
    Terminated {
        worker: WorkerId,
        slot: SlotIndex,
        used: Nanos,
        at: SimTime,
    },
    Blocked {
        worker: WorkerId,
        slot: SlotIndex,
        used: Nanos,
        until: SimTime,
        at: SimTime,
    },
    /// Ran the whole quantum and went back to `level`.
    Requeued {
        worker: WorkerId,
        slot: SlotIndex,
        used: Nanos,
        level: QueueLevel,
        at: SimTime,
    },
    Unblocked {
        worker: WorkerId,
        slot: SlotIndex,
        at: SimTime,
    },
    Snapshot(QueueSnapshot),
    Summary(RunSummary),
}

impl TraceEvent {
    /// Short name, used as the diagnostic log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Admitted { .. } => "admitted",
            TraceEvent::SpawnFailed { .. } => "spawn_failed",
            TraceEvent::Dispatched { .. } => "dispatched",
            TraceEvent::Terminated { .. } => "terminated",
            TraceEvent::Blocked { .. } => "blocked",
            TraceEvent::Requeued { .. } => "requeued",
            TraceEvent::Unblocked { .. } => "unblocked",
            TraceEvent::Snapshot(_) => "snapshot",
            TraceEvent::Summary(_) => "summary",
        }
    }
}

fn write_slots(f: &mut fmt::Formatter<'_>, slots: &[SlotIndex]) -> fmt::Result {
    if slots.is_empty() {
        return f.write_str(" (empty)");
    }
    for s in slots {
        write!(f, " {s}")?;
    }
    Ok(())
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Admitted { worker, slot, level, at } => {
                write!(f, "{at} admitted {worker} into queue {level} (slot {slot})")
            }
            TraceEvent::SpawnFailed { slot, at, reason } => {
                write!(f, "{at} spawn failed for slot {slot}: {reason}")
            }
            TraceEvent::Dispatched { worker, slot, level, quantum, at } => {
                write!(f, "{at} dispatching {worker} from queue {level} (slot {slot}, quantum {quantum} ns)")
            }
            TraceEvent::Terminated { worker, slot, used, at } => {
                write!(f, "{at} {worker} terminated after {used} ns (slot {slot})")
            }
            TraceEvent::Blocked { worker, slot, used, until, at } => {
                write!(f, "{at} {worker} blocked after {used} ns until {until} (slot {slot})")
            }
            TraceEvent::Requeued { worker, slot, used, level, at } => {
                write!(f, "{at} {worker} used its full quantum of {used} ns, now in queue {level} (slot {slot})")
            }
            TraceEvent::Unblocked { worker, slot, at } => {
                write!(f, "{at} unblocked {worker} into queue 0 (slot {slot})")
            }
            TraceEvent::Snapshot(snap) => {
                writeln!(f, "{} queue state", snap.at)?;
                for (level, slots) in snap.ready.iter().enumerate() {
                    write!(f, "  Queue {level}:")?;
                    write_slots(f, slots)?;
                    writeln!(f)?;
                }
                write!(f, "  Blocked:")?;
                write_slots(f, &snap.blocked)
            }
            TraceEvent::Summary(summary) => {
                let m = &summary.metrics;
                writeln!(f, "{} run {}", summary.clock, summary.outcome)?;
                writeln!(f, "  Workers admitted: {}", m.admitted)?;
                writeln!(f, "  Spawn failures: {}", m.spawn_failures)?;
                writeln!(
                    f,
                    "  Dispatches by queue: {} / {} / {}",
                    m.dispatches[0], m.dispatches[1], m.dispatches[2]
                )?;
                writeln!(
                    f,
                    "  Terminated: {}  Blocked: {}  Unblocked: {}  Full quanta: {}",
                    m.terminated, m.blocked, m.unblocked, m.exhausted
                )?;
                writeln!(f, "  CPU time: {} ns  Overhead: {} ns", m.cpu_time_ns, m.overhead_ns)?;
                write!(f, "  Ticks: {}  Idle ticks: {}", m.ticks, m.idle_ticks)
            }
        }
    }
}

/// Destination for trace events.
pub trait TraceSink: Send {
    fn record(&mut self, event: &TraceEvent) -> Result<(), SchedulerError>;

    fn flush(&mut self) -> Result<(), SchedulerError>;
}

/// Buffered trace file.
pub struct FileTrace {
    out: BufWriter<File>,
}

impl FileTrace {
    /// Create (or truncate) the trace file and write its header.
    pub fn create(path: &Path) -> Result<Self, SchedulerError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "# mlfq-sim trace, started {}", chrono::Utc::now().to_rfc3339())?;
        Ok(Self { out })
    }
}

impl TraceSink for FileTrace {
    fn record(&mut self, event: &TraceEvent) -> Result<(), SchedulerError> {
        writeln!(self.out, "{event}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SchedulerError> {
        self.out.flush()?;
        Ok(())
    }
}

/// In-memory sink. Clones share the same buffer, so a test can keep one
/// handle while the scheduler owns another.
#[derive(Clone, Default)]
pub struct MemoryTrace {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TraceSink for MemoryTrace {
    fn record(&mut self, event: &TraceEvent) -> Result<(), SchedulerError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SchedulerError> {
        Ok(())
    }
}
