//! Multilevel feedback queue scheduler over simulated time.
//!
//! The [`Scheduler`] owns the simulated clock, the process table, three
//! ready queues and the blocked set. Each tick it admits at most one new
//! worker, wakes blocked workers whose deadline has passed, dispatches the
//! head of the highest non-empty ready queue, and applies the outcome the
//! worker reports. Workers are reached only through the dispatch protocol
//! in `mlfq-dispatch`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod runner;
pub mod table;
pub mod trace;
pub mod types;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use metrics::SchedulerMetrics;
pub use queue::SlotQueue;
pub use runner::{Scheduler, ShutdownHandle};
pub use table::{ProcessSlot, ProcessTable};
pub use trace::{FileTrace, MemoryTrace, QueueSnapshot, RunSummary, TraceEvent, TraceSink};
pub use types::{QueueLevel, RunOutcome, SLOT_CAPACITY};
