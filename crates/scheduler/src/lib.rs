pub mod scheduler;

pub use scheduler::{
    FileTrace, MemoryTrace, ProcessSlot, ProcessTable, QueueLevel, QueueSnapshot, RunOutcome,
    RunSummary, Scheduler, SchedulerConfig, SchedulerError, SchedulerMetrics, ShutdownHandle,
    SlotQueue, TraceEvent, TraceSink, SLOT_CAPACITY,
};
