use serde::{Deserialize, Serialize};

/// Number of slots in the process table, and so the capacity of every queue.
pub const SLOT_CAPACITY: usize = 18;

/// Ready-queue level. Lower numeric value = higher priority.
///
/// A worker that runs its whole quantum moves one level down; lower levels
/// get longer quanta (see [`crate::SchedulerConfig::quantum_for`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueLevel {
    /// Fresh admissions and unblocked workers.
    #[default]
    Q0 = 0,
    Q1 = 1,
    /// Bottom level; demotion stops here.
    Q2 = 2,
}

impl QueueLevel {
    /// Levels in selection order.
    pub const ALL: [QueueLevel; 3] = [QueueLevel::Q0, QueueLevel::Q1, QueueLevel::Q2];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The level after running a full quantum.
    pub fn demoted(self) -> Self {
        match self {
            QueueLevel::Q0 => QueueLevel::Q1,
            QueueLevel::Q1 | QueueLevel::Q2 => QueueLevel::Q2,
        }
    }
}

impl std::fmt::Display for QueueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Why a simulation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every admissible worker was admitted and has terminated.
    Completed,
    /// The wall-clock runtime cap elapsed.
    RuntimeLimit,
    /// Simulated time reached the configured cap.
    SimTimeLimit,
    /// An external shutdown request stopped the run.
    Interrupted,
}

impl RunOutcome {
    /// Process exit status: zero for any planned end, 130 for an interrupt.
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Completed | RunOutcome::RuntimeLimit | RunOutcome::SimTimeLimit => 0,
            RunOutcome::Interrupted => 130,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::RuntimeLimit => "runtime limit reached",
            RunOutcome::SimTimeLimit => "simulated time limit reached",
            RunOutcome::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}
