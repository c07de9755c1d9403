use serde::{Deserialize, Serialize};

/// Index into the fixed-capacity process table.
pub type SlotIndex = usize;

/// Opaque identity of a simulated worker.
///
/// Assigned monotonically by the spawner and never reused within a run,
/// so a stale reply can always be told apart from the slot's new owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W{}", self.0)
    }
}
