//! Scheduler runner -- owns all scheduling state and drives the tick loop.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, accessors and trace emission
//! - `admission`: bringing new workers into free slots
//! - `scheduling`: unblock scan, queue selection, idle ticks and snapshots
//! - `execution`: dispatch round-trips, outcome handling and the run loop

mod admission;
mod core;
mod execution;
mod scheduling;
#[cfg(test)]
mod tests;

pub use self::core::{Scheduler, ShutdownHandle};
