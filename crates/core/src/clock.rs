//! Logical simulation clock.
//!
//! Time is a `(seconds, nanoseconds)` pair normalized so that
//! `nanoseconds < 1_000_000_000`. Every duration in the simulator is a
//! plain nanosecond count ([`Nanos`]); the clock only ever moves forward.

use serde::{Deserialize, Serialize};

/// A duration in simulated nanoseconds.
pub type Nanos = u64;

pub const NANOS_PER_SEC: Nanos = 1_000_000_000;

/// A point in simulated time.
///
/// Field order matters: the derived `Ord` compares seconds first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl SimTime {
    pub const ZERO: SimTime = SimTime { seconds: 0, nanoseconds: 0 };

    /// Build a normalized time from a raw nanosecond count.
    pub fn from_nanos(total: u128) -> Self {
        Self {
            seconds: (total / NANOS_PER_SEC as u128) as u64,
            nanoseconds: (total % NANOS_PER_SEC as u128) as u32,
        }
    }

    /// Advance by `delta` nanoseconds, carrying into seconds.
    pub fn advance(&mut self, delta: Nanos) {
        let nanos = self.nanoseconds as u64 + delta % NANOS_PER_SEC;
        self.seconds += delta / NANOS_PER_SEC + nanos / NANOS_PER_SEC;
        self.nanoseconds = (nanos % NANOS_PER_SEC) as u32;
    }

    /// The time `delta` nanoseconds after `self`, leaving `self` untouched.
    pub fn after(&self, delta: Nanos) -> Self {
        let mut t = *self;
        t.advance(delta);
        t
    }

    pub fn as_nanos(&self) -> u128 {
        self.seconds as u128 * NANOS_PER_SEC as u128 + self.nanoseconds as u128
    }

    /// Nanoseconds elapsed since `earlier`, or zero if `earlier` is later.
    pub fn since(&self, earlier: &SimTime) -> u128 {
        self.as_nanos().saturating_sub(earlier.as_nanos())
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:09}", self.seconds, self.nanoseconds)
    }
}
