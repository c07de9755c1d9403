//! Dispatch request/reply payloads.
//!
//! A reply encodes three dispositions in one signed integer:
//!
//! | `used_time`              | meaning                          |
//! |--------------------------|----------------------------------|
//! | `< 0`                    | terminated after `|used_time|`   |
//! | `0 < used_time < quantum`| blocked after `used_time`        |
//! | `== quantum`             | ran the whole quantum            |
//!
//! Any reply with `|used_time|` outside `1..=quantum` violates the protocol.

use mlfq_core::Nanos;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Quantum grant sent to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub quantum: Nanos,
}

/// Worker's answer to a [`DispatchRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReply {
    pub used_time: i64,
}

/// Decoded result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Terminated { used: Nanos },
    Blocked { used: Nanos },
    Exhausted { used: Nanos },
}

impl Outcome {
    /// Decode a signed usage report against the quantum that was granted.
    pub fn classify(used_time: i64, quantum: Nanos) -> Result<Self, DispatchError> {
        let used = used_time.unsigned_abs();
        if used == 0 || used > quantum {
            return Err(DispatchError::InvalidUsedTime { used: used_time, quantum });
        }
        Ok(if used_time < 0 {
            Outcome::Terminated { used }
        } else if used < quantum {
            Outcome::Blocked { used }
        } else {
            Outcome::Exhausted { used }
        })
    }

    /// Simulated CPU time consumed, regardless of disposition.
    pub fn used(&self) -> Nanos {
        match *self {
            Outcome::Terminated { used } | Outcome::Blocked { used } | Outcome::Exhausted { used } => used,
        }
    }

    /// Signed wire encoding of this outcome.
    pub fn to_reply(&self) -> DispatchReply {
        let used_time = match *self {
            Outcome::Terminated { used } => -(used as i64),
            Outcome::Blocked { used } | Outcome::Exhausted { used } => used as i64,
        };
        DispatchReply { used_time }
    }

    pub fn disposition(&self) -> &'static str {
        match self {
            Outcome::Terminated { .. } => "terminated",
            Outcome::Blocked { .. } => "blocked",
            Outcome::Exhausted { .. } => "exhausted",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} after {} ns", self.disposition(), self.used())
    }
}
