use mlfq_core::{Nanos, WorkerId};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the scheduler/worker dispatch protocol.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("no reply from worker within {0:?}")]
    Timeout(std::time::Duration),

    #[error("no route to worker {0}")]
    UnknownWorker(WorkerId),

    #[error("channel to worker {0} closed")]
    ChannelClosed(WorkerId),

    #[error("reply from {actual}, expected {expected}")]
    IdentityMismatch { expected: WorkerId, actual: WorkerId },

    #[error("reply correlation {actual} does not match request {expected}")]
    CorrelationMismatch { expected: Uuid, actual: Uuid },

    #[error("used time {used} outside 1..={quantum} (sign encodes termination)")]
    InvalidUsedTime { used: i64, quantum: Nanos },

    #[error("unexpected topic {0:?}")]
    UnexpectedTopic(String),

    #[error("worker spawn failed: {0}")]
    Spawn(String),
}

impl DispatchError {
    /// Whether the error breaks the request/reply contract, as opposed to
    /// a transport or lifecycle failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::IdentityMismatch { .. }
                | Self::CorrelationMismatch { .. }
                | Self::InvalidUsedTime { .. }
                | Self::UnexpectedTopic(_)
                | Self::Deserialization(_)
        )
    }
}
