use chrono::{DateTime, Utc};
use mlfq_core::WorkerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope exchanged between the scheduler and a worker.
///
/// The payload is MessagePack-encoded so request and reply bodies stay
/// transport-agnostic. `worker` is the routing identity: on a request it
/// names the addressee, on a reply it names the sender. `correlation_id`
/// ties a reply to the dispatch that caused it.
#[derive(Debug, Clone)]
pub struct Message {
    /// Protocol topic (see [`crate::topics`]).
    pub topic: String,

    /// Worker this message is addressed to or sent from.
    pub worker: WorkerId,

    /// MessagePack-encoded payload bytes.
    pub payload: Vec<u8>,

    /// Wall-clock creation time, for diagnostics only. Scheduling uses the
    /// simulated clock exclusively.
    pub timestamp: DateTime<Utc>,

    /// Correlation ID shared by a request and its reply.
    pub correlation_id: Uuid,
}

impl Message {
    /// Create a new message with a fresh correlation ID.
    pub fn new<T: Serialize>(
        topic: impl Into<String>,
        worker: WorkerId,
        payload: &T,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            worker,
            payload: rmp_serde::to_vec(payload)?,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
        })
    }

    /// Build the reply to this message, keeping its worker and correlation ID.
    pub fn reply<T: Serialize>(
        &self,
        topic: impl Into<String>,
        payload: &T,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            worker: self.worker,
            payload: rmp_serde::to_vec(payload)?,
            timestamp: Utc::now(),
            correlation_id: self.correlation_id,
        })
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }
}
