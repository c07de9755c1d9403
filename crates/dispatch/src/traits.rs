use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mlfq_core::{SlotIndex, WorkerId};

use crate::error::DispatchError;
use crate::message::Message;
use crate::reqrep::ReplyToken;

/// Scheduler side of the dispatch protocol.
///
/// Sends a request to the worker named in `msg.worker` and waits for the
/// reply that carries the same correlation ID. Only one request per worker
/// is ever outstanding.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Send a request and wait for its reply, failing with
    /// [`DispatchError::Timeout`] if none arrives within `timeout`.
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, DispatchError>;
}

/// Blanket implementation so `Arc<dyn RequestSender>` can be used directly.
#[async_trait]
impl<T: RequestSender + ?Sized> RequestSender for Arc<T> {
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, DispatchError> {
        (**self).request(msg, timeout).await
    }
}

/// Worker side of the dispatch protocol.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Wait for the next request. Fails with [`DispatchError::ChannelClosed`]
    /// once the scheduler has released this worker.
    async fn recv_request(&self) -> Result<(ReplyToken, Message), DispatchError>;

    /// Answer the request identified by `token`. Must be called exactly once
    /// per received request.
    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), DispatchError>;
}

/// Creates and tears down worker units.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Start a worker for `slot` and return its identity.
    async fn spawn(&self, slot: SlotIndex) -> Result<WorkerId, DispatchError>;

    /// Forget a worker that reported termination on its own.
    async fn release(&self, worker: WorkerId);

    /// Forcibly stop a live worker. Best-effort; never fails.
    async fn terminate(&self, worker: WorkerId);

    /// Refuse further spawns and stop every remaining worker.
    async fn close(&self);
}

#[async_trait]
impl<T: WorkerSpawner + ?Sized> WorkerSpawner for Arc<T> {
    async fn spawn(&self, slot: SlotIndex) -> Result<WorkerId, DispatchError> {
        (**self).spawn(slot).await
    }

    async fn release(&self, worker: WorkerId) {
        (**self).release(worker).await
    }

    async fn terminate(&self, worker: WorkerId) {
        (**self).terminate(worker).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
