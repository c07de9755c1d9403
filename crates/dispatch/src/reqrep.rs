//! In-memory request/reply hub connecting the scheduler to its workers.
//!
//! Each registered worker gets a private bounded inbox. A request travels
//! to that inbox together with a [`ReplyToken`] that owns the one-shot
//! return path, so a reply can only ever reach the call that sent the
//! matching request:
//!
//! - [`DispatchHub`] is the scheduler side ([`RequestSender`])
//! - [`WorkerEndpoint`] is the worker side ([`RequestHandler`])
//!
//! Dropping a worker's route closes its inbox, which is how the hub tells a
//! worker to stop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mlfq_core::WorkerId;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::message::Message;
use crate::traits::{RequestHandler, RequestSender};

/// Opaque handle routing a reply back to the waiting request.
///
/// Carries the identity and correlation ID the reply must match.
#[derive(Debug)]
pub struct ReplyToken {
    worker: WorkerId,
    correlation_id: Uuid,
    reply_tx: oneshot::Sender<Message>,
}

impl ReplyToken {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// A request as it sits in a worker's inbox.
struct Inbound {
    token: ReplyToken,
    message: Message,
}

/// Scheduler-side hub owning every worker route.
pub struct DispatchHub {
    routes: Mutex<HashMap<WorkerId, mpsc::Sender<Inbound>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl DispatchHub {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Allocate a fresh worker identity and its endpoint.
    ///
    /// Fails once the hub has been closed.
    pub async fn register(&self) -> Result<WorkerEndpoint, DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Spawn("dispatch hub is closed".into()));
        }
        let worker = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Capacity 1: the scheduler never has two requests outstanding to one worker.
        let (tx, rx) = mpsc::channel(1);
        self.routes.lock().await.insert(worker, tx);
        debug!(%worker, "registered worker route");
        Ok(WorkerEndpoint {
            worker,
            inbox: Mutex::new(rx),
        })
    }

    /// Drop the route to `worker`, closing its inbox. Returns whether a
    /// route existed.
    pub async fn deregister(&self, worker: WorkerId) -> bool {
        let removed = self.routes.lock().await.remove(&worker).is_some();
        if removed {
            debug!(%worker, "deregistered worker route");
        }
        removed
    }

    /// Close the hub: no new registrations, every inbox closed.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut routes = self.routes.lock().await;
        debug!(routes = routes.len(), "closing dispatch hub");
        routes.clear();
    }

    pub async fn route_count(&self) -> usize {
        self.routes.lock().await.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for DispatchHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestSender for DispatchHub {
    /// Deliver `msg` to `msg.worker` and wait for the correlated reply.
    #[instrument(skip_all, fields(worker = %msg.worker, correlation_id = %msg.correlation_id))]
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, DispatchError> {
        let worker = msg.worker;
        let correlation_id = msg.correlation_id;

        let route = self
            .routes
            .lock()
            .await
            .get(&worker)
            .cloned()
            .ok_or(DispatchError::UnknownWorker(worker))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let inbound = Inbound {
            token: ReplyToken { worker, correlation_id, reply_tx },
            message: msg,
        };

        let exchange = async {
            route
                .send(inbound)
                .await
                .map_err(|_| DispatchError::ChannelClosed(worker))?;
            debug!("sent request");
            reply_rx.await.map_err(|_| DispatchError::ChannelClosed(worker))
        };

        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DispatchError::Timeout(timeout))??;

        if reply.worker != worker {
            warn!(actual = %reply.worker, "reply identity mismatch");
            return Err(DispatchError::IdentityMismatch { expected: worker, actual: reply.worker });
        }
        if reply.correlation_id != correlation_id {
            return Err(DispatchError::CorrelationMismatch {
                expected: correlation_id,
                actual: reply.correlation_id,
            });
        }
        debug!(topic = %reply.topic, "received reply");
        Ok(reply)
    }
}

/// Worker-side endpoint: a private inbox on the hub.
pub struct WorkerEndpoint {
    worker: WorkerId,
    inbox: Mutex<mpsc::Receiver<Inbound>>,
}

impl WorkerEndpoint {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

#[async_trait]
impl RequestHandler for WorkerEndpoint {
    async fn recv_request(&self) -> Result<(ReplyToken, Message), DispatchError> {
        let mut inbox = self.inbox.lock().await;
        match inbox.recv().await {
            Some(Inbound { token, message }) => {
                debug!(worker = %self.worker, topic = %message.topic, "received request");
                Ok((token, message))
            }
            None => Err(DispatchError::ChannelClosed(self.worker)),
        }
    }

    /// Fails with [`DispatchError::ChannelClosed`] if the scheduler stopped
    /// waiting (timeout or shutdown).
    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), DispatchError> {
        token
            .reply_tx
            .send(reply)
            .map_err(|_| DispatchError::ChannelClosed(token.worker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_assigns_distinct_ids() {
        let hub = DispatchHub::new();
        let a = hub.register().await.unwrap();
        let b = hub.register().await.unwrap();
        assert_ne!(a.worker(), b.worker());
        assert_eq!(hub.route_count().await, 2);
    }

    #[tokio::test]
    async fn closed_hub_refuses_registration() {
        let hub = DispatchHub::new();
        let _ep = hub.register().await.unwrap();
        hub.close().await;
        assert!(hub.is_closed());
        assert_eq!(hub.route_count().await, 0);
        assert!(matches!(hub.register().await, Err(DispatchError::Spawn(_))));
    }

    #[tokio::test]
    async fn deregister_closes_inbox() {
        let hub = DispatchHub::new();
        let ep = hub.register().await.unwrap();
        assert!(hub.deregister(ep.worker()).await);
        assert!(!hub.deregister(ep.worker()).await);
        let err = ep.recv_request().await.unwrap_err();
        assert!(matches!(err, DispatchError::ChannelClosed(w) if w == ep.worker()));
    }
}
