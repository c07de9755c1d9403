//! Synthetic workers and their lifecycle.
//!
//! Provides the [`WorkerPolicy`] trait deciding how a worker spends each
//! quantum, the default [`RandomPolicy`], [`WorkerRunner`] for the
//! receive/decide/reply loop, and [`TaskSpawner`] which runs each worker as
//! its own tokio task behind a [`DispatchHub`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mlfq_core::{Nanos, SlotIndex, WorkerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::messages::dispatch::{DispatchRequest, Outcome};
use crate::messages::topics::{DISPATCH_REPLY, DISPATCH_REQUEST};
use crate::reqrep::DispatchHub;
use crate::traits::{RequestHandler, WorkerSpawner};

// ── Policy ───────────────────────────────────────────────────────────

/// Decides how a worker uses one granted quantum.
///
/// Implementations must return an outcome whose used time lies in
/// `1..=quantum`, and a blocked outcome must use strictly less than the
/// quantum.
pub trait WorkerPolicy: Send + Sync {
    fn decide(&self, quantum: Nanos, rng: &mut StdRng) -> Outcome;
}

/// Percentage-based policy: terminate, block, or run the full quantum.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    /// Chance (0-100) of terminating during this quantum.
    pub terminate_pct: u32,
    /// Chance (0-100) of blocking; rolled after termination.
    pub block_pct: u32,
    /// Lower bound for a partial run when the quantum allows it.
    pub min_partial_ns: Nanos,
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self {
            terminate_pct: 25,
            block_pct: 35,
            min_partial_ns: 1_000,
        }
    }
}

impl RandomPolicy {
    /// A random run length in `[min_partial, quantum)`, or `None` when the
    /// quantum is too short to stop early.
    fn partial_run(&self, quantum: Nanos, rng: &mut StdRng) -> Option<Nanos> {
        if quantum < 2 {
            return None;
        }
        let low = self.min_partial_ns.clamp(1, quantum - 1);
        Some(rng.gen_range(low..quantum))
    }
}

impl WorkerPolicy for RandomPolicy {
    fn decide(&self, quantum: Nanos, rng: &mut StdRng) -> Outcome {
        let roll = rng.gen_range(0..100u32);
        if roll < self.terminate_pct {
            let used = self.partial_run(quantum, rng).unwrap_or(quantum);
            Outcome::Terminated { used }
        } else if roll < self.terminate_pct + self.block_pct {
            match self.partial_run(quantum, rng) {
                Some(used) => Outcome::Blocked { used },
                None => Outcome::Exhausted { used: quantum },
            }
        } else {
            Outcome::Exhausted { used: quantum }
        }
    }
}

// ── Runner ───────────────────────────────────────────────────────────

/// Why a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker reported termination in a reply.
    Terminated,
    /// The scheduler closed the worker's inbox.
    Released,
}

/// Runs one worker: receive a quantum, decide, reply, repeat.
pub struct WorkerRunner;

impl WorkerRunner {
    /// Serve requests until the worker terminates or its inbox closes.
    ///
    /// A reply that cannot be delivered means the scheduler gave up on this
    /// dispatch, so the worker exits as released.
    pub async fn run(
        endpoint: &dyn RequestHandler,
        worker: WorkerId,
        policy: &dyn WorkerPolicy,
        rng: &mut StdRng,
    ) -> Result<WorkerExit, DispatchError> {
        loop {
            let (token, msg) = match endpoint.recv_request().await {
                Ok(req) => req,
                Err(DispatchError::ChannelClosed(_)) => return Ok(WorkerExit::Released),
                Err(e) => return Err(e),
            };

            if msg.topic != DISPATCH_REQUEST {
                return Err(DispatchError::UnexpectedTopic(msg.topic));
            }
            let request: DispatchRequest = msg.decode()?;
            let outcome = policy.decide(request.quantum, rng);
            debug!(%worker, quantum = request.quantum, %outcome, "worker decided");

            let reply = msg.reply(DISPATCH_REPLY, &outcome.to_reply())?;
            if endpoint.send_reply(token, reply).await.is_err() {
                return Ok(WorkerExit::Released);
            }

            if let Outcome::Terminated { .. } = outcome {
                return Ok(WorkerExit::Terminated);
            }
        }
    }
}

// ── Spawner ──────────────────────────────────────────────────────────

/// Spawns each worker as a tokio task registered on a [`DispatchHub`].
pub struct TaskSpawner {
    hub: Arc<DispatchHub>,
    policy: Arc<dyn WorkerPolicy>,
    /// Base seed for per-worker RNGs; `None` seeds from OS entropy.
    seed: Option<u64>,
    tasks: Mutex<HashMap<WorkerId, JoinHandle<()>>>,
}

impl TaskSpawner {
    pub fn new(hub: Arc<DispatchHub>, policy: Arc<dyn WorkerPolicy>, seed: Option<u64>) -> Self {
        Self {
            hub,
            policy,
            seed,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn rng_for(&self, worker: WorkerId) -> StdRng {
        match self.seed {
            // Spread sequential ids so neighbouring workers get unrelated streams.
            Some(seed) => StdRng::seed_from_u64(seed ^ worker.0.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => StdRng::from_entropy(),
        }
    }

    pub async fn live_tasks(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[async_trait]
impl WorkerSpawner for TaskSpawner {
    async fn spawn(&self, slot: SlotIndex) -> Result<WorkerId, DispatchError> {
        let endpoint = self.hub.register().await?;
        let worker = endpoint.worker();
        let policy = Arc::clone(&self.policy);
        let mut rng = self.rng_for(worker);

        let handle = tokio::spawn(async move {
            match WorkerRunner::run(&endpoint, worker, &*policy, &mut rng).await {
                Ok(exit) => debug!(%worker, slot, ?exit, "worker exited"),
                Err(e) => warn!(%worker, slot, error = %e, "worker failed"),
            }
        });

        self.tasks.lock().await.insert(worker, handle);
        Ok(worker)
    }

    async fn release(&self, worker: WorkerId) {
        self.hub.deregister(worker).await;
        // The task is already on its way out after replying.
        self.tasks.lock().await.remove(&worker);
    }

    async fn terminate(&self, worker: WorkerId) {
        self.hub.deregister(worker).await;
        if let Some(handle) = self.tasks.lock().await.remove(&worker) {
            handle.abort();
            info!(%worker, "terminated worker");
        }
    }

    async fn close(&self) {
        self.hub.close().await;
        let mut tasks = self.tasks.lock().await;
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
