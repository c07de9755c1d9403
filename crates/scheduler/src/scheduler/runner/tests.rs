use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mlfq_core::{Nanos, SimTime, SlotIndex, WorkerId};
use mlfq_dispatch::{
    topics, DispatchError, DispatchReply, DispatchRequest, Message, RequestSender, WorkerSpawner,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::error::SchedulerError;
use crate::scheduler::runner::Scheduler;
use crate::scheduler::trace::{MemoryTrace, TraceEvent};
use crate::scheduler::types::{QueueLevel, RunOutcome};

const MS: Nanos = 1_000_000;
const OVERHEAD: Nanos = 100;

/// What a scripted worker answers to its next dispatch.
#[derive(Debug, Clone, Copy)]
enum Reply {
    Used(i64),
    /// Report the whole quantum as used.
    Exhaust,
}

/// Stands in for both the request channel and the worker spawner.
///
/// Replies are taken from a shared script in dispatch order; once it runs
/// out every dispatch exhausts its quantum.
#[derive(Default)]
struct ScriptedWorkers {
    next_id: AtomicU64,
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(WorkerId, Nanos)>>,
    fail_spawns: AtomicUsize,
    spawned: Mutex<Vec<(SlotIndex, WorkerId)>>,
    released: Mutex<Vec<WorkerId>>,
    terminated: Mutex<Vec<WorkerId>>,
    closed: AtomicBool,
    forge_identity: AtomicBool,
    stall: AtomicBool,
}

impl ScriptedWorkers {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_script(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        let workers = Self::default();
        workers.script.lock().unwrap().extend(replies);
        Arc::new(workers)
    }

    fn requests(&self) -> Vec<(WorkerId, Nanos)> {
        self.requests.lock().unwrap().clone()
    }

    fn released(&self) -> Vec<WorkerId> {
        self.released.lock().unwrap().clone()
    }

    fn terminated(&self) -> Vec<WorkerId> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestSender for ScriptedWorkers {
    async fn request(&self, msg: Message, _timeout: Duration) -> Result<Message, DispatchError> {
        let req: DispatchRequest = msg.decode()?;
        self.requests.lock().unwrap().push((msg.worker, req.quantum));
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Exhaust);
        let used_time = match next {
            Reply::Used(n) => n,
            Reply::Exhaust => req.quantum as i64,
        };
        let mut reply = msg.reply(topics::DISPATCH_REPLY, &DispatchReply { used_time })?;
        if self.forge_identity.load(Ordering::SeqCst) {
            reply.worker = WorkerId(reply.worker.0 + 1000);
        }
        Ok(reply)
    }
}

#[async_trait]
impl WorkerSpawner for ScriptedWorkers {
    async fn spawn(&self, slot: SlotIndex) -> Result<WorkerId, DispatchError> {
        let failing = self
            .fail_spawns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DispatchError::Spawn("scripted failure".into()));
        }
        let worker = WorkerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.spawned.lock().unwrap().push((slot, worker));
        Ok(worker)
    }

    async fn release(&self, worker: WorkerId) {
        self.released.lock().unwrap().push(worker);
    }

    async fn terminate(&self, worker: WorkerId) {
        self.terminated.lock().unwrap().push(worker);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn config(max_concurrent: usize, max_total: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent,
        max_total,
        max_runtime_secs: 30,
        base_quantum_ns: MS,
        dispatch_overhead_min_ns: OVERHEAD,
        dispatch_overhead_max_ns: OVERHEAD,
        seed: Some(1),
        trace_enabled: false,
        ..SchedulerConfig::default()
    }
}

fn scheduler(config: SchedulerConfig, workers: &Arc<ScriptedWorkers>) -> Scheduler {
    Scheduler::new(config, workers.clone(), workers.clone())
}

/// Every occupied slot sits in exactly one container, free slots in none,
/// and the `blocked` flag agrees with blocked-set membership.
fn assert_membership(s: &Scheduler) {
    for slot in 0..s.table().capacity() {
        let entry = s.table().get(slot).unwrap();
        let in_ready: Vec<QueueLevel> = QueueLevel::ALL
            .into_iter()
            .filter(|l| s.ready_queue(*l).contains(slot))
            .collect();
        let in_blocked = s.blocked_queue().contains(slot);
        let count = in_ready.len() + usize::from(in_blocked);

        if entry.occupied {
            assert_eq!(count, 1, "slot {slot} in {count} containers");
            assert_eq!(entry.blocked, in_blocked, "slot {slot} blocked flag");
            if let Some(level) = in_ready.first() {
                assert_eq!(entry.level, *level, "slot {slot} queued at wrong level");
            }
        } else {
            assert_eq!(count, 0, "free slot {slot} is queued");
        }
    }
}

#[tokio::test]
async fn full_quantum_demotes_and_requeues() {
    let workers = ScriptedWorkers::with_script([Reply::Used(MS as i64)]);
    let mut s = scheduler(config(3, 1), &workers);

    s.tick().await.unwrap();

    assert_eq!(workers.requests(), vec![(WorkerId(1), MS)]);
    let slot = s.table().get(0).unwrap();
    assert_eq!(slot.level, QueueLevel::Q1);
    assert_eq!(slot.cpu_time_used, MS);
    assert_eq!(s.ready_queue(QueueLevel::Q1).snapshot(), vec![0]);
    assert!(s.ready_queue(QueueLevel::Q0).is_empty());
    assert_eq!(s.clock(), SimTime::from_nanos((OVERHEAD + MS) as u128));
    assert_eq!(s.metrics().dispatches, [1, 0, 0]);
    assert_membership(&s);
}

#[tokio::test]
async fn negative_reply_terminates_worker() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-500)]);
    let mut s = scheduler(config(3, 1), &workers);

    s.tick().await.unwrap();

    assert_eq!(s.live_count(), 0);
    assert!(!s.table().get(0).unwrap().occupied);
    for level in QueueLevel::ALL {
        assert!(s.ready_queue(level).is_empty());
    }
    assert!(s.blocked_queue().is_empty());
    assert_eq!(workers.released(), vec![WorkerId(1)]);
    assert_eq!(s.metrics().terminated, 1);
    assert_eq!(s.clock(), SimTime::from_nanos(u128::from(OVERHEAD + 500)));
}

#[tokio::test]
async fn partial_run_blocks_then_unblocks_to_top_queue() {
    let workers = ScriptedWorkers::with_script([Reply::Exhaust, Reply::Used(800_000)]);
    let mut s = scheduler(config(3, 1), &workers);

    s.tick().await.unwrap();
    assert_eq!(s.table().get(0).unwrap().level, QueueLevel::Q1);

    s.tick().await.unwrap();
    assert_eq!(workers.requests()[1], (WorkerId(1), 2 * MS));
    let completed_at = s.clock();
    assert_eq!(completed_at, SimTime::from_nanos(u128::from(2 * OVERHEAD + MS + 800_000)));

    let slot = s.table().get(0).unwrap().clone();
    assert!(slot.blocked);
    assert!(slot.unblock_deadline > completed_at);
    assert_eq!(s.blocked_queue().snapshot(), vec![0]);
    assert_membership(&s);

    // Not yet due.
    assert_eq!(s.unblock_expired().unwrap(), 0);

    s.clock = slot.unblock_deadline;
    assert_eq!(s.unblock_expired().unwrap(), 1);
    let slot = s.table().get(0).unwrap();
    assert!(!slot.blocked);
    assert_eq!(slot.level, QueueLevel::Q0);
    assert_eq!(s.ready_queue(QueueLevel::Q0).snapshot(), vec![0]);
    assert!(s.blocked_queue().is_empty());
    assert_eq!(s.metrics().unblocked, 1);
    assert_membership(&s);
}

#[tokio::test]
async fn idle_tick_only_advances_clock() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-10)]);
    let mut s = scheduler(config(3, 1), &workers);
    s.tick().await.unwrap();

    let before = s.clock();
    let snapshot = s.snapshot();
    s.tick().await.unwrap();

    assert_eq!(s.clock(), before.after(s.config().idle_increment_ns));
    assert_eq!(s.metrics().idle_ticks, 1);
    assert_eq!(s.snapshot().ready, snapshot.ready);
    assert_eq!(s.snapshot().blocked, snapshot.blocked);
    assert_eq!(workers.requests().len(), 1);
}

#[tokio::test]
async fn admits_one_worker_per_tick_up_to_concurrency_cap() {
    let workers = ScriptedWorkers::new();
    let mut s = scheduler(config(2, 10), &workers);

    s.tick().await.unwrap();
    assert_eq!(s.admitted(), 1);
    s.tick().await.unwrap();
    assert_eq!(s.admitted(), 2);

    for _ in 0..5 {
        s.tick().await.unwrap();
        assert_eq!(s.live_count(), 2);
        assert_eq!(s.admitted(), 2);
    }
    assert_eq!(workers.spawned.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn total_admissions_are_capped() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-1), Reply::Used(-1), Reply::Used(-1)]);
    let mut s = scheduler(config(3, 2), &workers);

    for _ in 0..6 {
        s.tick().await.unwrap();
    }
    assert_eq!(s.admitted(), 2);
    assert_eq!(s.metrics().terminated, 2);
    assert!(!s.has_work());
}

#[tokio::test]
async fn spawn_failure_leaves_slot_free_and_retries() {
    let workers = ScriptedWorkers::new();
    workers.fail_spawns.store(1, Ordering::SeqCst);
    let trace = MemoryTrace::new();
    let mut s = scheduler(config(3, 5), &workers).with_trace(Box::new(trace.clone()));

    s.tick().await.unwrap();
    assert_eq!(s.live_count(), 0);
    assert_eq!(s.admitted(), 0);
    assert_eq!(s.metrics().spawn_failures, 1);
    assert_eq!(s.metrics().idle_ticks, 1);
    assert!(matches!(trace.events()[0], TraceEvent::SpawnFailed { slot: 0, .. }));

    s.tick().await.unwrap();
    assert_eq!(s.admitted(), 1);
    assert_eq!(workers.spawned.lock().unwrap().as_slice(), &[(0, WorkerId(1))]);
}

#[tokio::test]
async fn out_of_range_reply_is_fatal() {
    for bad in [0, 5 * MS as i64, -(5 * MS as i64)] {
        let workers = ScriptedWorkers::with_script([Reply::Used(bad)]);
        let mut s = scheduler(config(3, 1), &workers);
        let err = s.tick().await.unwrap_err();
        assert!(
            matches!(
                err,
                SchedulerError::Dispatch { source: DispatchError::InvalidUsedTime { .. }, .. }
            ),
            "used_time {bad}: {err}"
        );
    }
}

#[tokio::test]
async fn reply_from_wrong_worker_is_fatal() {
    let workers = ScriptedWorkers::new();
    workers.forge_identity.store(true, Ordering::SeqCst);
    let mut s = scheduler(config(3, 1), &workers);

    let err = s.tick().await.unwrap_err();
    match err {
        SchedulerError::Dispatch { worker, source } => {
            assert_eq!(worker, WorkerId(1));
            assert!(source.is_protocol_violation());
            assert!(matches!(source, DispatchError::IdentityMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn bottom_queue_keeps_its_quantum() {
    let workers = ScriptedWorkers::new();
    let mut s = scheduler(config(3, 1), &workers);

    for _ in 0..4 {
        s.tick().await.unwrap();
    }

    let quanta: Vec<Nanos> = workers.requests().iter().map(|(_, q)| *q).collect();
    assert_eq!(quanta, vec![MS, 2 * MS, 4 * MS, 4 * MS]);
    assert_eq!(s.table().get(0).unwrap().level, QueueLevel::Q2);
    assert_eq!(s.metrics().dispatches, [1, 1, 2]);
    assert_eq!(s.metrics().exhausted, 4);
}

#[tokio::test]
async fn higher_queue_always_runs_first() {
    let workers = ScriptedWorkers::new();
    let mut s = scheduler(config(2, 2), &workers);

    s.tick().await.unwrap();
    s.tick().await.unwrap();
    s.tick().await.unwrap();

    let order: Vec<WorkerId> = workers.requests().iter().map(|(w, _)| *w).collect();
    // W2 is admitted into queue 0 and overtakes W1, which sits in queue 1.
    assert_eq!(order, vec![WorkerId(1), WorkerId(2), WorkerId(1)]);
    assert_eq!(workers.requests()[2].1, 2 * MS);
}

#[tokio::test]
async fn containers_stay_disjoint_over_a_random_run() {
    let mut rng = StdRng::seed_from_u64(7);
    let script: Vec<Reply> = (0..400)
        .map(|_| match rng.gen_range(0..4) {
            0 => Reply::Used(-500),
            1 => Reply::Used(500),
            _ => Reply::Exhaust,
        })
        .collect();
    let workers = ScriptedWorkers::with_script(script);
    let mut cfg = config(4, 30);
    cfg.max_block_delay_ns = 3 * MS;
    let mut s = scheduler(cfg, &workers);

    let mut last_clock = s.clock();
    for _ in 0..400 {
        s.tick().await.unwrap();
        assert_membership(&s);
        assert!(s.clock() >= last_clock);
        assert!(s.clock().nanoseconds < 1_000_000_000);
        assert!(s.live_count() <= 4);
        last_clock = s.clock();
    }
    assert!(s.metrics().blocked > 0);
    assert!(s.metrics().unblocked > 0);
}

#[tokio::test]
async fn snapshot_emitted_once_per_interval() {
    let workers = ScriptedWorkers::new();
    let trace = MemoryTrace::new();
    let mut cfg = config(3, 1);
    cfg.trace_interval_ns = MS;
    let mut s = scheduler(cfg, &workers).with_trace(Box::new(trace.clone()));

    s.tick().await.unwrap();
    let events = trace.events();
    match events.last() {
        Some(TraceEvent::Snapshot(snap)) => {
            assert_eq!(snap.ready, [vec![], vec![0], vec![]]);
            assert!(snap.blocked.is_empty());
            assert_eq!(snap.at, s.clock());
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert_eq!(s.metrics().snapshots, 1);

    s.tick().await.unwrap();
    assert_eq!(s.metrics().snapshots, 2);
}

#[tokio::test]
async fn no_snapshot_before_interval_elapses() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-1)]);
    let trace = MemoryTrace::new();
    let mut cfg = config(3, 1);
    cfg.trace_interval_ns = MS;
    let mut s = scheduler(cfg, &workers).with_trace(Box::new(trace.clone()));

    // 101 ns of dispatch, then idle ticks of 100 us each.
    for _ in 0..10 {
        s.tick().await.unwrap();
    }
    assert_eq!(s.metrics().snapshots, 0);
    s.tick().await.unwrap();
    assert_eq!(s.metrics().snapshots, 1);
}

#[tokio::test]
async fn snapshots_skipped_without_trace_sink() {
    let workers = ScriptedWorkers::new();
    let mut cfg = config(3, 1);
    cfg.trace_interval_ns = 1;
    let mut s = scheduler(cfg, &workers);
    s.tick().await.unwrap();
    assert_eq!(s.metrics().snapshots, 0);
}

#[tokio::test]
async fn unblock_scan_follows_blocked_order() {
    let workers = ScriptedWorkers::new();
    let mut s = scheduler(config(3, 3), &workers);
    s.clock = SimTime { seconds: 5, nanoseconds: 0 };

    for (slot, due) in [(2, true), (0, false), (1, true)] {
        s.table.occupy(slot, WorkerId(slot as u64 + 1), SimTime::ZERO).unwrap();
        let entry = s.table.get_mut(slot).unwrap();
        entry.level = QueueLevel::Q2;
        entry.blocked = true;
        entry.unblock_deadline = if due {
            SimTime { seconds: 4, nanoseconds: 0 }
        } else {
            SimTime { seconds: 6, nanoseconds: 0 }
        };
        s.blocked.enqueue(slot);
    }

    assert_eq!(s.unblock_expired().unwrap(), 2);
    assert_eq!(s.ready_queue(QueueLevel::Q0).snapshot(), vec![2, 1]);
    assert_eq!(s.blocked_queue().snapshot(), vec![0]);
    assert_eq!(s.table().get(1).unwrap().level, QueueLevel::Q0);
    assert_eq!(s.table().get(0).unwrap().level, QueueLevel::Q2);
    assert_membership(&s);
}

#[tokio::test]
async fn run_completes_when_all_workers_terminate() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-1), Reply::Used(-2), Reply::Used(-3)]);
    let trace = MemoryTrace::new();
    let mut s = scheduler(config(3, 3), &workers).with_trace(Box::new(trace.clone()));

    let outcome = s.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(s.metrics().admitted, 3);
    assert_eq!(s.metrics().terminated, 3);
    assert!(workers.terminated().is_empty());
    assert!(workers.closed.load(Ordering::SeqCst));
    match trace.events().last() {
        Some(TraceEvent::Summary(summary)) => assert_eq!(summary.outcome, RunOutcome::Completed),
        other => panic!("expected summary, got {other:?}"),
    }
}

#[tokio::test]
async fn unrepresentable_runtime_cap_runs_without_wall_clock_limit() {
    let workers = ScriptedWorkers::with_script([Reply::Used(-1), Reply::Used(-2)]);
    let mut cfg = config(2, 2);
    cfg.max_runtime_secs = u64::MAX;
    assert!(cfg.sanitize().is_empty());
    let mut s = scheduler(cfg, &workers);

    let outcome = s.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(s.metrics().terminated, 2);
    assert_eq!(s.live_count(), 0);
}

#[tokio::test]
async fn sim_time_cap_stops_run_and_terminates_live_workers() {
    let workers = ScriptedWorkers::new();
    let mut cfg = config(2, 2);
    cfg.max_sim_time_ns = Some(10 * MS);
    let mut s = scheduler(cfg, &workers);

    let outcome = s.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::SimTimeLimit);
    assert!(s.clock().as_nanos() >= u128::from(10 * MS));
    let mut terminated = workers.terminated();
    terminated.sort();
    assert_eq!(terminated, vec![WorkerId(1), WorkerId(2)]);
    assert_eq!(s.live_count(), 0);
    for level in QueueLevel::ALL {
        assert!(s.ready_queue(level).is_empty());
    }
}

#[tokio::test]
async fn shutdown_abandons_stalled_dispatch() {
    let workers = ScriptedWorkers::new();
    workers.stall.store(true, Ordering::SeqCst);
    let mut s = scheduler(config(3, 5), &workers);
    let shutdown = s.shutdown_handle();

    let run = tokio::spawn(async move {
        let outcome = s.run().await;
        (outcome, s)
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let (outcome, s) = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not stop")
        .unwrap();
    assert_eq!(outcome.unwrap(), RunOutcome::Interrupted);
    assert_eq!(workers.terminated(), vec![WorkerId(1)]);
    assert!(workers.closed.load(Ordering::SeqCst));
    assert_eq!(s.live_count(), 0);
}

#[tokio::test]
async fn shutdown_before_run_admits_nothing() {
    let workers = ScriptedWorkers::new();
    let mut s = scheduler(config(3, 5), &workers);
    s.shutdown_handle().trigger();

    assert_eq!(s.run().await.unwrap(), RunOutcome::Interrupted);
    assert_eq!(s.admitted(), 0);
    assert!(workers.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn fatal_error_still_cleans_up() {
    let workers = ScriptedWorkers::with_script([Reply::Used(0)]);
    let trace = MemoryTrace::new();
    let mut s = scheduler(config(3, 5), &workers).with_trace(Box::new(trace.clone()));

    let err = s.run().await.unwrap_err();

    assert!(matches!(err, SchedulerError::Dispatch { worker: WorkerId(1), .. }));
    assert_eq!(workers.terminated(), vec![WorkerId(1)]);
    assert!(workers.closed.load(Ordering::SeqCst));
    assert!(!trace.events().iter().any(|e| matches!(e, TraceEvent::Summary(_))));
}
