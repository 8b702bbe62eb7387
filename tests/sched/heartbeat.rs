//! Unit tests for the heartbeat scheduler

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use marketbeat::cache::{MemoryQuoteCache, MemorySharedState};
use marketbeat::config::WorkerConfig;
use marketbeat::error::{CoreError, Result};
use marketbeat::events::EventBus;
use marketbeat::jobs::JobContext;
use marketbeat::lock::{LeaderLock, MemoryLockStore};
use marketbeat::queue::MemoryBarQueue;
use marketbeat::sched::{is_leadership_loss, Heartbeat, Job};
use marketbeat::store::MemoryStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn test_context() -> JobContext {
    JobContext::new(
        Arc::new(MemoryQuoteCache::new()),
        Arc::new(MemorySharedState::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryBarQueue::new()),
        EventBus::default(),
        None,
        WorkerConfig::default(),
    )
}

struct RecordingJob {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

#[async_trait]
impl Job for RecordingJob {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _ctx: &JobContext) -> Result<()> {
        self.log.lock().expect("log poisoned").push(self.name);
        if self.fail {
            Err(CoreError::Store("boom".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_jobs_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut heartbeat = Heartbeat::new();
    for name in ["clock", "bars", "grades"] {
        heartbeat.register(
            Box::new(RecordingJob { name, log: log.clone(), fail: false }),
            Duration::from_secs(1),
        );
    }

    heartbeat.run_pending(&test_context(), Utc::now()).await;
    assert_eq!(*log.lock().expect("log poisoned"), vec!["clock", "bars", "grades"]);
}

#[tokio::test]
async fn test_failing_job_does_not_block_the_rest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut heartbeat = Heartbeat::new();
    heartbeat.register(
        Box::new(RecordingJob { name: "broken", log: log.clone(), fail: true }),
        Duration::from_secs(1),
    );
    heartbeat.register(
        Box::new(RecordingJob { name: "healthy", log: log.clone(), fail: false }),
        Duration::from_secs(1),
    );

    heartbeat.run_pending(&test_context(), Utc::now()).await;
    assert_eq!(*log.lock().expect("log poisoned"), vec!["broken", "healthy"]);
}

#[tokio::test]
async fn test_interval_gates_re_execution() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut heartbeat = Heartbeat::new();
    heartbeat.register(
        Box::new(RecordingJob { name: "slow", log: log.clone(), fail: false }),
        Duration::from_secs(60),
    );
    let ctx = test_context();
    let start = Utc::now();

    // First tick: never run, so it fires
    heartbeat.run_pending(&ctx, start).await;
    // One second later: interval not elapsed
    heartbeat.run_pending(&ctx, start + ChronoDuration::seconds(1)).await;
    assert_eq!(log.lock().expect("log poisoned").len(), 1);

    // Past the interval: fires again
    heartbeat.run_pending(&ctx, start + ChronoDuration::seconds(61)).await;
    assert_eq!(log.lock().expect("log poisoned").len(), 2);
}

#[tokio::test]
async fn test_failed_job_retries_on_its_interval_not_every_tick() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut heartbeat = Heartbeat::new();
    heartbeat.register(
        Box::new(RecordingJob { name: "broken", log: log.clone(), fail: true }),
        Duration::from_secs(60),
    );
    let ctx = test_context();
    let start = Utc::now();

    heartbeat.run_pending(&ctx, start).await;
    heartbeat.run_pending(&ctx, start + ChronoDuration::seconds(1)).await;
    // The failure advanced last-run, so the immediate tick skipped it
    assert_eq!(log.lock().expect("log poisoned").len(), 1);
}

#[tokio::test]
async fn test_deposed_leader_never_runs_another_tick() {
    let lock_store = Arc::new(MemoryLockStore::new());
    let lock = LeaderLock::new(lock_store.clone(), "test:leader", Duration::from_millis(300));
    let handle = lock
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut heartbeat = Heartbeat::new();
    heartbeat.register(
        Box::new(RecordingJob { name: "tick", log: log.clone(), fail: false }),
        Duration::from_millis(1),
    );

    // No active sessions, so the loop is on the slow cadence; the sleep must
    // still wake inside the renewal window
    let ctx = test_context();
    let runner = tokio::spawn(async move { heartbeat.run(&ctx, handle).await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    let ticks_while_leading = log.lock().expect("log poisoned").len();
    assert_eq!(ticks_while_leading, 1);

    // The marker lapses and a rival takes over mid-sleep
    lock_store.expire("test:leader");
    let rival = LeaderLock::new(lock_store, "test:leader", Duration::from_millis(300));
    assert!(rival
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .is_some());

    let result = runner.await.expect("runner joined");
    let err = result.expect_err("leadership was lost");
    assert!(is_leadership_loss(&err));
    assert_eq!(log.lock().expect("log poisoned").len(), ticks_while_leading);
}
