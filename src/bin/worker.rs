//! Marketbeat Worker
//!
//! Single-leader heartbeat process: market clock reconciliation, tick-to-bar
//! aggregation, rolling statistics, and signal grading. Any number of
//! replicas may run; exactly one holds the leader lock and schedules work.

use backon::{ExponentialBuilder, Retryable};
use dotenvy::dotenv;
use marketbeat::cache::{RedisQuoteCache, RedisSharedState};
use marketbeat::config::{self, WorkerConfig};
use marketbeat::error::Result;
use marketbeat::events::EventBus;
use marketbeat::jobs::{
    BarAggregatorJob, BarFlushJob, ClockReconcileJob, Extremes52wJob, ExtremesRecomputeJob,
    GradingJob, JobContext, Rolling24hJob, VwapSnapshotJob,
};
use marketbeat::lock::{LeaderLock, RedisLockStore};
use marketbeat::logging;
use marketbeat::metrics::Metrics;
use marketbeat::queue::RedisBarQueue;
use marketbeat::sched::{is_leadership_loss, Heartbeat};
use marketbeat::store::PgStore;
use redis::aio::ConnectionManager;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

const LEADER_LOCK_KEY: &str = "marketbeat:leader";

async fn connect_redis(url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(url)?;
    Ok(ConnectionManager::new(client).await?)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    // Initialize logging based on environment
    logging::init_logging();

    let env = config::get_environment();
    let worker_config = WorkerConfig::from_env();
    info!("Starting Marketbeat Worker");
    info!(environment = %env, "Environment");

    // Initialize metrics
    let metrics = Arc::new(Metrics::new()?);

    // Initialize Postgres (schema is created on connect)
    info!("Initializing Postgres connection...");
    let store = (|| PgStore::connect())
        .retry(ExponentialBuilder::default().with_max_times(5))
        .notify(|err, dur: Duration| {
            warn!(error = %err, retry_in = ?dur, "Postgres connection failed, retrying")
        })
        .await?;
    info!("Postgres connected");
    metrics.database_connected.set(1.0);
    let store = Arc::new(store);

    // Initialize Redis; one connection manager backs every component
    info!("Initializing Redis connection...");
    let redis_url = config::get_redis_url();
    let conn = (|| connect_redis(&redis_url))
        .retry(ExponentialBuilder::default().with_max_times(5))
        .notify(|err, dur: Duration| {
            warn!(error = %err, retry_in = ?dur, "Redis connection failed, retrying")
        })
        .await?;
    info!("Redis connected");
    metrics.cache_connected.set(1.0);

    let quotes = Arc::new(RedisQuoteCache::from_manager(conn.clone()));
    let shared = Arc::new(RedisSharedState::from_manager(
        conn.clone(),
        worker_config.volume_cache_ttl,
    ));
    let queue = Arc::new(RedisBarQueue::from_manager(conn.clone()));
    let lock_store = Arc::new(RedisLockStore::from_manager(conn));
    let leader_lock = LeaderLock::new(lock_store, LEADER_LOCK_KEY, worker_config.lock_ttl);

    let ctx = JobContext::new(
        quotes,
        shared,
        store,
        queue,
        EventBus::default(),
        Some(metrics.clone()),
        worker_config.clone(),
    );

    info!("Worker initialized, contending for leadership...");
    loop {
        let handle = tokio::select! {
            acquired = leader_lock.acquire(true, worker_config.lock_acquire_timeout) => {
                match acquired? {
                    Some(handle) => handle,
                    None => {
                        info!("Leadership held elsewhere, parked");
                        continue;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received before leadership, exiting");
                return Ok(());
            }
        };
        metrics.leader.set(1.0);

        // Heartbeat and job state are scoped to one leadership term; a new
        // term starts clean and recovers in-flight bars from the queue.
        let mut heartbeat = Heartbeat::new();
        heartbeat.register(Box::new(ClockReconcileJob), worker_config.fast_tick);
        heartbeat.register(Box::new(BarAggregatorJob::new()), worker_config.fast_tick);
        heartbeat.register(Box::new(BarFlushJob), worker_config.flush_interval);
        heartbeat.register(Box::new(Rolling24hJob), worker_config.fast_tick);
        heartbeat.register(Box::new(Extremes52wJob), worker_config.fast_tick);
        heartbeat.register(
            Box::new(ExtremesRecomputeJob),
            Duration::from_secs(86_400),
        );
        heartbeat.register(Box::new(VwapSnapshotJob), Duration::from_secs(60));
        heartbeat.register(Box::new(GradingJob), worker_config.fast_tick);

        let stop = heartbeat.stop_handle();
        let mut run = std::pin::pin!(heartbeat.run(&ctx, handle));
        let result = tokio::select! {
            result = &mut run => result,
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received, finishing current tick...");
                stop.store(true, Ordering::SeqCst);
                run.await
            }
        };

        metrics.leader.set(0.0);
        match result {
            Ok(()) => {
                info!("Worker stopped");
                return Ok(());
            }
            Err(e) if is_leadership_loss(&e) => {
                warn!(error = %e, "Leadership lost, re-contending");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
