//! Prometheus metrics for job execution and pipeline throughput

use crate::error::Result;
use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Process-wide metrics, shared with jobs through the context
pub struct Metrics {
    pub registry: Registry,
    pub job_runs_total: IntCounterVec,
    pub job_failures_total: IntCounterVec,
    pub bars_closed_total: IntCounter,
    pub bars_persisted_total: IntCounter,
    pub bars_deferred_total: IntCounter,
    pub grades_frozen_total: IntCounter,
    pub market_transitions_total: IntCounter,
    pub queue_pending: IntGauge,
    pub cache_connected: Gauge,
    pub database_connected: Gauge,
    pub leader: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let job_runs_total = IntCounterVec::new(
            Opts::new("job_runs_total", "Scheduler job invocations"),
            &["job"],
        )?;
        let job_failures_total = IntCounterVec::new(
            Opts::new("job_failures_total", "Scheduler job invocations that returned an error"),
            &["job"],
        )?;
        let bars_closed_total =
            IntCounter::new("bars_closed_total", "Minute bars closed by the aggregator")?;
        let bars_persisted_total =
            IntCounter::new("bars_persisted_total", "Minute bars persisted to the store")?;
        let bars_deferred_total = IntCounter::new(
            "bars_deferred_total",
            "Minute bars returned to pending because session linkage was unresolved",
        )?;
        let grades_frozen_total =
            IntCounter::new("grades_frozen_total", "Signal outcomes frozen by the grader")?;
        let market_transitions_total = IntCounter::new(
            "market_transitions_total",
            "Market open/close transitions detected by reconciliation",
        )?;
        let queue_pending = IntGauge::new("queue_pending", "Bars waiting in the pending queue")?;
        let cache_connected = Gauge::new("cache_connected", "Redis connection state (1 = up)")?;
        let database_connected =
            Gauge::new("database_connected", "Postgres connection state (1 = up)")?;
        let leader = Gauge::new("leader", "Whether this process holds the leader lock")?;

        registry.register(Box::new(job_runs_total.clone()))?;
        registry.register(Box::new(job_failures_total.clone()))?;
        registry.register(Box::new(bars_closed_total.clone()))?;
        registry.register(Box::new(bars_persisted_total.clone()))?;
        registry.register(Box::new(bars_deferred_total.clone()))?;
        registry.register(Box::new(grades_frozen_total.clone()))?;
        registry.register(Box::new(market_transitions_total.clone()))?;
        registry.register(Box::new(queue_pending.clone()))?;
        registry.register(Box::new(cache_connected.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;
        registry.register(Box::new(leader.clone()))?;

        Ok(Self {
            registry,
            job_runs_total,
            job_failures_total,
            bars_closed_total,
            bars_persisted_total,
            bars_deferred_total,
            grades_frozen_total,
            market_transitions_total,
            queue_pending,
            cache_connected,
            database_connected,
            leader,
        })
    }
}
