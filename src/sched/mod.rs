//! Heartbeat scheduler: one leader, one tick loop, jobs in registration order

use crate::error::{CoreError, Result};
use crate::jobs::JobContext;
use crate::lock::LockHandle;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// One independent unit of scheduled work
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// Custom due-check; the default fires when never run or the interval of
    /// registration has elapsed
    async fn should_run(
        &self,
        now: DateTime<Utc>,
        last_run: Option<DateTime<Utc>>,
        interval: Duration,
        _ctx: &JobContext,
    ) -> bool {
        match last_run {
            None => true,
            Some(last) => now - last >= ChronoDuration::seconds(interval.as_secs() as i64),
        }
    }

    async fn run(&self, ctx: &JobContext) -> Result<()>;
}

struct Registered {
    job: Box<dyn Job>,
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

/// Sequential tick loop over the registered jobs
///
/// Jobs never run concurrently with each other and a job is never re-entered:
/// due-ness is only re-evaluated after the previous invocation returns.
pub struct Heartbeat {
    jobs: Vec<Registered>,
    stop: Arc<AtomicBool>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a job; ticks evaluate jobs in registration order
    pub fn register(&mut self, job: Box<dyn Job>, interval: Duration) {
        info!(job = job.name(), interval_secs = interval.as_secs(), "Heartbeat: registered job");
        self.jobs.push(Registered {
            job,
            interval,
            last_run: None,
        });
    }

    /// Flag checked once per tick boundary for cooperative shutdown
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run every due job once, in registration order
    ///
    /// A job's error is logged and isolated; its last-run time advances
    /// regardless, so a permanently-failing job retries on its own interval
    /// rather than every tick.
    pub async fn run_pending(&mut self, ctx: &JobContext, now: DateTime<Utc>) {
        for entry in self.jobs.iter_mut() {
            let due = entry
                .job
                .should_run(now, entry.last_run, entry.interval, ctx)
                .await;
            if !due {
                continue;
            }
            debug!(job = entry.job.name(), "Heartbeat: running job");
            if let Some(metrics) = &ctx.metrics {
                metrics.job_runs_total.with_label_values(&[entry.job.name()]).inc();
            }
            if let Err(e) = entry.job.run(ctx).await {
                error!(job = entry.job.name(), error = %e, "Heartbeat: job failed");
                if let Some(metrics) = &ctx.metrics {
                    metrics
                        .job_failures_total
                        .with_label_values(&[entry.job.name()])
                        .inc();
                }
            }
            entry.last_run = Some(now);
        }
    }

    /// Main loop; returns on cooperative stop, errors on leadership loss
    ///
    /// Ownership is proven before each tick, never after: a due renewal runs
    /// first, and a failed one stops the loop with no further job executed.
    /// The sleep between ticks is capped at half the lock TTL so the marker
    /// cannot expire mid-sleep on the slow cadence.
    pub async fn run(&mut self, ctx: &JobContext, mut handle: LockHandle) -> Result<()> {
        info!(owner = handle.owner(), "Heartbeat: loop started");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("Heartbeat: stop requested, exiting after current tick");
                handle.release().await;
                return Ok(());
            }

            if handle.renewal_due() {
                if let Err(e) = handle.renew().await {
                    error!(error = %e, "Heartbeat: leadership lost, stopping");
                    if let Some(metrics) = &ctx.metrics {
                        metrics.leader.set(0.0);
                    }
                    handle.release().await;
                    return Err(e);
                }
            }

            let now = Utc::now();
            self.run_pending(ctx, now).await;

            let sleep = self.tick_sleep(ctx).await.min(handle.ttl() / 2);
            tokio::time::sleep(sleep).await;
        }
    }

    /// Fast cadence while any market session is active, slow otherwise
    async fn tick_sleep(&self, ctx: &JobContext) -> Duration {
        match ctx.shared.any_session_active().await {
            Ok(true) => ctx.config.fast_tick,
            Ok(false) => ctx.config.slow_tick,
            Err(e) => {
                // Can't read the tracker; assume markets may be open
                debug!(error = %e, "Heartbeat: cadence check failed, using fast tick");
                ctx.config.fast_tick
            }
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Surfaced when a renewal fails so callers can distinguish a clean stop
pub fn is_leadership_loss(err: &CoreError) -> bool {
    matches!(err, CoreError::LeadershipLost(_))
}
