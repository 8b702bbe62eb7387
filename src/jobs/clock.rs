//! Market clock reconciliation job

use crate::clock;
use crate::error::Result;
use crate::jobs::context::JobContext;
use crate::sched::Job;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

/// Recomputes every market's session state and persists transitions
pub struct ClockReconcileJob;

#[async_trait]
impl Job for ClockReconcileJob {
    fn name(&self) -> &'static str {
        "clock-reconcile"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let transitions = clock::reconcile_markets(
            ctx.store.as_ref(),
            ctx.shared.as_ref(),
            &ctx.events,
            &ctx.windows,
            Utc::now(),
        )
        .await?;
        if transitions > 0 {
            if let Some(metrics) = &ctx.metrics {
                metrics.market_transitions_total.inc_by(transitions as u64);
            }
        } else {
            debug!("ClockReconcileJob: no transitions");
        }
        Ok(())
    }
}
