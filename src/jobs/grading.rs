//! First-touch grading pass over pending session rows

use crate::error::Result;
use crate::grading::{evaluate, freeze_touch};
use crate::jobs::context::JobContext;
use crate::sched::Job;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

/// Grades pending rows of every active session against the latest quotes
pub struct GradingJob;

#[async_trait]
impl Job for GradingJob {
    fn name(&self) -> &'static str {
        "grading"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let sessions = ctx.shared.active_sessions().await?;
        if sessions.is_empty() {
            return Ok(());
        }

        for session in &sessions {
            let rows = ctx.store.pending_rows(session.session_no).await?;
            if rows.is_empty() {
                continue;
            }
            let symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
            let quotes: HashMap<String, _> = ctx
                .quotes
                .latest_quotes(&symbols)
                .await?
                .into_iter()
                .map(|q| (q.symbol.clone(), q))
                .collect();

            for row in &rows {
                let Some(quote) = quotes.get(&row.symbol) else {
                    continue;
                };
                let Some(touch) = evaluate(row, quote) else {
                    continue;
                };
                let won = freeze_touch(ctx.store.as_ref(), row, touch, Utc::now()).await?;
                if won {
                    if let Some(metrics) = &ctx.metrics {
                        metrics.grades_frozen_total.inc();
                    }
                } else {
                    debug!(
                        symbol = %row.symbol,
                        session = session.session_no,
                        "GradingJob: touch raced an earlier freeze"
                    );
                }
            }
        }
        Ok(())
    }
}
