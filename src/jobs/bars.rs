//! Tick-to-bar aggregation and flush jobs

use crate::aggregate::{flush_pending, route_quote, BarAggregator};
use crate::error::{CoreError, Result};
use crate::events::MarketEvent;
use crate::jobs::context::JobContext;
use crate::sched::Job;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Folds fresh quotes into current bars; closed bars go to the durable queue
///
/// Current-bar state is owned by the job instance, not the process, so it
/// dies with leadership; unflushed closed bars survive in the queue.
pub struct BarAggregatorJob {
    aggregator: Mutex<BarAggregator>,
}

impl BarAggregatorJob {
    pub fn new() -> Self {
        Self {
            aggregator: Mutex::new(BarAggregator::new()),
        }
    }
}

impl Default for BarAggregatorJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Job for BarAggregatorJob {
    fn name(&self) -> &'static str {
        "bar-aggregator"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let sessions = ctx.shared.active_sessions().await?;
        if sessions.is_empty() {
            return Ok(());
        }
        let markets = ctx.store.active_markets().await?;
        let symbols = ctx.quotes.recent_symbols(ctx.config.quote_freshness).await?;
        if symbols.is_empty() {
            return Ok(());
        }
        let quotes = ctx.quotes.latest_quotes(&symbols).await?;

        let mut aggregator = self.aggregator.lock().await;
        let active_keys: Vec<String> = sessions.iter().map(|s| s.market_key.clone()).collect();
        aggregator.retain_markets(&active_keys);

        for quote in &quotes {
            let Some(session) = route_quote(&sessions, &markets, quote) else {
                continue;
            };
            let closed = match aggregator.ingest(&session.market_key, quote) {
                Ok(closed) => closed,
                Err(e @ CoreError::MalformedQuote { .. }) => {
                    // Intentional, logged skip; one bad quote never blocks the pass
                    warn!(error = %e, "BarAggregatorJob: skipping malformed quote");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(bar) = closed {
                debug!(
                    symbol = %bar.symbol,
                    market = %bar.market_key,
                    minute = %bar.minute,
                    "BarAggregatorJob: bar closed"
                );
                ctx.queue.enqueue(&bar).await?;
                if let Some(metrics) = &ctx.metrics {
                    metrics.bars_closed_total.inc();
                }
                ctx.events.publish(MarketEvent::BarClosed {
                    market: bar.market_key.clone(),
                    symbol: bar.symbol.clone(),
                    minute: bar.minute,
                });
            }
        }
        Ok(())
    }
}

/// Drains the pending queue into the durable store on its own interval
pub struct BarFlushJob;

#[async_trait]
impl Job for BarFlushJob {
    fn name(&self) -> &'static str {
        "bar-flush"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let outcome = flush_pending(
            ctx.store.as_ref(),
            ctx.queue.as_ref(),
            ctx.config.flush_batch_size,
            ctx.config.flush_max_batches,
        )
        .await?;
        if let Some(metrics) = &ctx.metrics {
            metrics.bars_persisted_total.inc_by(outcome.persisted as u64);
            metrics.bars_deferred_total.inc_by(outcome.deferred as u64);
            metrics.queue_pending.set(ctx.queue.pending_len().await? as i64);
        }
        debug!(
            persisted = outcome.persisted,
            deferred = outcome.deferred,
            recovered = outcome.recovered,
            batches = outcome.batches,
            "BarFlushJob: flush pass complete"
        );
        Ok(())
    }
}
