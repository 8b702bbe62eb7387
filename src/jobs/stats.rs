//! Rolling statistic jobs: 24h accumulators, 52-week extremes, VWAP samples

use crate::aggregate::route_quote;
use crate::error::Result;
use crate::jobs::context::JobContext;
use crate::models::{Extremes52w, VwapSample};
use crate::sched::Job;
use crate::stats::{apply_observation, recompute_extremes};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info};

/// Folds fresh quotes into the per-session 24h accumulators
pub struct Rolling24hJob;

#[async_trait]
impl Job for Rolling24hJob {
    fn name(&self) -> &'static str {
        "rolling-24h"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let sessions = ctx.shared.active_sessions().await?;
        if sessions.is_empty() {
            return Ok(());
        }
        let markets = ctx.store.active_markets().await?;
        let symbols = ctx.quotes.recent_symbols(ctx.config.quote_freshness).await?;
        let quotes = ctx.quotes.latest_quotes(&symbols).await?;

        for quote in &quotes {
            let Some(price) = quote.price else { continue };
            let Some(session) = route_quote(&sessions, &markets, quote) else {
                continue;
            };
            // Peek the baseline only; it is committed after the upsert lands,
            // so a failed pass recomputes the same delta instead of losing it
            let delta = match quote.volume {
                Some(cumulative) => {
                    let previous = ctx
                        .shared
                        .last_seen_volume(session.session_no, &quote.symbol)
                        .await?;
                    previous.map_or(0.0, |last| (cumulative - last).max(0.0))
                }
                None => 0.0,
            };
            let existing = ctx
                .store
                .get_rolling_24h(session.session_no, &quote.symbol)
                .await?;
            // Finalized stats belong to a closed pass of the session; leave them
            if existing.as_ref().is_some_and(|s| s.finalized) {
                continue;
            }
            let stat = apply_observation(existing, session.session_no, &quote.symbol, price, delta);
            ctx.store.upsert_rolling_24h(&stat).await?;
            if let Some(cumulative) = quote.volume {
                ctx.shared
                    .record_seen_volume(session.session_no, &quote.symbol, cumulative)
                    .await?;
            }
            ctx.store
                .update_row_metrics(session.session_no, &quote.symbol, &stat, price)
                .await?;
        }
        Ok(())
    }
}

/// Pushes live 52-week extremes outward on strict exceedance
pub struct Extremes52wJob;

#[async_trait]
impl Job for Extremes52wJob {
    fn name(&self) -> &'static str {
        "extremes-52w"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        if !ctx.shared.any_session_active().await? {
            return Ok(());
        }
        let symbols = ctx.quotes.recent_symbols(ctx.config.quote_freshness).await?;
        let quotes = ctx.quotes.latest_quotes(&symbols).await?;

        for quote in &quotes {
            let Some(price) = quote.price else { continue };
            let date = quote.timestamp.date_naive();
            let updated = match ctx.store.get_extremes(&quote.symbol).await? {
                Some(mut extremes) => {
                    if extremes.observe(price, date) {
                        Some(extremes)
                    } else {
                        None
                    }
                }
                None => Some(Extremes52w::seed(&quote.symbol, price, date)),
            };
            if let Some(extremes) = updated {
                debug!(
                    symbol = %extremes.symbol,
                    high = extremes.high,
                    low = extremes.low,
                    "Extremes52wJob: extremes updated"
                );
                ctx.store.upsert_extremes(&extremes).await?;
            }
        }
        Ok(())
    }
}

/// Daily rebuild of trailing extremes from 24h high/low history
///
/// Live observation only pushes extremes outward; this pass is what lets an
/// extreme scroll out once its day leaves the trailing window.
pub struct ExtremesRecomputeJob;

#[async_trait]
impl Job for ExtremesRecomputeJob {
    fn name(&self) -> &'static str {
        "extremes-recompute"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let symbols = ctx.quotes.recent_symbols(ctx.config.quote_freshness).await?;
        let since = Utc::now().date_naive() - ChronoDuration::days(364);
        let mut rebuilt = 0u32;
        for symbol in &symbols {
            let history = ctx.store.daily_ranges(symbol, since).await?;
            if let Some(extremes) = recompute_extremes(symbol, &history) {
                ctx.store.upsert_extremes(&extremes).await?;
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            info!(rebuilt, "ExtremesRecomputeJob: trailing extremes rebuilt");
        }
        Ok(())
    }
}

/// Appends one (price, cumulative volume) snapshot per symbol per minute
pub struct VwapSnapshotJob;

#[async_trait]
impl Job for VwapSnapshotJob {
    fn name(&self) -> &'static str {
        "vwap-snapshot"
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        if !ctx.shared.any_session_active().await? {
            return Ok(());
        }
        let symbols = ctx.quotes.recent_symbols(ctx.config.quote_freshness).await?;
        let quotes = ctx.quotes.latest_quotes(&symbols).await?;

        for quote in &quotes {
            if quote.price.is_none() {
                continue;
            }
            let Some(minute) = quote.minute_bucket() else {
                continue;
            };
            let sample = VwapSample {
                symbol: quote.symbol.clone(),
                minute,
                price: quote.price,
                cumulative_volume: quote.volume,
            };
            ctx.store.insert_vwap_sample(&sample).await?;
        }
        Ok(())
    }
}
