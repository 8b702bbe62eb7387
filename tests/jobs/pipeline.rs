//! End-to-end job pipeline over the in-memory backends

use crate::common_fixtures::{graded_row, nyse, quote_at, quote_with_book};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, NaiveDate, TimeDelta, Utc};
use marketbeat::cache::{MemoryQuoteCache, MemorySharedState, SharedState};
use marketbeat::config::WorkerConfig;
use marketbeat::error::{CoreError, Result};
use marketbeat::events::{EventBus, MarketEvent};
use marketbeat::jobs::{BarAggregatorJob, BarFlushJob, GradingJob, JobContext, Rolling24hJob};
use marketbeat::models::{
    DailyRange, Extremes52w, HitKind, Market, MarketStatus, MinuteBar, Outcome, Rolling24h,
    SignalKind, SymbolSessionRow, VwapSample,
};
use marketbeat::queue::{BarQueue, MemoryBarQueue};
use marketbeat::sched::Job;
use marketbeat::store::{MemoryStore, Store};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Pipeline {
    quotes: Arc<MemoryQuoteCache>,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryBarQueue>,
    ctx: JobContext,
}

async fn pipeline() -> Pipeline {
    let quotes = Arc::new(MemoryQuoteCache::new());
    let shared = Arc::new(MemorySharedState::new());
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryBarQueue::new());

    store.seed_market(nyse());
    let session_no = store
        .create_session("NYSE", Utc::now())
        .await
        .expect("session created");
    shared
        .set_session_active("NYSE", session_no)
        .await
        .expect("tracker writable");

    let ctx = JobContext::new(
        quotes.clone(),
        shared,
        store.clone(),
        queue.clone(),
        EventBus::default(),
        None,
        WorkerConfig::default(),
    );
    Pipeline { quotes, store, queue, ctx }
}

/// Memory store whose stat upserts can be told to fail
struct FlakyStore {
    inner: Arc<MemoryStore>,
    reject_stat_upserts: AtomicBool,
}

#[async_trait]
impl Store for FlakyStore {
    async fn active_markets(&self) -> Result<Vec<Market>> {
        self.inner.active_markets().await
    }

    async fn set_market_status(&self, market_key: &str, status: MarketStatus) -> Result<()> {
        self.inner.set_market_status(market_key, status).await
    }

    async fn create_session(&self, market_key: &str, at: DateTime<Utc>) -> Result<i64> {
        self.inner.create_session(market_key, at).await
    }

    async fn current_session(&self, market_key: &str) -> Result<Option<i64>> {
        self.inner.current_session(market_key).await
    }

    async fn upsert_minute_bar(&self, bar: &MinuteBar) -> Result<()> {
        self.inner.upsert_minute_bar(bar).await
    }

    async fn get_rolling_24h(&self, session_no: i64, symbol: &str) -> Result<Option<Rolling24h>> {
        self.inner.get_rolling_24h(session_no, symbol).await
    }

    async fn upsert_rolling_24h(&self, stat: &Rolling24h) -> Result<()> {
        if self.reject_stat_upserts.load(Ordering::SeqCst) {
            return Err(CoreError::Store("stat upsert rejected".to_string()));
        }
        self.inner.upsert_rolling_24h(stat).await
    }

    async fn finalize_rolling_24h(&self, session_no: i64) -> Result<u64> {
        self.inner.finalize_rolling_24h(session_no).await
    }

    async fn daily_ranges(&self, symbol: &str, since: NaiveDate) -> Result<Vec<DailyRange>> {
        self.inner.daily_ranges(symbol, since).await
    }

    async fn get_extremes(&self, symbol: &str) -> Result<Option<Extremes52w>> {
        self.inner.get_extremes(symbol).await
    }

    async fn upsert_extremes(&self, extremes: &Extremes52w) -> Result<()> {
        self.inner.upsert_extremes(extremes).await
    }

    async fn insert_vwap_sample(&self, sample: &VwapSample) -> Result<()> {
        self.inner.insert_vwap_sample(sample).await
    }

    async fn vwap_samples(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VwapSample>> {
        self.inner.vwap_samples(symbol, from, to).await
    }

    async fn last_vwap_sample_before(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<VwapSample>> {
        self.inner.last_vwap_sample_before(symbol, at).await
    }

    async fn upsert_session_row(&self, row: &SymbolSessionRow) -> Result<()> {
        self.inner.upsert_session_row(row).await
    }

    async fn pending_rows(&self, session_no: i64) -> Result<Vec<SymbolSessionRow>> {
        self.inner.pending_rows(session_no).await
    }

    async fn update_row_metrics(
        &self,
        session_no: i64,
        symbol: &str,
        stat: &Rolling24h,
        last_price: f64,
    ) -> Result<()> {
        self.inner
            .update_row_metrics(session_no, symbol, stat, last_price)
            .await
    }

    async fn freeze_outcome(
        &self,
        session_no: i64,
        symbol: &str,
        outcome: Outcome,
        hit_kind: HitKind,
        hit_price: f64,
        hit_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .freeze_outcome(session_no, symbol, outcome, hit_kind, hit_price, hit_at)
            .await
    }

    async fn finalize_session(&self, session_no: i64, at: DateTime<Utc>) -> Result<u64> {
        self.inner.finalize_session(session_no, at).await
    }
}

#[tokio::test]
async fn test_quotes_become_persisted_minute_bars() {
    let p = pipeline().await;
    let mut events = p.ctx.events.subscribe();
    let aggregator = BarAggregatorJob::new();
    let now = Utc::now();
    let earlier = now - ChronoDuration::seconds(60);

    // First pass opens the bar for the earlier minute
    p.quotes.put(quote_at("AAPL", 100.0, Some(1000.0), earlier));
    aggregator.run(&p.ctx).await.expect("aggregation pass");
    assert_eq!(p.queue.pending_len().await.expect("readable"), 0);

    // The next minute's quote closes it into the queue
    p.quotes.put(quote_at("AAPL", 101.0, Some(1100.0), now));
    aggregator.run(&p.ctx).await.expect("aggregation pass");
    assert_eq!(p.queue.pending_len().await.expect("readable"), 1);
    assert!(matches!(
        events.try_recv().expect("bar event emitted"),
        MarketEvent::BarClosed { .. }
    ));

    BarFlushJob.run(&p.ctx).await.expect("flush pass");
    assert_eq!(p.queue.pending_len().await.expect("readable"), 0);
    assert_eq!(p.store.bar_count(), 1);
    let bar = p
        .store
        .get_bar(1, "AAPL", earlier.duration_trunc(TimeDelta::minutes(1)).expect("bucket"))
        .expect("bar persisted");
    assert_eq!(bar.open, 100.0);
    assert_eq!(bar.close, 100.0);
    // First cumulative observation only set the baseline
    assert_eq!(bar.volume, 0.0);
}

#[tokio::test]
async fn test_rolling_stats_accumulate_volume_deltas() {
    let p = pipeline().await;
    let job = Rolling24hJob;
    let now = Utc::now();

    p.quotes.put(quote_at("AAPL", 100.0, Some(1000.0), now));
    job.run(&p.ctx).await.expect("stats pass");
    let stat = p
        .store
        .get_rolling_24h(1, "AAPL")
        .await
        .expect("readable")
        .expect("stat seeded");
    assert_eq!(stat.open, 100.0);
    assert_eq!(stat.volume, 0.0);

    p.quotes.put(quote_at("AAPL", 104.0, Some(1250.0), now));
    job.run(&p.ctx).await.expect("stats pass");
    let stat = p
        .store
        .get_rolling_24h(1, "AAPL")
        .await
        .expect("readable")
        .expect("stat present");
    assert_eq!(stat.high, 104.0);
    assert_eq!(stat.volume, 250.0);
}

#[tokio::test]
async fn test_failed_stats_pass_does_not_lose_a_volume_delta() {
    let quotes = Arc::new(MemoryQuoteCache::new());
    let shared = Arc::new(MemorySharedState::new());
    let inner = Arc::new(MemoryStore::new());
    inner.seed_market(nyse());
    let session_no = inner
        .create_session("NYSE", Utc::now())
        .await
        .expect("session created");
    shared
        .set_session_active("NYSE", session_no)
        .await
        .expect("tracker writable");
    let store = Arc::new(FlakyStore {
        inner: inner.clone(),
        reject_stat_upserts: AtomicBool::new(false),
    });
    let ctx = JobContext::new(
        quotes.clone(),
        shared,
        store.clone(),
        Arc::new(MemoryBarQueue::new()),
        EventBus::default(),
        None,
        WorkerConfig::default(),
    );
    let now = Utc::now();

    quotes.put(quote_at("AAPL", 100.0, Some(1000.0), now));
    Rolling24hJob.run(&ctx).await.expect("baseline pass");

    // The store rejects the next pass; the volume baseline must not advance
    store.reject_stat_upserts.store(true, Ordering::SeqCst);
    quotes.put(quote_at("AAPL", 104.0, Some(1250.0), now));
    Rolling24hJob.run(&ctx).await.expect_err("upsert rejected");

    // The retry sees the same delta and books it exactly once
    store.reject_stat_upserts.store(false, Ordering::SeqCst);
    Rolling24hJob.run(&ctx).await.expect("stats pass");
    let stat = inner
        .get_rolling_24h(session_no, "AAPL")
        .await
        .expect("readable")
        .expect("stat present");
    assert_eq!(stat.volume, 250.0);
    assert_eq!(stat.high, 104.0);
}

#[tokio::test]
async fn test_grading_pass_freezes_first_touch() {
    let p = pipeline().await;
    p.store
        .upsert_session_row(&graded_row(1, "AAPL", SignalKind::Buy))
        .await
        .expect("row seeded");

    // Bid still inside the target band: nothing to grade
    p.quotes
        .put(quote_with_book("AAPL", 105.0, 104.5, 105.5, Utc::now()));
    GradingJob.run(&p.ctx).await.expect("grading pass");
    assert_eq!(p.store.get_row(1, "AAPL").expect("row exists").outcome, Outcome::Pending);

    p.quotes
        .put(quote_with_book("AAPL", 110.5, 110.2, 110.8, Utc::now()));
    GradingJob.run(&p.ctx).await.expect("grading pass");
    let row = p.store.get_row(1, "AAPL").expect("row exists");
    assert_eq!(row.outcome, Outcome::Worked);
    assert_eq!(row.hit_price, Some(110.2));

    // The frozen row is no longer a candidate for later passes
    p.quotes
        .put(quote_with_book("AAPL", 112.5, 112.2, 112.8, Utc::now()));
    GradingJob.run(&p.ctx).await.expect("grading pass");
    let row = p.store.get_row(1, "AAPL").expect("row exists");
    assert_eq!(row.hit_price, Some(110.2));
}
