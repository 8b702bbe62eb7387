//! Durable store interface for sessions, bars, stats, and grading

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{
    DailyRange, Extremes52w, HitKind, Market, MarketStatus, MinuteBar, Outcome, Rolling24h,
    SymbolSessionRow, VwapSample,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The permanent home for markets, sessions, bars, and derived aggregates
///
/// All upserts are idempotent on natural keys; the grading freeze is a single
/// conditional update with storage-layer mutual exclusion.
#[async_trait]
pub trait Store: Send + Sync {
    // Markets
    async fn active_markets(&self) -> Result<Vec<Market>>;
    async fn set_market_status(&self, market_key: &str, status: MarketStatus) -> Result<()>;

    // Sessions
    /// Allocate the next monotonic session number for a market
    async fn create_session(&self, market_key: &str, at: DateTime<Utc>) -> Result<i64>;
    /// Latest session number for a market, if any session was ever captured
    async fn current_session(&self, market_key: &str) -> Result<Option<i64>>;

    // Minute bars
    /// Insert-or-ignore keyed by (session, symbol, minute)
    async fn upsert_minute_bar(&self, bar: &MinuteBar) -> Result<()>;

    // Rolling 24h stats
    async fn get_rolling_24h(&self, session_no: i64, symbol: &str) -> Result<Option<Rolling24h>>;
    async fn upsert_rolling_24h(&self, stat: &Rolling24h) -> Result<()>;
    /// Set the finalized flag on every stat row of a session
    async fn finalize_rolling_24h(&self, session_no: i64) -> Result<u64>;
    /// Daily high/low history for the trailing-window recomputation
    async fn daily_ranges(&self, symbol: &str, since: NaiveDate) -> Result<Vec<DailyRange>>;

    // 52-week extremes
    async fn get_extremes(&self, symbol: &str) -> Result<Option<Extremes52w>>;
    async fn upsert_extremes(&self, extremes: &Extremes52w) -> Result<()>;

    // VWAP samples
    async fn insert_vwap_sample(&self, sample: &VwapSample) -> Result<()>;
    async fn vwap_samples(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VwapSample>>;
    /// Last sample strictly before `at`, the baseline for bounded windows
    async fn last_vwap_sample_before(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<VwapSample>>;

    // Session rows and grading
    async fn upsert_session_row(&self, row: &SymbolSessionRow) -> Result<()>;
    async fn pending_rows(&self, session_no: i64) -> Result<Vec<SymbolSessionRow>>;
    async fn update_row_metrics(
        &self,
        session_no: i64,
        symbol: &str,
        stat: &Rolling24h,
        last_price: f64,
    ) -> Result<()>;
    /// First-touch freeze: conditional on the row still being Pending and
    /// unfrozen; returns whether this call won the write
    async fn freeze_outcome(
        &self,
        session_no: i64,
        symbol: &str,
        outcome: Outcome,
        hit_kind: HitKind,
        hit_price: f64,
        hit_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Force still-Pending, never-frozen rows to Neutral; returns rows changed
    async fn finalize_session(&self, session_no: i64, at: DateTime<Utc>) -> Result<u64>;
}
