//! Quote cache and shared fast-store state

pub mod memory;
pub mod redis;

use crate::error::Result;
use crate::models::Quote;
use async_trait::async_trait;
use std::time::Duration;

pub use memory::{MemoryQuoteCache, MemorySharedState};
pub use redis::{RedisQuoteCache, RedisSharedState};

/// Read-only view of the external quote cache
///
/// The core never writes quotes; an upstream feed service owns this data.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>>;

    async fn latest_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>>;

    /// Symbols observed within the freshness window
    async fn recent_symbols(&self, freshness: Duration) -> Result<Vec<String>>;
}

/// A market session currently marked active in the shared tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub market_key: String,
    pub session_no: i64,
}

/// Shared mutable state outside the durable store
///
/// Only the leader process writes here, so single-key atomic operations are
/// sufficient; no in-process locking is layered on top.
#[async_trait]
pub trait SharedState: Send + Sync {
    async fn set_session_active(&self, market_key: &str, session_no: i64) -> Result<()>;

    async fn clear_session(&self, market_key: &str) -> Result<()>;

    async fn active_sessions(&self) -> Result<Vec<ActiveSession>>;

    async fn any_session_active(&self) -> Result<bool> {
        Ok(!self.active_sessions().await?.is_empty())
    }

    /// Last-seen cumulative volume for (session, symbol); reading does not
    /// advance the baseline
    async fn last_seen_volume(&self, session_no: i64, symbol: &str) -> Result<Option<f64>>;

    /// Advance the baseline to `cumulative` (with a TTL)
    ///
    /// The first observation of a symbol only establishes the baseline, so
    /// its delta is 0; otherwise every scheduler tick would re-add the feed's
    /// entire counter. Callers commit the baseline only after the increment
    /// it implies has been durably applied; a pass that dies in between
    /// leaves the baseline untouched and the next pass recomputes the same
    /// delta.
    async fn record_seen_volume(&self, session_no: i64, symbol: &str, cumulative: f64)
        -> Result<()>;
}
