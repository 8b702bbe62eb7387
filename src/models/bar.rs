//! Minute bar types for the tick-to-bar pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed 1-minute bar waiting in the durable queue
///
/// Carries the market routing key rather than a session number; the flush
/// worker resolves session linkage at persist time and defers the bar when
/// the session is not yet resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBar {
    pub market_key: String,
    pub symbol: String,
    pub minute: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PendingBar {
    /// Open a fresh bar at the given minute bucket
    pub fn open_at(
        market_key: impl Into<String>,
        symbol: impl Into<String>,
        minute: DateTime<Utc>,
        price: f64,
    ) -> Self {
        Self {
            market_key: market_key.into(),
            symbol: symbol.into(),
            minute,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    /// Fold one tick into the bar
    pub fn extend(&mut self, price: f64, volume_delta: f64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume_delta.max(0.0);
    }
}

/// One symbol's OHLCV for one UTC minute within one session
///
/// Idempotent natural key: (session_no, symbol, minute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub session_no: i64,
    pub symbol: String,
    pub minute: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MinuteBar {
    pub fn from_pending(bar: &PendingBar, session_no: i64) -> Self {
        Self {
            session_no,
            symbol: bar.symbol.clone(),
            minute: bar.minute,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}
