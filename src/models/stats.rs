//! Rolling statistic records and VWAP samples

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated 24-hour window statistics for one session+symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rolling24h {
    pub session_no: i64,
    pub symbol: String,
    pub open: f64,
    pub prev_close: f64,
    pub high: f64,
    pub low: f64,
    pub range: f64,
    pub range_pct: f64,
    /// Delta-accumulated, never the feed's raw cumulative counter
    pub volume: f64,
    pub finalized: bool,
}

impl Rolling24h {
    /// Seed the accumulator from the first observation of the session
    pub fn seed(session_no: i64, symbol: impl Into<String>, price: f64) -> Self {
        Self {
            session_no,
            symbol: symbol.into(),
            open: price,
            prev_close: price,
            high: price,
            low: price,
            range: 0.0,
            range_pct: 0.0,
            volume: 0.0,
            finalized: false,
        }
    }

    /// Fold one observation in; high/low roll only on strict improvement
    pub fn observe(&mut self, price: f64, volume_delta: f64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.range = self.high - self.low;
        self.range_pct = if self.open != 0.0 {
            self.range / self.open * 100.0
        } else {
            0.0
        };
        self.volume += volume_delta.max(0.0);
    }
}

/// One day's high/low, used to rebuild trailing 52-week extremes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRange {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
}

/// Rolling 52-week high/low per symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extremes52w {
    pub symbol: String,
    pub high: f64,
    pub high_at: NaiveDate,
    pub low: f64,
    pub low_at: NaiveDate,
}

impl Extremes52w {
    /// Seed both extremes from the first observed price
    pub fn seed(symbol: impl Into<String>, price: f64, date: NaiveDate) -> Self {
        let symbol = symbol.into();
        Self {
            symbol,
            high: price,
            high_at: date,
            low: price,
            low_at: date,
        }
    }

    /// Update on strict exceedance only; returns whether anything changed
    pub fn observe(&mut self, price: f64, date: NaiveDate) -> bool {
        let mut changed = false;
        if price > self.high {
            self.high = price;
            self.high_at = date;
            changed = true;
        }
        if price < self.low {
            self.low = price;
            self.low_at = date;
            changed = true;
        }
        changed
    }
}

/// One per-symbol-per-minute raw snapshot (price, cumulative volume); append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapSample {
    pub symbol: String,
    pub minute: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_volume: Option<f64>,
}
