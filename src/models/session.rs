//! Session instances and per-symbol session rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One trading session for one (market, calendar date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInstance {
    /// Monotonic session number, the join key for all derived rows
    pub session_no: i64,
    pub market_key: String,
    pub captured_at: DateTime<Utc>,
}

/// Directional trade signal captured at session open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalKind {
    pub fn is_buy(&self) -> bool {
        matches!(self, SignalKind::Buy | SignalKind::StrongBuy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, SignalKind::Sell | SignalKind::StrongSell)
    }
}

/// Graded outcome of a signal; Worked/DidntWork/Neutral are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    Worked,
    DidntWork,
    Neutral,
}

/// Which boundary the first touch hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitKind {
    Target,
    Stop,
}

/// One symbol's state within a session instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSessionRow {
    pub session_no: i64,
    pub symbol: String,
    pub signal: SignalKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_low: Option<f64>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_kind: Option<HitKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_pct: Option<f64>,
}

impl SymbolSessionRow {
    pub fn new(session_no: i64, symbol: impl Into<String>, signal: SignalKind) -> Self {
        Self {
            session_no,
            symbol: symbol.into(),
            signal,
            entry_price: None,
            target_high: None,
            target_low: None,
            outcome: Outcome::Pending,
            hit_at: None,
            hit_price: None,
            hit_kind: None,
            day_open: None,
            day_high: None,
            day_low: None,
            last_price: None,
            range_pct: None,
        }
    }

    pub fn with_targets(mut self, entry: f64, target_high: f64, target_low: f64) -> Self {
        self.entry_price = Some(entry);
        self.target_high = Some(target_high);
        self.target_low = Some(target_low);
        self
    }

    /// Whether a freeze write has already landed on this row
    pub fn is_frozen(&self) -> bool {
        self.hit_at.is_some()
    }
}
