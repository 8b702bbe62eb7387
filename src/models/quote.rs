//! Quote snapshots read from the external quote cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Asset classification used for session routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Equity,
    Future,
}

/// Latest snapshot for one symbol
///
/// `volume` is the feed's cumulative counter for the session, not a per-tick
/// increment; consumers reconstruct deltas themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Truncate the quote's timestamp to its UTC minute bucket
    pub fn minute_bucket(&self) -> Option<DateTime<Utc>> {
        use chrono::{DurationRound, TimeDelta};
        self.timestamp.duration_trunc(TimeDelta::minutes(1)).ok()
    }
}
