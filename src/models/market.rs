//! Market definitions and session states

use crate::models::quote::AssetKind;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Persisted open/closed status of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Session state computed by the market clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    HolidayClosed,
    PreOpen,
    Open,
    PreClose,
    Closed,
}

impl SessionState {
    /// Whether this state maps to a persisted OPEN status
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open | SessionState::PreClose)
    }
}

/// One tradable exchange/session definition (seed data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Exchange key, e.g. "NYSE" or "CME-ES"
    pub key: String,
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    /// Holiday calendar id, e.g. "us" or "none"
    pub calendar: String,
    pub kind: AssetKind,
    pub active: bool,
    /// Control markets drive the active-session cache
    pub control: bool,
    pub status: MarketStatus,
}

impl Market {
    /// Open time-of-day numerically after close means the session wraps past midnight
    pub fn is_overnight(&self) -> bool {
        self.open_time > self.close_time
    }
}
