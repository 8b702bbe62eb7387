//! Market event fan-out over a broadcast channel
//!
//! The core's contract ends at producing the payload; transport to UI clients
//! lives outside this crate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted by the clock reconciliation pass and the bar aggregator
#[derive(Debug, Clone, Serialize)]
pub enum MarketEvent {
    MarketOpened {
        market: String,
        session_no: i64,
        at: DateTime<Utc>,
    },
    MarketClosed {
        market: String,
        session_no: Option<i64>,
        at: DateTime<Utc>,
    },
    BarClosed {
        market: String,
        symbol: String,
        minute: DateTime<Utc>,
    },
}

/// Cheap-to-clone handle around the broadcast sender
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; a missing subscriber is not an error
    pub fn publish(&self, event: MarketEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
