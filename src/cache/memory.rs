//! In-memory quote cache and shared state for tests and local runs

use crate::cache::{ActiveSession, QuoteSource, SharedState};
use crate::error::Result;
use crate::models::Quote;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Quote source backed by a plain map; writable so tests can stage quotes
#[derive(Default)]
pub struct MemoryQuoteCache {
    quotes: Mutex<HashMap<String, Quote>>,
}

impl MemoryQuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, quote: Quote) {
        self.quotes
            .lock()
            .expect("quote map poisoned")
            .insert(quote.symbol.clone(), quote);
    }
}

#[async_trait]
impl QuoteSource for MemoryQuoteCache {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(self
            .quotes
            .lock()
            .expect("quote map poisoned")
            .get(symbol)
            .cloned())
    }

    async fn latest_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        let quotes = self.quotes.lock().expect("quote map poisoned");
        Ok(symbols
            .iter()
            .filter_map(|s| quotes.get(s).cloned())
            .collect())
    }

    async fn recent_symbols(&self, freshness: Duration) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(freshness.as_secs() as i64);
        let quotes = self.quotes.lock().expect("quote map poisoned");
        let mut symbols: Vec<String> = quotes
            .values()
            .filter(|q| q.timestamp >= cutoff)
            .map(|q| q.symbol.clone())
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Shared state backed by plain maps; TTL expiry is not simulated
#[derive(Default)]
pub struct MemorySharedState {
    sessions: Mutex<HashMap<String, i64>>,
    volume_seen: Mutex<HashMap<(i64, String), f64>>,
}

impl MemorySharedState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedState for MemorySharedState {
    async fn set_session_active(&self, market_key: &str, session_no: i64) -> Result<()> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(market_key.to_string(), session_no);
        Ok(())
    }

    async fn clear_session(&self, market_key: &str) -> Result<()> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .remove(market_key);
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<ActiveSession>> {
        let sessions = self.sessions.lock().expect("session map poisoned");
        let mut active: Vec<ActiveSession> = sessions
            .iter()
            .map(|(market_key, session_no)| ActiveSession {
                market_key: market_key.clone(),
                session_no: *session_no,
            })
            .collect();
        active.sort_by(|a, b| a.market_key.cmp(&b.market_key));
        Ok(active)
    }

    async fn last_seen_volume(&self, session_no: i64, symbol: &str) -> Result<Option<f64>> {
        let seen = self.volume_seen.lock().expect("volume map poisoned");
        Ok(seen.get(&(session_no, symbol.to_string())).copied())
    }

    async fn record_seen_volume(
        &self,
        session_no: i64,
        symbol: &str,
        cumulative: f64,
    ) -> Result<()> {
        self.volume_seen
            .lock()
            .expect("volume map poisoned")
            .insert((session_no, symbol.to_string()), cumulative);
        Ok(())
    }
}
