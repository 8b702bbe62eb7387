//! Redis-backed quote cache reader and shared state

use crate::cache::{ActiveSession, QuoteSource, SharedState};
use crate::error::Result;
use crate::models::Quote;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const QUOTE_KEY_PREFIX: &str = "quote:";
const RECENT_SYMBOLS_KEY: &str = "quotes:recent";
const ACTIVE_SESSIONS_KEY: &str = "sessions:active";
const VOLUME_SEEN_PREFIX: &str = "volume:seen:";

/// Reads quote snapshots written by the upstream feed service
#[derive(Clone)]
pub struct RedisQuoteCache {
    conn: ConnectionManager,
}

impl RedisQuoteCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl QuoteSource for RedisQuoteCache {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(format!("{QUOTE_KEY_PREFIX}{symbol}")).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn latest_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(quote) = self.latest_quote(symbol).await? {
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }

    async fn recent_symbols(&self, freshness: Duration) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let cutoff = Utc::now().timestamp() - freshness.as_secs() as i64;
        // Sorted set scored by last-quote epoch seconds, maintained by the feed
        let symbols: Vec<String> = conn
            .zrangebyscore(RECENT_SYMBOLS_KEY, cutoff, "+inf")
            .await?;
        Ok(symbols)
    }
}

/// Active-session tracker and volume side cache over Redis
#[derive(Clone)]
pub struct RedisSharedState {
    conn: ConnectionManager,
    volume_ttl: Duration,
}

impl RedisSharedState {
    pub async fn connect(url: &str, volume_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, volume_ttl })
    }

    pub fn from_manager(conn: ConnectionManager, volume_ttl: Duration) -> Self {
        Self { conn, volume_ttl }
    }
}

#[async_trait]
impl SharedState for RedisSharedState {
    async fn set_session_active(&self, market_key: &str, session_no: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(ACTIVE_SESSIONS_KEY, market_key, session_no)
            .await?;
        Ok(())
    }

    async fn clear_session(&self, market_key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(ACTIVE_SESSIONS_KEY, market_key).await?;
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<ActiveSession>> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, i64)> = conn.hgetall(ACTIVE_SESSIONS_KEY).await?;
        Ok(entries
            .into_iter()
            .map(|(market_key, session_no)| ActiveSession {
                market_key,
                session_no,
            })
            .collect())
    }

    async fn last_seen_volume(&self, session_no: i64, symbol: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let key = format!("{VOLUME_SEEN_PREFIX}{session_no}:{symbol}");
        // GETEX refreshes the TTL on read so an in-flight baseline never lapses
        let previous: Option<f64> = redis::cmd("GETEX")
            .arg(&key)
            .arg("EX")
            .arg(self.volume_ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(previous)
    }

    async fn record_seen_volume(
        &self,
        session_no: i64,
        symbol: &str,
        cumulative: f64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = format!("{VOLUME_SEEN_PREFIX}{session_no}:{symbol}");
        let _: () = conn
            .set_ex(&key, cumulative, self.volume_ttl.as_secs())
            .await?;
        Ok(())
    }
}
