//! Postgres implementation of the durable store

use crate::config;
use crate::error::{CoreError, Result};
use crate::models::{
    AssetKind, DailyRange, Extremes52w, HitKind, Market, MarketStatus, MinuteBar, Outcome,
    Rolling24h, SymbolSessionRow, VwapSample,
};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls};

pub struct PgStore {
    client: Arc<RwLock<Client>>,
}

impl PgStore {
    pub async fn connect() -> Result<Self> {
        Self::connect_url(&config::get_database_url()).await
    }

    pub async fn connect_url(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;

        // Connection task lives for the process lifetime
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Postgres connection error");
            }
        });

        let store = Self {
            client: Arc::new(RwLock::new(client)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let client = self.client.read().await;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS markets (
                    key TEXT PRIMARY KEY,
                    timezone TEXT NOT NULL,
                    open_time TIME NOT NULL,
                    close_time TIME NOT NULL,
                    calendar TEXT NOT NULL DEFAULT 'none',
                    kind TEXT NOT NULL DEFAULT 'equity',
                    active BOOLEAN NOT NULL DEFAULT TRUE,
                    control BOOLEAN NOT NULL DEFAULT FALSE,
                    status TEXT NOT NULL DEFAULT 'CLOSED'
                );
                CREATE TABLE IF NOT EXISTS sessions (
                    session_no BIGSERIAL PRIMARY KEY,
                    market_key TEXT NOT NULL REFERENCES markets(key),
                    captured_at TIMESTAMPTZ NOT NULL
                );
                CREATE TABLE IF NOT EXISTS minute_bars (
                    session_no BIGINT NOT NULL,
                    symbol TEXT NOT NULL,
                    minute TIMESTAMPTZ NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    close DOUBLE PRECISION NOT NULL,
                    volume DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (session_no, symbol, minute)
                );
                CREATE TABLE IF NOT EXISTS rolling_24h (
                    session_no BIGINT NOT NULL,
                    symbol TEXT NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    prev_close DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    range DOUBLE PRECISION NOT NULL,
                    range_pct DOUBLE PRECISION NOT NULL,
                    volume DOUBLE PRECISION NOT NULL,
                    finalized BOOLEAN NOT NULL DEFAULT FALSE,
                    PRIMARY KEY (session_no, symbol)
                );
                CREATE TABLE IF NOT EXISTS extremes_52w (
                    symbol TEXT PRIMARY KEY,
                    high DOUBLE PRECISION NOT NULL,
                    high_at DATE NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    low_at DATE NOT NULL
                );
                CREATE TABLE IF NOT EXISTS vwap_samples (
                    symbol TEXT NOT NULL,
                    minute TIMESTAMPTZ NOT NULL,
                    price DOUBLE PRECISION,
                    cumulative_volume DOUBLE PRECISION,
                    PRIMARY KEY (symbol, minute)
                );
                CREATE TABLE IF NOT EXISTS session_rows (
                    session_no BIGINT NOT NULL,
                    symbol TEXT NOT NULL,
                    signal TEXT NOT NULL,
                    entry_price DOUBLE PRECISION,
                    target_high DOUBLE PRECISION,
                    target_low DOUBLE PRECISION,
                    outcome TEXT NOT NULL DEFAULT 'PENDING',
                    hit_at TIMESTAMPTZ,
                    hit_price DOUBLE PRECISION,
                    hit_kind TEXT,
                    day_open DOUBLE PRECISION,
                    day_high DOUBLE PRECISION,
                    day_low DOUBLE PRECISION,
                    last_price DOUBLE PRECISION,
                    range_pct DOUBLE PRECISION,
                    PRIMARY KEY (session_no, symbol)
                );",
            )
            .await?;
        Ok(())
    }
}

fn signal_to_str(signal: crate::models::SignalKind) -> &'static str {
    use crate::models::SignalKind::*;
    match signal {
        StrongBuy => "STRONG_BUY",
        Buy => "BUY",
        Hold => "HOLD",
        Sell => "SELL",
        StrongSell => "STRONG_SELL",
    }
}

fn signal_from_str(s: &str) -> crate::models::SignalKind {
    use crate::models::SignalKind::*;
    match s {
        "STRONG_BUY" => StrongBuy,
        "BUY" => Buy,
        "SELL" => Sell,
        "STRONG_SELL" => StrongSell,
        _ => Hold,
    }
}

fn outcome_to_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Pending => "PENDING",
        Outcome::Worked => "WORKED",
        Outcome::DidntWork => "DIDNT_WORK",
        Outcome::Neutral => "NEUTRAL",
    }
}

fn outcome_from_str(s: &str) -> Outcome {
    match s {
        "WORKED" => Outcome::Worked,
        "DIDNT_WORK" => Outcome::DidntWork,
        "NEUTRAL" => Outcome::Neutral,
        _ => Outcome::Pending,
    }
}

fn hit_kind_to_str(kind: HitKind) -> &'static str {
    match kind {
        HitKind::Target => "TARGET",
        HitKind::Stop => "STOP",
    }
}

fn row_to_session_row(row: &tokio_postgres::Row) -> SymbolSessionRow {
    let hit_kind: Option<String> = row.get("hit_kind");
    SymbolSessionRow {
        session_no: row.get("session_no"),
        symbol: row.get("symbol"),
        signal: signal_from_str(row.get("signal")),
        entry_price: row.get("entry_price"),
        target_high: row.get("target_high"),
        target_low: row.get("target_low"),
        outcome: outcome_from_str(row.get("outcome")),
        hit_at: row.get("hit_at"),
        hit_price: row.get("hit_price"),
        hit_kind: hit_kind.map(|k| match k.as_str() {
            "STOP" => HitKind::Stop,
            _ => HitKind::Target,
        }),
        day_open: row.get("day_open"),
        day_high: row.get("day_high"),
        day_low: row.get("day_low"),
        last_price: row.get("last_price"),
        range_pct: row.get("range_pct"),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn active_markets(&self) -> Result<Vec<Market>> {
        let client = self.client.read().await;
        let rows = client
            .query(
                "SELECT key, timezone, open_time, close_time, calendar, kind, active, control, status
                 FROM markets WHERE active ORDER BY key",
                &[],
            )
            .await?;

        let mut markets = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let status: String = row.get("status");
            markets.push(Market {
                key: row.get("key"),
                timezone: row.get("timezone"),
                open_time: row.get("open_time"),
                close_time: row.get("close_time"),
                calendar: row.get("calendar"),
                kind: if kind == "future" {
                    AssetKind::Future
                } else {
                    AssetKind::Equity
                },
                active: row.get("active"),
                control: row.get("control"),
                status: if status == "OPEN" {
                    MarketStatus::Open
                } else {
                    MarketStatus::Closed
                },
            });
        }
        Ok(markets)
    }

    async fn set_market_status(&self, market_key: &str, status: MarketStatus) -> Result<()> {
        let client = self.client.read().await;
        let status_str = match status {
            MarketStatus::Open => "OPEN",
            MarketStatus::Closed => "CLOSED",
        };
        client
            .execute(
                "UPDATE markets SET status = $1 WHERE key = $2",
                &[&status_str, &market_key],
            )
            .await?;
        Ok(())
    }

    async fn create_session(&self, market_key: &str, at: DateTime<Utc>) -> Result<i64> {
        let client = self.client.read().await;
        let row = client
            .query_one(
                "INSERT INTO sessions (market_key, captured_at) VALUES ($1, $2)
                 RETURNING session_no",
                &[&market_key, &at],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn current_session(&self, market_key: &str) -> Result<Option<i64>> {
        let client = self.client.read().await;
        let row = client
            .query_opt(
                "SELECT session_no FROM sessions WHERE market_key = $1
                 ORDER BY session_no DESC LIMIT 1",
                &[&market_key],
            )
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn upsert_minute_bar(&self, bar: &MinuteBar) -> Result<()> {
        let client = self.client.read().await;
        // Redeliveries from the at-least-once queue land here harmlessly
        client
            .execute(
                "INSERT INTO minute_bars (session_no, symbol, minute, open, high, low, close, volume)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (session_no, symbol, minute) DO NOTHING",
                &[
                    &bar.session_no,
                    &bar.symbol,
                    &bar.minute,
                    &bar.open,
                    &bar.high,
                    &bar.low,
                    &bar.close,
                    &bar.volume,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_rolling_24h(&self, session_no: i64, symbol: &str) -> Result<Option<Rolling24h>> {
        let client = self.client.read().await;
        let row = client
            .query_opt(
                "SELECT open, prev_close, high, low, range, range_pct, volume, finalized
                 FROM rolling_24h WHERE session_no = $1 AND symbol = $2",
                &[&session_no, &symbol],
            )
            .await?;
        Ok(row.map(|r| Rolling24h {
            session_no,
            symbol: symbol.to_string(),
            open: r.get("open"),
            prev_close: r.get("prev_close"),
            high: r.get("high"),
            low: r.get("low"),
            range: r.get("range"),
            range_pct: r.get("range_pct"),
            volume: r.get("volume"),
            finalized: r.get("finalized"),
        }))
    }

    async fn upsert_rolling_24h(&self, stat: &Rolling24h) -> Result<()> {
        let client = self.client.read().await;
        client
            .execute(
                "INSERT INTO rolling_24h
                     (session_no, symbol, open, prev_close, high, low, range, range_pct, volume, finalized)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (session_no, symbol) DO UPDATE SET
                     high = EXCLUDED.high,
                     low = EXCLUDED.low,
                     range = EXCLUDED.range,
                     range_pct = EXCLUDED.range_pct,
                     volume = EXCLUDED.volume,
                     finalized = EXCLUDED.finalized",
                &[
                    &stat.session_no,
                    &stat.symbol,
                    &stat.open,
                    &stat.prev_close,
                    &stat.high,
                    &stat.low,
                    &stat.range,
                    &stat.range_pct,
                    &stat.volume,
                    &stat.finalized,
                ],
            )
            .await?;
        Ok(())
    }

    async fn finalize_rolling_24h(&self, session_no: i64) -> Result<u64> {
        let client = self.client.read().await;
        let changed = client
            .execute(
                "UPDATE rolling_24h SET finalized = TRUE
                 WHERE session_no = $1 AND NOT finalized",
                &[&session_no],
            )
            .await?;
        Ok(changed)
    }

    async fn daily_ranges(&self, symbol: &str, since: NaiveDate) -> Result<Vec<DailyRange>> {
        let client = self.client.read().await;
        let rows = client
            .query(
                "SELECT s.captured_at::date AS date, r.high, r.low
                 FROM rolling_24h r JOIN sessions s ON s.session_no = r.session_no
                 WHERE r.symbol = $1 AND s.captured_at::date >= $2
                 ORDER BY date",
                &[&symbol, &since],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| DailyRange {
                date: r.get("date"),
                high: r.get("high"),
                low: r.get("low"),
            })
            .collect())
    }

    async fn get_extremes(&self, symbol: &str) -> Result<Option<Extremes52w>> {
        let client = self.client.read().await;
        let row = client
            .query_opt(
                "SELECT high, high_at, low, low_at FROM extremes_52w WHERE symbol = $1",
                &[&symbol],
            )
            .await?;
        Ok(row.map(|r| Extremes52w {
            symbol: symbol.to_string(),
            high: r.get("high"),
            high_at: r.get("high_at"),
            low: r.get("low"),
            low_at: r.get("low_at"),
        }))
    }

    async fn upsert_extremes(&self, extremes: &Extremes52w) -> Result<()> {
        let client = self.client.read().await;
        client
            .execute(
                "INSERT INTO extremes_52w (symbol, high, high_at, low, low_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (symbol) DO UPDATE SET
                     high = EXCLUDED.high,
                     high_at = EXCLUDED.high_at,
                     low = EXCLUDED.low,
                     low_at = EXCLUDED.low_at",
                &[
                    &extremes.symbol,
                    &extremes.high,
                    &extremes.high_at,
                    &extremes.low,
                    &extremes.low_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_vwap_sample(&self, sample: &VwapSample) -> Result<()> {
        let client = self.client.read().await;
        client
            .execute(
                "INSERT INTO vwap_samples (symbol, minute, price, cumulative_volume)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (symbol, minute) DO NOTHING",
                &[
                    &sample.symbol,
                    &sample.minute,
                    &sample.price,
                    &sample.cumulative_volume,
                ],
            )
            .await?;
        Ok(())
    }

    async fn vwap_samples(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VwapSample>> {
        let client = self.client.read().await;
        let rows = client
            .query(
                "SELECT minute, price, cumulative_volume FROM vwap_samples
                 WHERE symbol = $1 AND minute >= $2 AND minute <= $3
                 ORDER BY minute",
                &[&symbol, &from, &to],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| VwapSample {
                symbol: symbol.to_string(),
                minute: r.get("minute"),
                price: r.get("price"),
                cumulative_volume: r.get("cumulative_volume"),
            })
            .collect())
    }

    async fn last_vwap_sample_before(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<VwapSample>> {
        let client = self.client.read().await;
        let row = client
            .query_opt(
                "SELECT minute, price, cumulative_volume FROM vwap_samples
                 WHERE symbol = $1 AND minute < $2
                 ORDER BY minute DESC LIMIT 1",
                &[&symbol, &at],
            )
            .await?;
        Ok(row.map(|r| VwapSample {
            symbol: symbol.to_string(),
            minute: r.get("minute"),
            price: r.get("price"),
            cumulative_volume: r.get("cumulative_volume"),
        }))
    }

    async fn upsert_session_row(&self, row: &SymbolSessionRow) -> Result<()> {
        let client = self.client.read().await;
        client
            .execute(
                "INSERT INTO session_rows
                     (session_no, symbol, signal, entry_price, target_high, target_low, outcome)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (session_no, symbol) DO NOTHING",
                &[
                    &row.session_no,
                    &row.symbol,
                    &signal_to_str(row.signal),
                    &row.entry_price,
                    &row.target_high,
                    &row.target_low,
                    &outcome_to_str(row.outcome),
                ],
            )
            .await?;
        Ok(())
    }

    async fn pending_rows(&self, session_no: i64) -> Result<Vec<SymbolSessionRow>> {
        let client = self.client.read().await;
        let rows = client
            .query(
                "SELECT * FROM session_rows
                 WHERE session_no = $1 AND outcome = 'PENDING' AND hit_at IS NULL
                 ORDER BY symbol",
                &[&session_no],
            )
            .await?;
        Ok(rows.iter().map(row_to_session_row).collect())
    }

    async fn update_row_metrics(
        &self,
        session_no: i64,
        symbol: &str,
        stat: &Rolling24h,
        last_price: f64,
    ) -> Result<()> {
        let client = self.client.read().await;
        client
            .execute(
                "UPDATE session_rows SET
                     day_open = $3, day_high = $4, day_low = $5,
                     last_price = $6, range_pct = $7
                 WHERE session_no = $1 AND symbol = $2",
                &[
                    &session_no,
                    &symbol,
                    &stat.open,
                    &stat.high,
                    &stat.low,
                    &last_price,
                    &stat.range_pct,
                ],
            )
            .await?;
        Ok(())
    }

    async fn freeze_outcome(
        &self,
        session_no: i64,
        symbol: &str,
        outcome: Outcome,
        hit_kind: HitKind,
        hit_price: f64,
        hit_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Row lock within a transaction: concurrent graders (the scheduler job,
        // a manual re-grade) serialize here and exactly one write lands.
        let mut guard = self.client.write().await;
        let tx = guard.transaction().await?;
        let locked = tx
            .query_opt(
                "SELECT outcome, hit_at FROM session_rows
                 WHERE session_no = $1 AND symbol = $2 FOR UPDATE",
                &[&session_no, &symbol],
            )
            .await?;
        let Some(row) = locked else {
            tx.rollback().await?;
            return Err(CoreError::Store(format!(
                "no session row for session {session_no} symbol {symbol}"
            )));
        };
        let current: String = row.get("outcome");
        let frozen_at: Option<DateTime<Utc>> = row.get("hit_at");
        if current != "PENDING" || frozen_at.is_some() {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.execute(
            "UPDATE session_rows SET outcome = $3, hit_kind = $4, hit_price = $5, hit_at = $6
             WHERE session_no = $1 AND symbol = $2 AND outcome = 'PENDING' AND hit_at IS NULL",
            &[
                &session_no,
                &symbol,
                &outcome_to_str(outcome),
                &hit_kind_to_str(hit_kind),
                &hit_price,
                &hit_at,
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn finalize_session(&self, session_no: i64, _at: DateTime<Utc>) -> Result<u64> {
        let client = self.client.read().await;
        // Never touches rows that carry freeze metadata
        let changed = client
            .execute(
                "UPDATE session_rows SET outcome = 'NEUTRAL'
                 WHERE session_no = $1 AND outcome = 'PENDING' AND hit_at IS NULL",
                &[&session_no],
            )
            .await?;
        Ok(changed)
    }
}
