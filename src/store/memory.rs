//! In-memory store for tests; mirrors the Postgres conditional-update semantics

use crate::error::Result;
use crate::models::{
    DailyRange, Extremes52w, HitKind, Market, MarketStatus, MinuteBar, Outcome, Rolling24h,
    SessionInstance, SymbolSessionRow, VwapSample,
};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct StoreState {
    markets: Vec<Market>,
    sessions: Vec<SessionInstance>,
    next_session_no: i64,
    bars: HashMap<(i64, String, DateTime<Utc>), MinuteBar>,
    rolling: HashMap<(i64, String), Rolling24h>,
    extremes: HashMap<String, Extremes52w>,
    vwap: Vec<VwapSample>,
    rows: HashMap<(i64, String), SymbolSessionRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                next_session_no: 1,
                ..Default::default()
            }),
        }
    }

    pub fn seed_market(&self, market: Market) {
        self.state.lock().expect("store poisoned").markets.push(market);
    }

    pub fn get_row(&self, session_no: i64, symbol: &str) -> Option<SymbolSessionRow> {
        self.state
            .lock()
            .expect("store poisoned")
            .rows
            .get(&(session_no, symbol.to_string()))
            .cloned()
    }

    pub fn get_bar(
        &self,
        session_no: i64,
        symbol: &str,
        minute: DateTime<Utc>,
    ) -> Option<MinuteBar> {
        self.state
            .lock()
            .expect("store poisoned")
            .bars
            .get(&(session_no, symbol.to_string(), minute))
            .cloned()
    }

    pub fn bar_count(&self) -> usize {
        self.state.lock().expect("store poisoned").bars.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn active_markets(&self) -> Result<Vec<Market>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.markets.iter().filter(|m| m.active).cloned().collect())
    }

    async fn set_market_status(&self, market_key: &str, status: MarketStatus) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        for market in state.markets.iter_mut() {
            if market.key == market_key {
                market.status = status;
            }
        }
        Ok(())
    }

    async fn create_session(&self, market_key: &str, at: DateTime<Utc>) -> Result<i64> {
        let mut state = self.state.lock().expect("store poisoned");
        let session_no = state.next_session_no;
        state.next_session_no += 1;
        state.sessions.push(SessionInstance {
            session_no,
            market_key: market_key.to_string(),
            captured_at: at,
        });
        Ok(session_no)
    }

    async fn current_session(&self, market_key: &str) -> Result<Option<i64>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .sessions
            .iter()
            .rev()
            .find(|s| s.market_key == market_key)
            .map(|s| s.session_no))
    }

    async fn upsert_minute_bar(&self, bar: &MinuteBar) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        // Insert-or-ignore, like ON CONFLICT DO NOTHING
        state
            .bars
            .entry((bar.session_no, bar.symbol.clone(), bar.minute))
            .or_insert_with(|| bar.clone());
        Ok(())
    }

    async fn get_rolling_24h(&self, session_no: i64, symbol: &str) -> Result<Option<Rolling24h>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.rolling.get(&(session_no, symbol.to_string())).cloned())
    }

    async fn upsert_rolling_24h(&self, stat: &Rolling24h) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state
            .rolling
            .insert((stat.session_no, stat.symbol.clone()), stat.clone());
        Ok(())
    }

    async fn finalize_rolling_24h(&self, session_no: i64) -> Result<u64> {
        let mut state = self.state.lock().expect("store poisoned");
        let mut changed = 0;
        for stat in state.rolling.values_mut() {
            if stat.session_no == session_no && !stat.finalized {
                stat.finalized = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn daily_ranges(&self, symbol: &str, since: NaiveDate) -> Result<Vec<DailyRange>> {
        let state = self.state.lock().expect("store poisoned");
        // Sessions carry the capture date; join against finalized stats
        let mut ranges: Vec<DailyRange> = state
            .rolling
            .values()
            .filter(|stat| stat.symbol == symbol)
            .filter_map(|stat| {
                let session = state
                    .sessions
                    .iter()
                    .find(|s| s.session_no == stat.session_no)?;
                let date = session.captured_at.date_naive();
                (date >= since).then_some(DailyRange {
                    date,
                    high: stat.high,
                    low: stat.low,
                })
            })
            .collect();
        ranges.sort_by_key(|r| r.date);
        Ok(ranges)
    }

    async fn get_extremes(&self, symbol: &str) -> Result<Option<Extremes52w>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.extremes.get(symbol).cloned())
    }

    async fn upsert_extremes(&self, extremes: &Extremes52w) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state
            .extremes
            .insert(extremes.symbol.clone(), extremes.clone());
        Ok(())
    }

    async fn insert_vwap_sample(&self, sample: &VwapSample) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.vwap.push(sample.clone());
        Ok(())
    }

    async fn vwap_samples(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VwapSample>> {
        let state = self.state.lock().expect("store poisoned");
        let mut samples: Vec<VwapSample> = state
            .vwap
            .iter()
            .filter(|s| s.symbol == symbol && s.minute >= from && s.minute <= to)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.minute);
        Ok(samples)
    }

    async fn last_vwap_sample_before(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<VwapSample>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .vwap
            .iter()
            .filter(|s| s.symbol == symbol && s.minute < at)
            .max_by_key(|s| s.minute)
            .cloned())
    }

    async fn upsert_session_row(&self, row: &SymbolSessionRow) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state
            .rows
            .insert((row.session_no, row.symbol.clone()), row.clone());
        Ok(())
    }

    async fn pending_rows(&self, session_no: i64) -> Result<Vec<SymbolSessionRow>> {
        let state = self.state.lock().expect("store poisoned");
        let mut rows: Vec<SymbolSessionRow> = state
            .rows
            .values()
            .filter(|r| {
                r.session_no == session_no && r.outcome == Outcome::Pending && !r.is_frozen()
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(rows)
    }

    async fn update_row_metrics(
        &self,
        session_no: i64,
        symbol: &str,
        stat: &Rolling24h,
        last_price: f64,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        if let Some(row) = state.rows.get_mut(&(session_no, symbol.to_string())) {
            row.day_open = Some(stat.open);
            row.day_high = Some(stat.high);
            row.day_low = Some(stat.low);
            row.last_price = Some(last_price);
            row.range_pct = Some(stat.range_pct);
        }
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
        let mut state = self.state.lock().expect("store poisoned");
        match state.rows.get_mut(&(session_no, symbol.to_string())) {
            Some(row) if row.outcome == Outcome::Pending && !row.is_frozen() => {
                row.outcome = outcome;
                row.hit_kind = Some(hit_kind);
                row.hit_price = Some(hit_price);
                row.hit_at = Some(hit_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_session(&self, session_no: i64, _at: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().expect("store poisoned");
        let mut changed = 0;
        for row in state.rows.values_mut() {
            if row.session_no == session_no && row.outcome == Outcome::Pending && !row.is_frozen() {
                row.outcome = Outcome::Neutral;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
