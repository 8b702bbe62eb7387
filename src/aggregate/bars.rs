//! In-memory current-bar state for the tick-to-bar aggregator

use crate::cache::ActiveSession;
use crate::error::{CoreError, Result};
use crate::models::{Market, PendingBar, Quote};
use std::collections::HashMap;

/// Pick the active session a quote routes to, by asset kind
///
/// Equities and futures route independently; a quote with no matching active
/// session is simply not aggregated. Quotes carry no market linkage, so the
/// seeded markets must keep at most one market per asset kind open at a time;
/// should two overlap, the first active session in tracker order takes every
/// quote of that kind.
pub fn route_quote<'a>(
    sessions: &'a [ActiveSession],
    markets: &[Market],
    quote: &Quote,
) -> Option<&'a ActiveSession> {
    sessions.iter().find(|session| {
        markets
            .iter()
            .any(|m| m.key == session.market_key && m.kind == quote.kind)
    })
}

/// Turns quote snapshots into closed 1-minute bars
///
/// Holds the open bar per (market, symbol) plus the last cumulative volume
/// counter seen, so bar volume is a true per-minute delta. State lives on the
/// aggregator instance, owned by its job; nothing here is process-global.
#[derive(Default)]
pub struct BarAggregator {
    current: HashMap<(String, String), PendingBar>,
    last_cumulative: HashMap<(String, String), f64>,
}

impl BarAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one quote in; returns the previous bar when its minute closed
    pub fn ingest(&mut self, market_key: &str, quote: &Quote) -> Result<Option<PendingBar>> {
        let price = quote.price.ok_or_else(|| CoreError::MalformedQuote {
            symbol: quote.symbol.clone(),
            reason: "missing price".to_string(),
        })?;
        let bucket = quote.minute_bucket().ok_or_else(|| CoreError::MalformedQuote {
            symbol: quote.symbol.clone(),
            reason: "timestamp outside representable range".to_string(),
        })?;

        let key = (market_key.to_string(), quote.symbol.clone());
        let volume_delta = match (quote.volume, self.last_cumulative.get(&key)) {
            (Some(cumulative), Some(last)) => {
                let delta = (cumulative - last).max(0.0);
                self.last_cumulative.insert(key.clone(), cumulative);
                delta
            }
            (Some(cumulative), None) => {
                self.last_cumulative.insert(key.clone(), cumulative);
                0.0
            }
            (None, _) => 0.0,
        };

        match self.current.get_mut(&key) {
            Some(bar) if bar.minute == bucket => {
                bar.extend(price, volume_delta);
                Ok(None)
            }
            Some(bar) if bucket > bar.minute => {
                let closed = std::mem::replace(
                    bar,
                    PendingBar::open_at(market_key, &quote.symbol, bucket, price),
                );
                bar.volume = volume_delta;
                Ok(Some(closed))
            }
            // A tick older than the open bar's bucket arrives out of order; drop it
            Some(_) => Ok(None),
            None => {
                let mut bar = PendingBar::open_at(market_key, &quote.symbol, bucket, price);
                bar.volume = volume_delta;
                self.current.insert(key, bar);
                Ok(None)
            }
        }
    }

    /// Drop bar state for sessions that are no longer active
    pub fn retain_markets(&mut self, active: &[String]) {
        self.current.retain(|(market, _), _| active.contains(market));
        self.last_cumulative
            .retain(|(market, _), _| active.contains(market));
    }

    pub fn open_bar_count(&self) -> usize {
        self.current.len()
    }
}
