//! Periodic reconciliation of persisted market status against the clock
//!
//! Runs every tick but writes and emits only on an actual transition, so each
//! flip produces exactly one event.

use crate::cache::SharedState;
use crate::clock::{session_state, ClockWindows};
use crate::error::Result;
use crate::events::{EventBus, MarketEvent};
use crate::grading;
use crate::models::MarketStatus;
use crate::store::Store;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Compare every active market's target state to its persisted status
///
/// Returns the number of transitions applied. A market with an unparseable
/// timezone is skipped and logged; it never blocks the others.
pub async fn reconcile_markets(
    store: &dyn Store,
    shared: &dyn SharedState,
    events: &EventBus,
    windows: &ClockWindows,
    now: DateTime<Utc>,
) -> Result<u32> {
    let markets = store.active_markets().await?;
    let mut transitions = 0;

    for market in &markets {
        let snapshot = match session_state(market, now, windows) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(market = %market.key, error = %e, "Clock: skipping market");
                continue;
            }
        };
        let target = if snapshot.state.is_open() {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        };
        if target == market.status {
            continue;
        }
        transitions += 1;

        match target {
            MarketStatus::Open => {
                let session_no = store.create_session(&market.key, now).await?;
                store.set_market_status(&market.key, target).await?;
                if market.control {
                    shared.set_session_active(&market.key, session_no).await?;
                }
                info!(
                    market = %market.key,
                    session = session_no,
                    state = ?snapshot.state,
                    "Clock: market opened"
                );
                events.publish(MarketEvent::MarketOpened {
                    market: market.key.clone(),
                    session_no,
                    at: now,
                });
            }
            MarketStatus::Closed => {
                let session_no = store.current_session(&market.key).await?;
                store.set_market_status(&market.key, target).await?;
                if market.control {
                    shared.clear_session(&market.key).await?;
                }
                if let Some(session_no) = session_no {
                    // Close is detected exactly once, so finalization runs once
                    grading::finalize_session(store, session_no, now).await?;
                    store.finalize_rolling_24h(session_no).await?;
                }
                info!(
                    market = %market.key,
                    state = ?snapshot.state,
                    "Clock: market closed"
                );
                events.publish(MarketEvent::MarketClosed {
                    market: market.key.clone(),
                    session_no,
                    at: now,
                });
            }
        }
    }

    Ok(transitions)
}
