//! Rolling statistic accumulators and the VWAP calculator

pub mod extremes;
pub mod vwap;

use crate::error::Result;
use crate::models::Rolling24h;
use crate::store::Store;
use chrono::{DateTime, Utc};

pub use extremes::recompute_extremes;
pub use vwap::{vwap, VWAP_SCALE};

/// VWAP for one symbol over `[from, to]`, baselined correctly
///
/// The sample strictly before `from` anchors the first increment so the
/// window never absorbs volume that accumulated before it opened.
pub async fn vwap_over_window(
    store: &dyn Store,
    symbol: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Option<f64>> {
    let baseline = store.last_vwap_sample_before(symbol, from).await?;
    let samples = store.vwap_samples(symbol, from, to).await?;
    Ok(vwap(&samples, baseline.as_ref()))
}

/// Fold one observation into a 24h stat, creating it on first sight
pub fn apply_observation(
    existing: Option<Rolling24h>,
    session_no: i64,
    symbol: &str,
    price: f64,
    volume_delta: f64,
) -> Rolling24h {
    let mut stat = match existing {
        Some(stat) => stat,
        None => Rolling24h::seed(session_no, symbol, price),
    };
    stat.observe(price, volume_delta);
    stat
}
