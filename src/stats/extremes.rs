//! Batch recomputation of trailing 52-week extremes
//!
//! Live observation only ever pushes extremes outward; values that scroll out
//! of the trailing window are fixed here from daily high/low history.

use crate::models::{DailyRange, Extremes52w};

/// Rebuild true trailing extremes from daily 24h high/low rows
///
/// The input is expected to already be limited to the trailing window; an
/// empty history yields `None` (nothing to replace the live record with).
pub fn recompute_extremes(symbol: &str, history: &[DailyRange]) -> Option<Extremes52w> {
    let first = history.first()?;
    let mut extremes = Extremes52w {
        symbol: symbol.to_string(),
        high: first.high,
        high_at: first.date,
        low: first.low,
        low_at: first.date,
    };
    for day in &history[1..] {
        if day.high > extremes.high {
            extremes.high = day.high;
            extremes.high_at = day.date;
        }
        if day.low < extremes.low {
            extremes.low = day.low;
            extremes.low_at = day.date;
        }
    }
    Some(extremes)
}
