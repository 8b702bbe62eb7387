//! Volume-weighted average price from per-minute cumulative-volume snapshots
//!
//! The feed exposes a cumulative counter, not per-trade increments, so each
//! snapshot's volume is reconstructed as the difference against its
//! predecessor.

use crate::models::VwapSample;

/// Fixed decimal precision of the reported VWAP (4 places)
pub const VWAP_SCALE: f64 = 10_000.0;

/// Compute VWAP over time-ordered samples
///
/// `baseline` must be the last sample strictly before the window start when
/// computing a bounded window; without it the first snapshot's entire
/// cumulative counter would be attributed to the window. Samples missing a
/// price or volume, and non-positive increments (feed resets), are skipped.
/// A zero denominator yields `None`: unavailable, not zero.
pub fn vwap(samples: &[VwapSample], baseline: Option<&VwapSample>) -> Option<f64> {
    let mut prev_cumulative = baseline.and_then(|s| s.cumulative_volume);
    let mut weighted_sum = 0.0;
    let mut volume_sum = 0.0;

    for sample in samples {
        let (Some(price), Some(cumulative)) = (sample.price, sample.cumulative_volume) else {
            continue;
        };
        let increment = match prev_cumulative {
            Some(prev) => cumulative - prev,
            // No baseline: the first snapshot's counter is the first increment
            None => cumulative,
        };
        prev_cumulative = Some(cumulative);
        if increment <= 0.0 {
            continue;
        }
        weighted_sum += price * increment;
        volume_sum += increment;
    }

    if volume_sum <= 0.0 {
        return None;
    }
    Some((weighted_sum / volume_sum * VWAP_SCALE).round() / VWAP_SCALE)
}
