//! First-touch signal grading and end-of-session finalization
//!
//! Buy signals are graded against the bid and sell signals against the ask:
//! outcomes measure the exit side of the book, intentionally the opposite of
//! entry-fill pricing. Preserve this asymmetry.

use crate::error::Result;
use crate::models::{HitKind, Outcome, Quote, SymbolSessionRow};
use crate::store::Store;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// A touch that satisfies a target or stop condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub outcome: Outcome,
    pub hit_kind: HitKind,
    pub hit_price: f64,
}

/// Evaluate one row against the latest quote
///
/// Only Pending, unfrozen rows with a directional signal and both targets are
/// candidates; everything else returns `None`.
pub fn evaluate(row: &SymbolSessionRow, quote: &Quote) -> Option<Touch> {
    if row.outcome != Outcome::Pending || row.is_frozen() {
        return None;
    }
    let (target_high, target_low) = match (row.entry_price, row.target_high, row.target_low) {
        (Some(_), Some(th), Some(tl)) => (th, tl),
        _ => return None,
    };

    if row.signal.is_buy() {
        let bid = quote.bid?;
        if bid >= target_high {
            return Some(Touch {
                outcome: Outcome::Worked,
                hit_kind: HitKind::Target,
                hit_price: bid,
            });
        }
        if bid <= target_low {
            return Some(Touch {
                outcome: Outcome::DidntWork,
                hit_kind: HitKind::Stop,
                hit_price: bid,
            });
        }
    } else if row.signal.is_sell() {
        let ask = quote.ask?;
        if ask <= target_low {
            return Some(Touch {
                outcome: Outcome::Worked,
                hit_kind: HitKind::Target,
                hit_price: ask,
            });
        }
        if ask >= target_high {
            return Some(Touch {
                outcome: Outcome::DidntWork,
                hit_kind: HitKind::Stop,
                hit_price: ask,
            });
        }
    }
    // Hold and signal-less rows are never graded
    None
}

/// Attempt to freeze a touch; first touch wins across concurrent callers
///
/// The store performs the conditional write under row-level locking, so a lost
/// race returns false rather than overwriting earlier freeze metadata.
pub async fn freeze_touch(
    store: &dyn Store,
    row: &SymbolSessionRow,
    touch: Touch,
    at: DateTime<Utc>,
) -> Result<bool> {
    let won = store
        .freeze_outcome(
            row.session_no,
            &row.symbol,
            touch.outcome,
            touch.hit_kind,
            touch.hit_price,
            at,
        )
        .await?;
    if won {
        info!(
            symbol = %row.symbol,
            session = row.session_no,
            outcome = ?touch.outcome,
            hit_price = touch.hit_price,
            "Grading: outcome frozen"
        );
    } else {
        debug!(
            symbol = %row.symbol,
            session = row.session_no,
            "Grading: freeze lost the race, row already graded"
        );
    }
    Ok(won)
}

/// Force still-Pending, never-frozen rows of a closed session to Neutral
pub async fn finalize_session(
    store: &dyn Store,
    session_no: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let neutralized = store.finalize_session(session_no, at).await?;
    if neutralized > 0 {
        info!(
            session = session_no,
            neutralized, "Grading: finalized session, pending rows set to Neutral"
        );
    }
    Ok(neutralized)
}
