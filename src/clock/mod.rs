//! Market clock: pure mapping from (market definition, instant) to session state

pub mod holidays;
pub mod reconcile;

use crate::config::WorkerConfig;
use crate::error::{CoreError, Result};
use crate::models::{Market, SessionState};
use chrono::{DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

pub use holidays::{calendar, easter_sunday, HolidayCalendar, HolidayRule};
pub use reconcile::reconcile_markets;

/// Lead windows for the PreOpen/PreClose states
#[derive(Debug, Clone, Copy)]
pub struct ClockWindows {
    pub preopen_lead: Duration,
    pub preclose_lead: Duration,
}

impl ClockWindows {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            preopen_lead: Duration::seconds(config.preopen_lead.as_secs() as i64),
            preclose_lead: Duration::seconds(config.preclose_lead.as_secs() as i64),
        }
    }
}

impl Default for ClockWindows {
    fn default() -> Self {
        Self {
            preopen_lead: Duration::minutes(60),
            preclose_lead: Duration::minutes(15),
        }
    }
}

/// Result of one clock evaluation, with scheduling hints
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub next_open: Option<DateTime<Utc>>,
    pub next_close: Option<DateTime<Utc>>,
    pub seconds_to_next_event: Option<i64>,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Resolve a market-local wall time to UTC, tolerating DST folds
fn local_to_utc(tz: Tz, date: NaiveDate, time: chrono::NaiveTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// The session window anchored on one local calendar date
fn session_window(
    market: &Market,
    tz: Tz,
    anchor: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let open = local_to_utc(tz, anchor, market.open_time)?;
    let close_date = if market.is_overnight() {
        anchor.checked_add_days(Days::new(1))?
    } else {
        anchor
    };
    let close = local_to_utc(tz, close_date, market.close_time)?;
    Some((open, close))
}

/// Compute the session state for one market at one instant
///
/// Weekend local dates force Closed/HolidayClosed regardless of configured
/// hours; holidays on a weekday force HolidayClosed.
pub fn session_state(
    market: &Market,
    now: DateTime<Utc>,
    windows: &ClockWindows,
) -> Result<SessionSnapshot> {
    let tz: Tz = market
        .timezone
        .parse()
        .map_err(|_| CoreError::Timezone(market.timezone.clone()))?;
    let cal = holidays::calendar(&market.calendar);
    let local_date = now.with_timezone(&tz).date_naive();

    let trading_day = |d: NaiveDate| !is_weekend(d) && !cal.contains(d);

    let next_open = walk_next_open(market, tz, now, local_date, &trading_day);

    if is_weekend(local_date) || cal.contains(local_date) {
        let state = if cal.contains(local_date) {
            SessionState::HolidayClosed
        } else {
            SessionState::Closed
        };
        let seconds = next_open.map(|o| (o - now).num_seconds());
        return Ok(SessionSnapshot {
            state,
            next_open,
            next_close: next_open
                .and_then(|o| session_window(market, tz, o.with_timezone(&tz).date_naive()))
                .map(|(_, c)| c),
            seconds_to_next_event: seconds,
        });
    }

    // Overnight sessions may still be running from yesterday's anchor
    let mut in_session: Option<DateTime<Utc>> = None;
    let yesterday = local_date.checked_sub_days(Days::new(1));
    let anchors = [Some(local_date), yesterday];
    for anchor in anchors.into_iter().flatten() {
        if !trading_day(anchor) {
            continue;
        }
        if let Some((open, close)) = session_window(market, tz, anchor) {
            if now >= open && now < close {
                in_session = Some(close);
                break;
            }
        }
    }

    if let Some(close) = in_session {
        let state = if close - now <= windows.preclose_lead {
            SessionState::PreClose
        } else {
            SessionState::Open
        };
        return Ok(SessionSnapshot {
            state,
            next_open,
            next_close: Some(close),
            seconds_to_next_event: Some((close - now).num_seconds()),
        });
    }

    let state = match next_open {
        Some(open) if open - now <= windows.preopen_lead => SessionState::PreOpen,
        _ => SessionState::Closed,
    };
    let next_close = next_open
        .and_then(|o| session_window(market, tz, o.with_timezone(&tz).date_naive()))
        .map(|(_, c)| c);
    Ok(SessionSnapshot {
        state,
        next_open,
        next_close,
        seconds_to_next_event: next_open.map(|o| (o - now).num_seconds()),
    })
}

/// Walk forward to the next trading-day open strictly after `now`
fn walk_next_open(
    market: &Market,
    tz: Tz,
    now: DateTime<Utc>,
    from: NaiveDate,
    trading_day: &impl Fn(NaiveDate) -> bool,
) -> Option<DateTime<Utc>> {
    let mut date = from;
    // A year of walking covers any holiday cluster
    for _ in 0..370 {
        if trading_day(date) {
            if let Some((open, _)) = session_window(market, tz, date) {
                if open > now {
                    return Some(open);
                }
            }
        }
        date = date.checked_add_days(Days::new(1))?;
    }
    None
}
