//! Holiday calendars: fixed dates, nth-weekday rules, and Easter-derived dates
//!
//! Fixed-date holidays shift when they fall on a weekend: Saturday is observed
//! on Friday, Sunday on Monday.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::HashSet;

/// One holiday rule, resolved per year
#[derive(Debug, Clone)]
pub enum HolidayRule {
    /// Same month/day every year, weekend-observed shift applied
    Fixed { month: u32, day: u32 },
    /// nth weekday of a month; negative nth counts from the end (-1 = last)
    NthWeekday {
        month: u32,
        weekday: Weekday,
        nth: i8,
    },
    /// Offset in days from Easter Sunday (e.g. -2 for Good Friday)
    EasterOffset { days: i64 },
}

/// Named set of holiday rules for one exchange family
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    pub name: String,
    pub rules: Vec<HolidayRule>,
}

impl HolidayCalendar {
    /// Resolve the calendar to concrete dates for one year
    pub fn resolve(&self, year: i32) -> HashSet<NaiveDate> {
        let mut dates = HashSet::new();
        for rule in &self.rules {
            if let Some(date) = resolve_rule(rule, year) {
                dates.insert(date);
            }
        }
        dates
    }

    /// Whether the given date is a holiday
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.resolve(date.year()).contains(&date)
    }
}

fn resolve_rule(rule: &HolidayRule, year: i32) -> Option<NaiveDate> {
    match rule {
        HolidayRule::Fixed { month, day } => {
            NaiveDate::from_ymd_opt(year, *month, *day).map(observed_shift)
        }
        HolidayRule::NthWeekday {
            month,
            weekday,
            nth,
        } => nth_weekday_of_month(year, *month, *weekday, *nth),
        HolidayRule::EasterOffset { days } => {
            let easter = easter_sunday(year);
            if *days >= 0 {
                easter.checked_add_days(Days::new(*days as u64))
            } else {
                easter.checked_sub_days(Days::new(days.unsigned_abs()))
            }
        }
    }
}

/// Saturday holidays are observed Friday, Sunday holidays Monday
fn observed_shift(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: i8) -> Option<NaiveDate> {
    if nth > 0 {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let offset = (7 + weekday.num_days_from_monday() as i64
            - first.weekday().num_days_from_monday() as i64)
            % 7;
        let day = 1 + offset + 7 * (nth as i64 - 1);
        NaiveDate::from_ymd_opt(year, month, day as u32)
    } else {
        // Count back from the last day of the month
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let last = next_month.pred_opt()?;
        let offset = (7 + last.weekday().num_days_from_monday() as i64
            - weekday.num_days_from_monday() as i64)
            % 7;
        let day = last.day() as i64 - offset - 7 * (nth.unsigned_abs() as i64 - 1);
        NaiveDate::from_ymd_opt(year, month, day as u32)
    }
}

/// Gregorian Easter Sunday (anonymous computus)
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    // The computus always yields a valid March/April date
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 4, 1).expect("valid date"))
}

/// Look up a built-in calendar by id
pub fn calendar(name: &str) -> HolidayCalendar {
    match name {
        "us" => HolidayCalendar {
            name: "us".to_string(),
            rules: vec![
                HolidayRule::Fixed { month: 1, day: 1 },
                HolidayRule::NthWeekday {
                    month: 1,
                    weekday: Weekday::Mon,
                    nth: 3,
                },
                HolidayRule::NthWeekday {
                    month: 2,
                    weekday: Weekday::Mon,
                    nth: 3,
                },
                HolidayRule::EasterOffset { days: -2 },
                HolidayRule::NthWeekday {
                    month: 5,
                    weekday: Weekday::Mon,
                    nth: -1,
                },
                HolidayRule::Fixed { month: 6, day: 19 },
                HolidayRule::Fixed { month: 7, day: 4 },
                HolidayRule::NthWeekday {
                    month: 9,
                    weekday: Weekday::Mon,
                    nth: 1,
                },
                HolidayRule::NthWeekday {
                    month: 11,
                    weekday: Weekday::Thu,
                    nth: 4,
                },
                HolidayRule::Fixed { month: 12, day: 25 },
            ],
        },
        _ => HolidayCalendar {
            name: "none".to_string(),
            rules: Vec::new(),
        },
    }
}
