//! Unit tests for holiday calendar resolution

use chrono::NaiveDate;
use marketbeat::clock::{calendar, easter_sunday};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn test_easter_sunday_known_years() {
    assert_eq!(easter_sunday(2024), date(2024, 3, 31));
    assert_eq!(easter_sunday(2025), date(2025, 4, 20));
    assert_eq!(easter_sunday(2026), date(2026, 4, 5));
}

#[test]
fn test_fixed_holiday() {
    let cal = calendar("us");
    assert!(cal.contains(date(2024, 12, 25)));
    assert!(!cal.contains(date(2024, 12, 24)));
}

#[test]
fn test_saturday_holiday_observed_friday() {
    // July 4th 2026 falls on a Saturday
    let cal = calendar("us");
    assert!(cal.contains(date(2026, 7, 3)));
    assert!(!cal.contains(date(2026, 7, 4)));
}

#[test]
fn test_sunday_holiday_observed_monday() {
    // July 4th 2021 fell on a Sunday
    let cal = calendar("us");
    assert!(cal.contains(date(2021, 7, 5)));
    assert!(!cal.contains(date(2021, 7, 4)));
}

#[test]
fn test_nth_weekday_holidays() {
    let cal = calendar("us");
    // MLK: third Monday of January
    assert!(cal.contains(date(2024, 1, 15)));
    // Memorial Day: last Monday of May
    assert!(cal.contains(date(2024, 5, 27)));
    // Thanksgiving: fourth Thursday of November
    assert!(cal.contains(date(2024, 11, 28)));
    assert!(!cal.contains(date(2024, 11, 21)));
}

#[test]
fn test_easter_offset_holiday() {
    // Good Friday 2024
    let cal = calendar("us");
    assert!(cal.contains(date(2024, 3, 29)));
}

#[test]
fn test_unknown_calendar_has_no_holidays() {
    let cal = calendar("made-up");
    assert!(cal.resolve(2024).is_empty());
    assert!(!cal.contains(date(2024, 12, 25)));
}
