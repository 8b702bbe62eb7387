//! Unit tests for the rolling 24h accumulator

use marketbeat::models::Rolling24h;
use marketbeat::stats::apply_observation;

#[test]
fn test_seed_sets_every_field_from_first_price() {
    let stat = Rolling24h::seed(1, "AAPL", 100.0);
    assert_eq!(stat.open, 100.0);
    assert_eq!(stat.prev_close, 100.0);
    assert_eq!(stat.high, 100.0);
    assert_eq!(stat.low, 100.0);
    assert_eq!(stat.range, 0.0);
    assert_eq!(stat.volume, 0.0);
    assert!(!stat.finalized);
}

#[test]
fn test_observe_rolls_high_low_and_range() {
    let mut stat = Rolling24h::seed(1, "AAPL", 100.0);
    stat.observe(104.0, 10.0);
    stat.observe(98.0, 5.0);
    stat.observe(101.0, 0.0);

    assert_eq!(stat.high, 104.0);
    assert_eq!(stat.low, 98.0);
    assert_eq!(stat.range, 6.0);
    assert!((stat.range_pct - 6.0).abs() < 1e-9);
    assert_eq!(stat.volume, 15.0);
    // The session open never moves once seeded
    assert_eq!(stat.open, 100.0);
}

#[test]
fn test_negative_volume_delta_is_not_accumulated() {
    let mut stat = Rolling24h::seed(1, "AAPL", 100.0);
    stat.observe(100.0, -50.0);
    assert_eq!(stat.volume, 0.0);
}

#[test]
fn test_apply_observation_creates_then_updates() {
    let created = apply_observation(None, 1, "AAPL", 100.0, 10.0);
    assert_eq!(created.open, 100.0);
    assert_eq!(created.volume, 10.0);

    let updated = apply_observation(Some(created), 1, "AAPL", 105.0, 5.0);
    assert_eq!(updated.open, 100.0);
    assert_eq!(updated.high, 105.0);
    assert_eq!(updated.volume, 15.0);
}
