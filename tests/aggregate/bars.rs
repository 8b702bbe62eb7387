//! Unit tests for tick-to-bar aggregation

use crate::common_fixtures::{quote_at, utc};
use marketbeat::aggregate::{route_quote, BarAggregator};
use marketbeat::cache::ActiveSession;
use marketbeat::models::{AssetKind, Market, Quote};

#[test]
fn test_cumulative_volume_becomes_deltas() {
    let mut agg = BarAggregator::new();
    let at = utc(2024, 1, 10, 15, 0);
    for cumulative in [100.0, 100.0, 250.0, 400.0] {
        let closed = agg
            .ingest("NYSE", &quote_at("AAPL", 50.0, Some(cumulative), at))
            .expect("well-formed quote");
        assert!(closed.is_none());
    }
    // First observation only sets the baseline; the bar accumulates 0+150+150
    let closed = agg
        .ingest("NYSE", &quote_at("AAPL", 50.0, Some(400.0), utc(2024, 1, 10, 15, 1)))
        .expect("well-formed quote")
        .expect("minute advanced");
    assert_eq!(closed.volume, 300.0);
}

#[test]
fn test_minute_advance_closes_the_previous_bar() {
    let mut agg = BarAggregator::new();
    agg.ingest("NYSE", &quote_at("AAPL", 100.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("open");
    agg.ingest("NYSE", &quote_at("AAPL", 102.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("extend");
    agg.ingest("NYSE", &quote_at("AAPL", 99.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("extend");

    let closed = agg
        .ingest("NYSE", &quote_at("AAPL", 101.0, None, utc(2024, 1, 10, 15, 1)))
        .expect("well-formed quote")
        .expect("previous minute closed");
    assert_eq!(closed.minute, utc(2024, 1, 10, 15, 0));
    assert_eq!(closed.open, 100.0);
    assert_eq!(closed.high, 102.0);
    assert_eq!(closed.low, 99.0);
    assert_eq!(closed.close, 99.0);
    assert_eq!(agg.open_bar_count(), 1);
}

#[test]
fn test_out_of_order_tick_is_dropped() {
    let mut agg = BarAggregator::new();
    agg.ingest("NYSE", &quote_at("AAPL", 100.0, None, utc(2024, 1, 10, 15, 1)))
        .expect("open");
    let closed = agg
        .ingest("NYSE", &quote_at("AAPL", 90.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("well-formed quote");
    assert!(closed.is_none());

    let current = agg
        .ingest("NYSE", &quote_at("AAPL", 101.0, None, utc(2024, 1, 10, 15, 2)))
        .expect("well-formed quote")
        .expect("closed");
    // The stale 90.0 tick never touched the bar
    assert_eq!(current.low, 100.0);
}

#[test]
fn test_quote_without_price_is_malformed() {
    let mut agg = BarAggregator::new();
    let mut quote = quote_at("AAPL", 0.0, None, utc(2024, 1, 10, 15, 0));
    quote.price = None;
    assert!(agg.ingest("NYSE", &quote).is_err());
}

#[test]
fn test_retain_markets_drops_stale_state() {
    let mut agg = BarAggregator::new();
    agg.ingest("NYSE", &quote_at("AAPL", 100.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("open");
    agg.ingest("GLOBEX", &quote_at("ES", 4800.0, None, utc(2024, 1, 10, 15, 0)))
        .expect("open");
    assert_eq!(agg.open_bar_count(), 2);

    agg.retain_markets(&["NYSE".to_string()]);
    assert_eq!(agg.open_bar_count(), 1);
}

#[test]
fn test_quotes_route_by_asset_kind() {
    let sessions = vec![
        ActiveSession {
            market_key: "NYSE".to_string(),
            session_no: 1,
        },
        ActiveSession {
            market_key: "GLOBEX".to_string(),
            session_no: 2,
        },
    ];
    let markets = vec![crate::common_fixtures::nyse(), crate::common_fixtures::globex()];

    let equity = quote_at("AAPL", 100.0, None, utc(2024, 1, 10, 15, 0));
    let routed = route_quote(&sessions, &markets, &equity).expect("equity session active");
    assert_eq!(routed.market_key, "NYSE");

    let future = Quote {
        kind: AssetKind::Future,
        ..quote_at("ES", 4800.0, None, utc(2024, 1, 10, 15, 0))
    };
    let routed = route_quote(&sessions, &markets, &future).expect("futures session active");
    assert_eq!(routed.market_key, "GLOBEX");
}

#[test]
fn test_overlapping_same_kind_sessions_route_to_the_first() {
    // Two equity markets open at once is a seeding mistake, but routing must
    // still be deterministic: tracker order decides
    let sessions = vec![
        ActiveSession {
            market_key: "AMEX".to_string(),
            session_no: 3,
        },
        ActiveSession {
            market_key: "NYSE".to_string(),
            session_no: 4,
        },
    ];
    let amex = Market {
        key: "AMEX".to_string(),
        ..crate::common_fixtures::nyse()
    };
    let markets = vec![crate::common_fixtures::nyse(), amex];

    let equity = quote_at("AAPL", 100.0, None, utc(2024, 1, 10, 15, 0));
    let routed = route_quote(&sessions, &markets, &equity).expect("an equity session is active");
    assert_eq!(routed.market_key, "AMEX");
}
