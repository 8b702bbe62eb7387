//! Unit tests for market status reconciliation

use crate::common_fixtures::{graded_row, nyse, utc};
use marketbeat::cache::{MemorySharedState, SharedState};
use marketbeat::clock::{reconcile_markets, ClockWindows};
use marketbeat::events::{EventBus, MarketEvent};
use marketbeat::models::{HitKind, Outcome, SignalKind};
use marketbeat::store::{MemoryStore, Store};

#[tokio::test]
async fn test_open_transition_happens_exactly_once() {
    let store = MemoryStore::new();
    store.seed_market(nyse());
    let shared = MemorySharedState::new();
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let windows = ClockWindows::default();
    let during = utc(2024, 1, 10, 15, 0);

    let first = reconcile_markets(&store, &shared, &events, &windows, during)
        .await
        .expect("reconcile should succeed");
    assert_eq!(first, 1);
    assert_eq!(
        shared.active_sessions().await.expect("tracker readable").len(),
        1
    );
    match rx.try_recv().expect("event emitted") {
        MarketEvent::MarketOpened { market, session_no, .. } => {
            assert_eq!(market, "NYSE");
            assert_eq!(session_no, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Same instant again: status already matches, nothing happens
    let second = reconcile_markets(&store, &shared, &events, &windows, during)
        .await
        .expect("reconcile should succeed");
    assert_eq!(second, 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(store.current_session("NYSE").await.expect("readable"), Some(1));
}

#[tokio::test]
async fn test_close_transition_finalizes_once_and_keeps_frozen_outcomes() {
    let store = MemoryStore::new();
    store.seed_market(nyse());
    let shared = MemorySharedState::new();
    let events = EventBus::default();
    let windows = ClockWindows::default();

    reconcile_markets(&store, &shared, &events, &windows, utc(2024, 1, 10, 15, 0))
        .await
        .expect("open pass");
    let session_no = store
        .current_session("NYSE")
        .await
        .expect("readable")
        .expect("session created");

    // One row frozen at 110 during the session, one still pending
    store
        .upsert_session_row(&graded_row(session_no, "AAPL", SignalKind::Buy))
        .await
        .expect("row seeded");
    store
        .upsert_session_row(&graded_row(session_no, "MSFT", SignalKind::Buy))
        .await
        .expect("row seeded");
    let won = store
        .freeze_outcome(
            session_no,
            "AAPL",
            Outcome::Worked,
            HitKind::Target,
            110.0,
            utc(2024, 1, 10, 18, 0),
        )
        .await
        .expect("freeze writable");
    assert!(won);

    // 16:30 Eastern: the market has closed
    let transitions =
        reconcile_markets(&store, &shared, &events, &windows, utc(2024, 1, 10, 21, 30))
            .await
            .expect("close pass");
    assert_eq!(transitions, 1);
    assert!(shared.active_sessions().await.expect("readable").is_empty());

    let frozen = store.get_row(session_no, "AAPL").expect("row exists");
    assert_eq!(frozen.outcome, Outcome::Worked);
    assert_eq!(frozen.hit_price, Some(110.0));
    let neutral = store.get_row(session_no, "MSFT").expect("row exists");
    assert_eq!(neutral.outcome, Outcome::Neutral);
    assert!(neutral.hit_at.is_none());

    // A second close pass at a later closed instant changes nothing
    let again =
        reconcile_markets(&store, &shared, &events, &windows, utc(2024, 1, 10, 22, 30))
            .await
            .expect("idle pass");
    assert_eq!(again, 0);
    assert_eq!(
        store.get_row(session_no, "MSFT").expect("row exists").outcome,
        Outcome::Neutral
    );
}

#[tokio::test]
async fn test_unparseable_timezone_skips_market_without_blocking_others() {
    let store = MemoryStore::new();
    let mut broken = nyse();
    broken.key = "BROKEN".to_string();
    broken.timezone = "Not/AZone".to_string();
    store.seed_market(broken);
    store.seed_market(nyse());
    let shared = MemorySharedState::new();
    let events = EventBus::default();

    let transitions = reconcile_markets(
        &store,
        &shared,
        &events,
        &ClockWindows::default(),
        utc(2024, 1, 10, 15, 0),
    )
    .await
    .expect("reconcile should succeed despite the broken market");
    assert_eq!(transitions, 1);
    assert_eq!(store.current_session("NYSE").await.expect("readable"), Some(1));
    assert_eq!(store.current_session("BROKEN").await.expect("readable"), None);
}
