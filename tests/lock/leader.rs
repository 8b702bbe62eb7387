//! Unit tests for the distributed leader lock

use marketbeat::lock::{LeaderLock, MemoryLockStore};
use marketbeat::sched::is_leadership_loss;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "test:leader";

#[tokio::test]
async fn test_acquire_is_exclusive() {
    let store = Arc::new(MemoryLockStore::new());
    let first = LeaderLock::new(store.clone(), KEY, Duration::from_secs(30));
    let second = LeaderLock::new(store, KEY, Duration::from_secs(30));

    let handle = first
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");
    let contender = second
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable");
    assert!(contender.is_none());

    handle.release().await;
    let reacquired = second
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable");
    assert!(reacquired.is_some());
}

#[tokio::test]
async fn test_renew_extends_while_owned() {
    let store = Arc::new(MemoryLockStore::new());
    let lock = LeaderLock::new(store, KEY, Duration::from_secs(30));
    let mut handle = lock
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");
    assert!(!handle.renewal_due());
    handle.renew().await.expect("still the owner");
}

#[tokio::test]
async fn test_renew_fails_when_marker_is_stolen() {
    let store = Arc::new(MemoryLockStore::new());
    let lock = LeaderLock::new(store.clone(), KEY, Duration::from_secs(30));
    let mut handle = lock
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");

    store.steal(KEY, "some-other-process");
    let err = handle.renew().await.expect_err("ownership gone");
    assert!(is_leadership_loss(&err));
}

#[tokio::test]
async fn test_renew_fails_after_expiry() {
    let store = Arc::new(MemoryLockStore::new());
    let lock = LeaderLock::new(store.clone(), KEY, Duration::from_secs(30));
    let mut handle = lock
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");

    store.expire(KEY);
    assert!(handle.renew().await.is_err());
}

#[tokio::test]
async fn test_release_of_stolen_marker_leaves_it_alone() {
    let store = Arc::new(MemoryLockStore::new());
    let lock = LeaderLock::new(store.clone(), KEY, Duration::from_secs(30));
    let handle = lock
        .acquire(false, Duration::ZERO)
        .await
        .expect("store reachable")
        .expect("lock free");

    store.steal(KEY, "some-other-process");
    handle.release().await;

    // The thief still holds the key, so a fresh acquire fails
    let contender = lock.acquire(false, Duration::ZERO).await.expect("store reachable");
    assert!(contender.is_none());
}
