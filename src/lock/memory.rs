//! In-memory lock store for tests

use crate::error::Result;
use crate::lock::LockStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryLockStore {
    markers: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate another process stealing the marker
    pub fn steal(&self, key: &str, new_owner: &str) {
        self.markers.lock().expect("lock map poisoned").insert(
            key.to_string(),
            (
                new_owner.to_string(),
                Instant::now() + Duration::from_secs(60),
            ),
        );
    }

    /// Drop the marker entirely, as an expiry would
    pub fn expire(&self, key: &str) {
        self.markers.lock().expect("lock map poisoned").remove(key);
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_nx_px(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let mut markers = self.markers.lock().expect("lock map poisoned");
        let now = Instant::now();
        match markers.get(key) {
            Some((_, expiry)) if *expiry > now => Ok(false),
            _ => {
                markers.insert(
                    key.to_string(),
                    (owner.to_string(), now + Duration::from_millis(ttl_ms)),
                );
                Ok(true)
            }
        }
    }

    async fn pexpire_if_owner(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let mut markers = self.markers.lock().expect("lock map poisoned");
        let now = Instant::now();
        match markers.get_mut(key) {
            Some((held_by, expiry)) if held_by == owner && *expiry > now => {
                *expiry = now + Duration::from_millis(ttl_ms);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del_if_owner(&self, key: &str, owner: &str) -> Result<bool> {
        let mut markers = self.markers.lock().expect("lock map poisoned");
        match markers.get(key) {
            Some((held_by, _)) if held_by == owner => {
                markers.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
