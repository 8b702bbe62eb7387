//! Distributed leader lock over a shared fast store
//!
//! At most one worker process runs the heartbeat at a time. Ownership is an
//! explicit `LockHandle` value; renew and release are bound to the handle, so
//! there is no hidden thread affinity.

pub mod memory;
pub mod redis;

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use memory::MemoryLockStore;
pub use redis::RedisLockStore;

/// Atomic primitives the lock needs from the shared store
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set the marker if absent, with an expiry; true if this call took it
    async fn set_nx_px(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool>;

    /// Extend the expiry only if the marker still belongs to `owner`
    async fn pexpire_if_owner(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool>;

    /// Delete the marker only if it still belongs to `owner`
    async fn del_if_owner(&self, key: &str, owner: &str) -> Result<bool>;
}

/// Factory for acquiring leadership
pub struct LeaderLock {
    store: Arc<dyn LockStore>,
    key: String,
    ttl: Duration,
}

impl LeaderLock {
    pub fn new(store: Arc<dyn LockStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    /// Attempt to become leader
    ///
    /// Non-blocking mode returns after a single attempt; blocking mode retries
    /// until `timeout` elapses. `None` means some other process holds the lock.
    pub async fn acquire(&self, blocking: bool, timeout: Duration) -> Result<Option<LockHandle>> {
        let owner = owner_token();
        let deadline = Instant::now() + timeout;
        loop {
            let taken = self
                .store
                .set_nx_px(&self.key, &owner, self.ttl.as_millis() as u64)
                .await?;
            if taken {
                info!(key = %self.key, owner = %owner, "Leader lock acquired");
                return Ok(Some(LockHandle {
                    store: self.store.clone(),
                    key: self.key.clone(),
                    owner,
                    ttl: self.ttl,
                    last_renewed: Instant::now(),
                }));
            }
            if !blocking || Instant::now() >= deadline {
                debug!(key = %self.key, "Leader lock held elsewhere");
                return Ok(None);
            }
            tokio::time::sleep(self.ttl / 4).await;
        }
    }
}

/// Proof of leadership; renew/release act only on this owner's marker
pub struct LockHandle {
    store: Arc<dyn LockStore>,
    key: String,
    owner: String,
    ttl: Duration,
    last_renewed: Instant,
}

impl LockHandle {
    /// Whether enough of the TTL has elapsed that a renewal is due
    pub fn renewal_due(&self) -> bool {
        self.last_renewed.elapsed() >= self.ttl / 2
    }

    /// Extend the marker's expiry
    ///
    /// A failed renewal means the marker expired or was taken by another
    /// process; the caller must stop all scheduling work immediately.
    pub async fn renew(&mut self) -> Result<()> {
        let extended = self
            .store
            .pexpire_if_owner(&self.key, &self.owner, self.ttl.as_millis() as u64)
            .await?;
        if !extended {
            warn!(key = %self.key, owner = %self.owner, "Leader lock renewal failed");
            return Err(CoreError::LeadershipLost(format!(
                "lock {} no longer owned by {}",
                self.key, self.owner
            )));
        }
        self.last_renewed = Instant::now();
        Ok(())
    }

    /// Best-effort removal; a marker already gone is not an error
    pub async fn release(self) {
        match self.store.del_if_owner(&self.key, &self.owner).await {
            Ok(true) => info!(key = %self.key, "Leader lock released"),
            Ok(false) => debug!(key = %self.key, "Leader lock already gone at release"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to release leader lock"),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn owner_token() -> String {
    format!(
        "{}-{}-{:08x}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}
