//! Durable pending/in-flight queue for closed minute bars
//!
//! At-least-once discipline: a checked-out bar lives in the in-flight marker
//! until acknowledged; crash recovery moves abandoned in-flight items back to
//! pending before new work begins. Consumers must be idempotent.

pub mod memory;
pub mod redis;

use crate::error::Result;
use crate::models::PendingBar;
use async_trait::async_trait;

pub use memory::MemoryBarQueue;
pub use redis::RedisBarQueue;

#[async_trait]
pub trait BarQueue: Send + Sync {
    /// Append a closed bar to the pending queue
    async fn enqueue(&self, bar: &PendingBar) -> Result<()>;

    /// Atomically move up to `n` bars from pending into the in-flight marker
    async fn checkout(&self, n: usize) -> Result<Vec<PendingBar>>;

    /// Remove successfully persisted bars from the in-flight marker
    async fn acknowledge(&self, bars: &[PendingBar]) -> Result<()>;

    /// Put checked-out bars back at the front of pending
    async fn return_to_pending(&self, bars: &[PendingBar]) -> Result<()>;

    /// Move everything left in-flight (from a previous crash) back to pending
    async fn recover_abandoned(&self) -> Result<usize>;

    async fn pending_len(&self) -> Result<usize>;
}
