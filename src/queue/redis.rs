//! Redis list implementation of the bar queue

use crate::error::Result;
use crate::models::PendingBar;
use crate::queue::BarQueue;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const PENDING_KEY: &str = "bars:pending";
const INFLIGHT_KEY: &str = "bars:inflight";

/// Pending and in-flight lists; LMOVE keeps the handoff atomic
#[derive(Clone)]
pub struct RedisBarQueue {
    conn: ConnectionManager,
}

impl RedisBarQueue {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn lmove(&self, src: &str, dst: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let moved: Option<String> = redis::cmd("LMOVE")
            .arg(src)
            .arg(dst)
            .arg("LEFT")
            .arg("RIGHT")
            .query_async(&mut conn)
            .await?;
        Ok(moved)
    }
}

#[async_trait]
impl BarQueue for RedisBarQueue {
    async fn enqueue(&self, bar: &PendingBar) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(bar)?;
        let _: () = conn.rpush(PENDING_KEY, payload).await?;
        Ok(())
    }

    async fn checkout(&self, n: usize) -> Result<Vec<PendingBar>> {
        let mut bars = Vec::with_capacity(n);
        for _ in 0..n {
            match self.lmove(PENDING_KEY, INFLIGHT_KEY).await? {
                Some(payload) => bars.push(serde_json::from_str(&payload)?),
                None => break,
            }
        }
        Ok(bars)
    }

    async fn acknowledge(&self, bars: &[PendingBar]) -> Result<()> {
        let mut conn = self.conn.clone();
        for bar in bars {
            let payload = serde_json::to_string(bar)?;
            let _: () = conn.lrem(INFLIGHT_KEY, 1, payload).await?;
        }
        Ok(())
    }

    async fn return_to_pending(&self, bars: &[PendingBar]) -> Result<()> {
        let mut conn = self.conn.clone();
        // Front of pending so deferred bars are retried first
        for bar in bars.iter().rev() {
            let payload = serde_json::to_string(bar)?;
            let _: () = conn.lrem(INFLIGHT_KEY, 1, payload.clone()).await?;
            let _: () = conn.lpush(PENDING_KEY, payload).await?;
        }
        Ok(())
    }

    async fn recover_abandoned(&self) -> Result<usize> {
        let mut recovered = 0;
        while self.lmove(INFLIGHT_KEY, PENDING_KEY).await?.is_some() {
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn pending_len(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(PENDING_KEY).await?;
        Ok(len)
    }
}
