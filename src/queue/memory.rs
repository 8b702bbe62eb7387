//! In-memory bar queue for tests

use crate::error::Result;
use crate::models::PendingBar;
use crate::queue::BarQueue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingBar>,
    inflight: Vec<PendingBar>,
}

#[derive(Default)]
pub struct MemoryBarQueue {
    state: Mutex<QueueState>,
}

impl MemoryBarQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inflight_len(&self) -> usize {
        self.state.lock().expect("queue poisoned").inflight.len()
    }
}

#[async_trait]
impl BarQueue for MemoryBarQueue {
    async fn enqueue(&self, bar: &PendingBar) -> Result<()> {
        self.state
            .lock()
            .expect("queue poisoned")
            .pending
            .push_back(bar.clone());
        Ok(())
    }

    async fn checkout(&self, n: usize) -> Result<Vec<PendingBar>> {
        let mut state = self.state.lock().expect("queue poisoned");
        let mut bars = Vec::with_capacity(n);
        for _ in 0..n {
            match state.pending.pop_front() {
                Some(bar) => {
                    state.inflight.push(bar.clone());
                    bars.push(bar);
                }
                None => break,
            }
        }
        Ok(bars)
    }

    async fn acknowledge(&self, bars: &[PendingBar]) -> Result<()> {
        let mut state = self.state.lock().expect("queue poisoned");
        for bar in bars {
            if let Some(pos) = state.inflight.iter().position(|b| b == bar) {
                state.inflight.remove(pos);
            }
        }
        Ok(())
    }

    async fn return_to_pending(&self, bars: &[PendingBar]) -> Result<()> {
        let mut state = self.state.lock().expect("queue poisoned");
        for bar in bars.iter().rev() {
            if let Some(pos) = state.inflight.iter().position(|b| b == bar) {
                state.inflight.remove(pos);
            }
            state.pending.push_front(bar.clone());
        }
        Ok(())
    }

    async fn recover_abandoned(&self) -> Result<usize> {
        let mut state = self.state.lock().expect("queue poisoned");
        let abandoned: Vec<PendingBar> = state.inflight.drain(..).collect();
        let count = abandoned.len();
        for bar in abandoned {
            state.pending.push_back(bar);
        }
        Ok(count)
    }

    async fn pending_len(&self) -> Result<usize> {
        Ok(self.state.lock().expect("queue poisoned").pending.len())
    }
}
