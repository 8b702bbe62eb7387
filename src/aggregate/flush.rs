//! Flush worker: drains the pending queue into the durable store

use crate::error::Result;
use crate::models::{MinuteBar, PendingBar, Rolling24h};
use crate::queue::BarQueue;
use crate::store::Store;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What one flush invocation accomplished
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub recovered: usize,
    pub persisted: usize,
    pub deferred: usize,
    pub batches: usize,
}

/// Drain the pending queue in bounded batches
///
/// Recovery of abandoned in-flight items always runs first. Bars whose
/// session linkage cannot be resolved yet are returned to pending rather than
/// dropped; a store failure returns the batch and stops. The batch ceiling
/// bounds the worst-case latency of a single call.
pub async fn flush_pending(
    store: &dyn Store,
    queue: &dyn BarQueue,
    batch_size: usize,
    max_batches: usize,
) -> Result<FlushOutcome> {
    let mut outcome = FlushOutcome {
        recovered: queue.recover_abandoned().await?,
        ..Default::default()
    };
    if outcome.recovered > 0 {
        info!(
            recovered = outcome.recovered,
            "Flush: recovered abandoned in-flight bars"
        );
    }

    let mut session_cache: HashMap<String, Option<i64>> = HashMap::new();

    for _ in 0..max_batches {
        let items = queue.checkout(batch_size).await?;
        if items.is_empty() {
            break;
        }
        outcome.batches += 1;

        let mut resolved: Vec<(PendingBar, i64)> = Vec::with_capacity(items.len());
        let mut deferred: Vec<PendingBar> = Vec::new();
        for bar in items {
            let session_no = match session_cache.get(&bar.market_key) {
                Some(cached) => *cached,
                None => {
                    let looked_up = store.current_session(&bar.market_key).await?;
                    session_cache.insert(bar.market_key.clone(), looked_up);
                    looked_up
                }
            };
            match session_no {
                Some(session_no) => resolved.push((bar, session_no)),
                None => deferred.push(bar),
            }
        }

        let mut persisted: Vec<PendingBar> = Vec::with_capacity(resolved.len());
        let mut failed: Vec<PendingBar> = Vec::new();
        let mut remaining = resolved.into_iter();
        while let Some((bar, session_no)) = remaining.next() {
            if let Err(e) = persist_bar(store, &bar, session_no).await {
                warn!(
                    symbol = %bar.symbol,
                    market = %bar.market_key,
                    error = %e,
                    "Flush: failed to persist bar, returning batch to pending"
                );
                failed.push(bar);
                failed.extend(remaining.map(|(b, _)| b));
                break;
            }
            persisted.push(bar);
        }

        queue.acknowledge(&persisted).await?;
        outcome.persisted += persisted.len();

        if !deferred.is_empty() || !failed.is_empty() {
            debug!(
                deferred = deferred.len(),
                failed = failed.len(),
                "Flush: deferring bars to a later pass"
            );
            outcome.deferred += deferred.len();
            deferred.extend(failed);
            queue.return_to_pending(&deferred).await?;
            break;
        }
    }

    Ok(outcome)
}

async fn persist_bar(store: &dyn Store, bar: &PendingBar, session_no: i64) -> Result<()> {
    // The owning 24h record must exist before the bar references the session
    if store.get_rolling_24h(session_no, &bar.symbol).await?.is_none() {
        store
            .upsert_rolling_24h(&Rolling24h::seed(session_no, &bar.symbol, bar.open))
            .await?;
    }
    store
        .upsert_minute_bar(&MinuteBar::from_pending(bar, session_no))
        .await
}
