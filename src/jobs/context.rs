//! Job context for dependency injection

use crate::cache::{QuoteSource, SharedState};
use crate::clock::ClockWindows;
use crate::config::WorkerConfig;
use crate::events::EventBus;
use crate::metrics::Metrics;
use crate::queue::BarQueue;
use crate::store::Store;
use std::sync::Arc;

/// Everything a job may touch, passed explicitly into each invocation
///
/// There is no process-global state: the context is built once at leadership
/// acquisition and dropped when the heartbeat stops.
pub struct JobContext {
    pub quotes: Arc<dyn QuoteSource>,
    pub shared: Arc<dyn SharedState>,
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn BarQueue>,
    pub events: EventBus,
    pub metrics: Option<Arc<Metrics>>,
    pub config: WorkerConfig,
    pub windows: ClockWindows,
}

impl JobContext {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        shared: Arc<dyn SharedState>,
        store: Arc<dyn Store>,
        queue: Arc<dyn BarQueue>,
        events: EventBus,
        metrics: Option<Arc<Metrics>>,
        config: WorkerConfig,
    ) -> Self {
        let windows = ClockWindows::from_config(&config);
        Self {
            quotes,
            shared,
            store,
            queue,
            events,
            metrics,
            config,
            windows,
        }
    }
}
