//! Scheduler job implementations

pub mod bars;
pub mod clock;
pub mod context;
pub mod grading;
pub mod stats;

pub use bars::{BarAggregatorJob, BarFlushJob};
pub use clock::ClockReconcileJob;
pub use context::JobContext;
pub use grading::GradingJob;
pub use stats::{ExtremesRecomputeJob, Extremes52wJob, Rolling24hJob, VwapSnapshotJob};
