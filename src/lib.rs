//! Marketbeat core: session clock, bar aggregation, rolling stats, and
//! signal grading behind a single-leader heartbeat scheduler.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod grading;
pub mod jobs;
pub mod lock;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod sched;
pub mod stats;
pub mod store;

pub use error::{CoreError, Result};
