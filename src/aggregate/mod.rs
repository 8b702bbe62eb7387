//! Tick-to-bar aggregation and the durable flush worker

pub mod bars;
pub mod flush;

pub use bars::{route_quote, BarAggregator};
pub use flush::{flush_pending, FlushOutcome};
