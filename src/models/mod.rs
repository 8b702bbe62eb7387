//! Domain entities shared across the pipeline

pub mod bar;
pub mod market;
pub mod quote;
pub mod session;
pub mod stats;

pub use bar::{MinuteBar, PendingBar};
pub use market::{Market, MarketStatus, SessionState};
pub use quote::{AssetKind, Quote};
pub use session::{HitKind, Outcome, SessionInstance, SignalKind, SymbolSessionRow};
pub use stats::{DailyRange, Extremes52w, Rolling24h, VwapSample};
