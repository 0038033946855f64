// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod classify;
pub mod draw;
pub mod forecast;
pub mod normalize;
pub mod sanitize;
pub mod stats;

// Fallback chain, upstream provider, snapshot storage, seed and scheduler
pub mod ingest;
pub mod service;

// ---- Re-exports for stable public API ----
pub use crate::draw::{DrawRecord, ProgramType};
pub use crate::forecast::{forecast, forecast_at, ForecastResult, PredictedRange, TrendSignal};
pub use crate::ingest::{DrawFeed, FallbackChain, FeedStatus, Provenance, TierFailure};
pub use crate::normalize::{normalize, RawRecord};
pub use crate::service::DrawService;
pub use crate::stats::{summarize, DrawQuery, DrawStatistics};
