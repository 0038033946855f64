// src/ingest/types.rs
use anyhow::Result;

/// Upstream source of raw round items (one JSON value per round).
///
/// Implementations return `Err` for every live-tier failure: transport errors,
/// non-2xx statuses and payloads without the expected top-level array.
#[async_trait::async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch_rounds(&self) -> Result<Vec<serde_json::Value>>;
    fn name(&self) -> &'static str;
}
