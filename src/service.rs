// src/service.rs
//! Consumer-facing facade: records with provenance, and forecasts over them.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::draw::DrawRecord;
use crate::forecast::{forecast, ForecastResult};
use crate::ingest::config::FeedConfig;
use crate::ingest::providers::ircc_json::IrccJsonProvider;
use crate::ingest::snapshot::FileStore;
use crate::ingest::{DrawFeed, FallbackChain};
use crate::stats::DrawQuery;

pub struct DrawService {
    chain: FallbackChain,
}

impl DrawService {
    pub fn new(chain: FallbackChain) -> Self {
        Self { chain }
    }

    /// Live HTTP source with a file-backed snapshot under `snapshot_dir`.
    pub fn from_config(cfg: &FeedConfig) -> Result<Self> {
        let source = IrccJsonProvider::from_url(&cfg.url, cfg.timeout(), &cfg.user_agent)
            .context("building draw source")?;
        let store = FileStore::new(cfg.snapshot_dir.clone());
        let chain = FallbackChain::new(Arc::new(source), Arc::new(store))
            .with_timeout(cfg.timeout())
            .with_snapshot_key(cfg.snapshot_key.clone())
            .with_max_age(cfg.snapshot_max_age())
            .with_fresh_window(cfg.fresh_window());
        Ok(Self::new(chain))
    }

    /// Never fails; degraded answers are flagged in `status`.
    pub async fn get_draws(&self) -> DrawFeed {
        self.chain.fetch().await
    }

    /// Like [`get_draws`](Self::get_draws), abandoning the live request once
    /// `cancel` completes.
    pub async fn get_draws_until<F>(&self, cancel: F) -> DrawFeed
    where
        F: Future<Output = ()>,
    {
        self.chain.fetch_until(cancel).await
    }

    pub fn get_forecast(&self, series: &[DrawRecord]) -> ForecastResult {
        forecast(series)
    }

    /// Forecast one filtered stream of the series (e.g. a single program).
    pub fn get_forecast_for(&self, series: &[DrawRecord], query: &DrawQuery) -> ForecastResult {
        forecast(&query.apply(series))
    }

    /// Drop the stored snapshot so the next failure falls through to the seed.
    pub async fn clear_snapshot(&self) -> Result<()> {
        self.chain
            .store()
            .clear(self.chain.snapshot_key())
            .await
    }
}
