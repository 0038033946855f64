// src/ingest/mod.rs
//! Fallback-chain fetcher.
//!
//! Tiers are tried in a fixed order, each only after the previous one failed:
//! live upstream → last snapshot → bundled seed. The seed cannot fail, so
//! [`FallbackChain::fetch`] always returns records. Which tier answered is
//! reported through [`FeedStatus`], never through an error.

pub mod config;
pub mod providers;
pub mod scheduler;
pub mod seed;
pub mod snapshot;
pub mod types;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::draw::DrawRecord;
use crate::ingest::seed::{seed_draws, seed_version};
use crate::ingest::snapshot::{
    load_snapshot, save_snapshot, CachedSnapshot, SnapshotStore, DEFAULT_SNAPSHOT_KEY,
};
use crate::ingest::types::DrawSource;
use crate::normalize::normalize_values;

pub const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_secs(8);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("draws_fetch_total", "Fetch requests by serving tier.");
        describe_counter!("draws_tier_failures_total", "Tier failures by tier.");
        describe_counter!("draws_records_kept_total", "Records kept by the normalizer.");
        describe_counter!(
            "draws_records_dropped_total",
            "Malformed records dropped by the normalizer."
        );
        describe_histogram!("draws_fetch_ms", "Live upstream fetch time in milliseconds.");
        describe_gauge!("draws_last_fetch_ts", "Unix ts of the last completed fetch.");
        describe_gauge!("draws_served_stale", "1 when the last fetch served non-live data.");
        describe_counter!("draws_refresh_runs_total", "Background refresh iterations.");
    });
}

/// Where served records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Snapshot,
    Seed,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Snapshot => "snapshot",
            Provenance::Seed => "seed",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a tier did not produce records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierFailure {
    Timeout(Duration),
    Cancelled,
    /// Transport error, non-2xx status or malformed payload.
    Upstream(String),
    /// Payload decoded but every record was rejected.
    EmptyBatch { rejected: usize },
    NoSnapshot,
    EmptySnapshot,
    SnapshotUnreadable(String),
    SnapshotExpired { age_secs: i64 },
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierFailure::Timeout(d) => write!(f, "timed out after {}ms", d.as_millis()),
            TierFailure::Cancelled => f.write_str("cancelled by caller"),
            TierFailure::Upstream(e) => write!(f, "upstream error: {e}"),
            TierFailure::EmptyBatch { rejected } => {
                write!(f, "no valid records ({rejected} rejected)")
            }
            TierFailure::NoSnapshot => f.write_str("no snapshot stored"),
            TierFailure::EmptySnapshot => f.write_str("snapshot has no records"),
            TierFailure::SnapshotUnreadable(e) => write!(f, "snapshot unreadable: {e}"),
            TierFailure::SnapshotExpired { age_secs } => {
                write!(f, "snapshot expired ({age_secs}s old)")
            }
        }
    }
}

/// Side-channel status of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub provenance: Provenance,
    /// True whenever the records did not come from this fetch's live request.
    pub stale: bool,
    /// When the records were captured from upstream; `None` for seed data.
    pub captured_at: Option<DateTime<Utc>>,
    /// Records dropped by the normalizer during the live attempt.
    pub rejected: usize,
    /// `"<tier>: <reason>"` for every tier that failed before the serving one.
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_version: Option<String>,
}

/// Records plus provenance. `records` is newest first and never empty unless
/// the bundled seed itself were empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawFeed {
    pub records: Vec<DrawRecord>,
    pub status: FeedStatus,
}

impl DrawFeed {
    fn new(records: Vec<DrawRecord>, provenance: Provenance, stale: bool) -> Self {
        Self {
            records,
            status: FeedStatus {
                provenance,
                stale,
                captured_at: None,
                rejected: 0,
                failures: Vec::new(),
                seed_version: None,
            },
        }
    }

    fn seed() -> Self {
        let mut feed = Self::new(seed_draws(), Provenance::Seed, true);
        feed.status.seed_version = Some(seed_version().to_string());
        feed
    }
}

/// Live → snapshot → seed.
pub struct FallbackChain {
    source: Arc<dyn DrawSource>,
    store: Arc<dyn SnapshotStore>,
    snapshot_key: String,
    timeout: Duration,
    max_age: Option<chrono::Duration>,
    fresh_window: Option<chrono::Duration>,
}

impl FallbackChain {
    pub fn new(source: Arc<dyn DrawSource>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            source,
            store,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            timeout: DEFAULT_LIVE_TIMEOUT,
            max_age: None,
            fresh_window: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }

    /// Refuse snapshots older than `max_age` at the snapshot tier.
    pub fn with_max_age(mut self, max_age: Option<chrono::Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Serve a snapshot younger than `window` without contacting upstream.
    pub fn with_fresh_window(mut self, window: Option<chrono::Duration>) -> Self {
        self.fresh_window = window;
        self
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    /// Run the chain without an external cancellation signal.
    pub async fn fetch(&self) -> DrawFeed {
        self.fetch_until(std::future::pending::<()>()).await
    }

    /// Run the chain; if `cancel` completes while the live request is in
    /// flight, the live tier fails and the chain moves on to the snapshot.
    pub async fn fetch_until<F>(&self, cancel: F) -> DrawFeed
    where
        F: Future<Output = ()>,
    {
        ensure_metrics_described();
        let now = Utc::now();

        if let Some(feed) = self.fresh_snapshot(now).await {
            return self.finish(feed, now);
        }

        tokio::pin!(cancel);
        let mut failures = Vec::new();
        let mut rejected = 0;

        for tier in [Provenance::Live, Provenance::Snapshot] {
            let attempt = match tier {
                Provenance::Live => self.live(cancel.as_mut(), now).await,
                _ => self.snapshot(now).await,
            };
            match attempt {
                Ok(mut feed) => {
                    feed.status.failures = failures;
                    feed.status.rejected = feed.status.rejected.max(rejected);
                    return self.finish(feed, now);
                }
                Err(failure) => {
                    if let TierFailure::EmptyBatch { rejected: n } = &failure {
                        rejected = *n;
                    }
                    tracing::warn!(
                        target: "ingest",
                        tier = tier.as_str(),
                        source = self.source.name(),
                        reason = %failure,
                        "tier failed, falling through"
                    );
                    counter!("draws_tier_failures_total", "tier" => tier.as_str()).increment(1);
                    failures.push(format!("{tier}: {failure}"));
                }
            }
        }

        let mut feed = DrawFeed::seed();
        feed.status.failures = failures;
        feed.status.rejected = rejected;
        self.finish(feed, now)
    }

    async fn live<F>(&self, cancel: Pin<&mut F>, now: DateTime<Utc>) -> Result<DrawFeed, TierFailure>
    where
        F: Future<Output = ()>,
    {
        let fetched = tokio::select! {
            biased;
            _ = cancel => return Err(TierFailure::Cancelled),
            r = tokio::time::timeout(self.timeout, self.source.fetch_rounds()) => r,
        };
        let items = match fetched {
            Err(_) => return Err(TierFailure::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(TierFailure::Upstream(format!("{e:#}"))),
            Ok(Ok(items)) => items,
        };

        let normalized = normalize_values(items);
        let rejected = normalized.rejected.len();
        if normalized.records.is_empty() {
            return Err(TierFailure::EmptyBatch { rejected });
        }

        let snap = CachedSnapshot::new(normalized.records, now);
        if let Err(e) = save_snapshot(self.store.as_ref(), &self.snapshot_key, &snap).await {
            tracing::warn!(target: "ingest", error = ?e, "snapshot write-back failed");
        }

        let mut feed = DrawFeed::new(snap.records, Provenance::Live, false);
        feed.status.captured_at = Some(now);
        feed.status.rejected = rejected;
        Ok(feed)
    }

    async fn snapshot(&self, now: DateTime<Utc>) -> Result<DrawFeed, TierFailure> {
        let snap = match load_snapshot(self.store.as_ref(), &self.snapshot_key).await {
            Ok(Some(s)) => s,
            Ok(None) => return Err(TierFailure::NoSnapshot),
            Err(e) => return Err(TierFailure::SnapshotUnreadable(format!("{e:#}"))),
        };
        if snap.records.is_empty() {
            return Err(TierFailure::EmptySnapshot);
        }
        if let Some(max_age) = self.max_age {
            let age = snap.age(now);
            if age > max_age {
                return Err(TierFailure::SnapshotExpired {
                    age_secs: age.num_seconds(),
                });
            }
        }
        let mut feed = DrawFeed::new(snap.records, Provenance::Snapshot, true);
        feed.status.captured_at = Some(snap.captured_at);
        Ok(feed)
    }

    async fn fresh_snapshot(&self, now: DateTime<Utc>) -> Option<DrawFeed> {
        let window = self.fresh_window?;
        match load_snapshot(self.store.as_ref(), &self.snapshot_key).await {
            Ok(Some(snap)) if !snap.records.is_empty() && snap.age(now) <= window => {
                let mut feed = DrawFeed::new(snap.records, Provenance::Snapshot, false);
                feed.status.captured_at = Some(snap.captured_at);
                Some(feed)
            }
            _ => None,
        }
    }

    fn finish(&self, feed: DrawFeed, now: DateTime<Utc>) -> DrawFeed {
        let provenance = feed.status.provenance;
        counter!("draws_fetch_total", "tier" => provenance.as_str()).increment(1);
        gauge!("draws_last_fetch_ts").set(now.timestamp() as f64);
        gauge!("draws_served_stale").set(if feed.status.stale { 1.0 } else { 0.0 });

        if feed.status.stale {
            tracing::warn!(
                target: "ingest",
                provenance = provenance.as_str(),
                records = feed.records.len(),
                failures = feed.status.failures.len(),
                "serving fallback draw data"
            );
        } else {
            tracing::info!(
                target: "ingest",
                provenance = provenance.as_str(),
                records = feed.records.len(),
                rejected = feed.status.rejected,
                "draw feed refreshed"
            );
        }
        feed
    }
}
