// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::DrawFeed;
use crate::service::DrawService;

pub type FeedReceiver = watch::Receiver<Option<Arc<DrawFeed>>>;

/// Spawn a background task that refreshes the feed every `interval` (first
/// run immediately) and publishes each result. The task stops once every
/// receiver is dropped; a fetch in flight at that moment abandons its live
/// request.
pub fn spawn_refresh_task(service: Arc<DrawService>, interval: Duration) -> (JoinHandle<()>, FeedReceiver) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }

            let feed = service.get_draws_until(tx.closed()).await;
            counter!("draws_refresh_runs_total").increment(1);
            tracing::info!(
                target: "ingest",
                provenance = feed.status.provenance.as_str(),
                records = feed.records.len(),
                stale = feed.status.stale,
                "scheduled refresh"
            );

            if tx.send(Some(Arc::new(feed))).is_err() {
                break;
            }
        }
        tracing::debug!(target: "ingest", "refresh task stopped");
    });
    (handle, rx)
}
