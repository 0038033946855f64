// tests/fallback_chain.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use maple_metrics::ingest::seed::{seed_draws, seed_version};
use maple_metrics::ingest::snapshot::{
    load_snapshot, save_snapshot, CachedSnapshot, MemoryStore, SnapshotStore, DEFAULT_SNAPSHOT_KEY,
};
use maple_metrics::ingest::types::DrawSource;
use maple_metrics::{FallbackChain, Provenance};
use serde_json::{json, Value};

enum Behavior {
    Rounds(Vec<Value>),
    Fail(&'static str),
    Hang,
}

struct Scripted {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DrawSource for Scripted {
    async fn fetch_rounds(&self) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Rounds(v) => Ok(v.clone()),
            Behavior::Fail(msg) => Err(anyhow!(*msg)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Store whose writes always fail.
struct ReadOnlyStore;

#[async_trait]
impl SnapshotStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(anyhow!("disk full"))
    }
    async fn clear(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

fn rounds() -> Vec<Value> {
    vec![
        json!({ "drawNumber": "298", "drawDate": "2024-05-31", "drawName": "Canadian Experience Class", "drawSize": "3,000", "drawCRS": "522" }),
        json!({ "drawNumber": "297", "drawDate": "2024-05-30", "drawName": "Provincial Nominee Program", "drawSize": "2,985", "drawCRS": "676" }),
        json!({ "drawNumber": "296", "drawDate": "2024-05-15", "drawName": "No Program Specified", "drawSize": "2,000", "drawCRS": "530" }),
        json!({ "drawNumber": "295", "drawDate": "garbage", "drawCRS": "530" }),
    ]
}

fn chain(source: Arc<Scripted>, store: Arc<MemoryStore>) -> FallbackChain {
    FallbackChain::new(source, store).with_timeout(Duration::from_millis(100))
}

#[tokio::test]
async fn live_success_is_served_fresh_and_written_back() {
    let store = Arc::new(MemoryStore::new());
    let source = Scripted::new(Behavior::Rounds(rounds()));
    let feed = chain(source.clone(), store.clone()).fetch().await;

    assert_eq!(feed.status.provenance, Provenance::Live);
    assert!(!feed.status.stale);
    assert!(feed.status.failures.is_empty());
    assert_eq!(feed.status.rejected, 1);
    assert_eq!(feed.records.len(), 3);
    assert_eq!(source.calls(), 1);

    let snap = load_snapshot(store.as_ref(), DEFAULT_SNAPSHOT_KEY)
        .await
        .unwrap()
        .expect("snapshot written");
    assert_eq!(snap.records, feed.records);
    assert_eq!(Some(snap.captured_at), feed.status.captured_at);
}

#[tokio::test]
async fn timeout_serves_the_exact_previous_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let first = chain(Scripted::new(Behavior::Rounds(rounds())), store.clone())
        .fetch()
        .await;
    assert_eq!(first.status.provenance, Provenance::Live);

    let started = Instant::now();
    let second = chain(Scripted::new(Behavior::Hang), store.clone()).fetch().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(second.status.provenance, Provenance::Snapshot);
    assert!(second.status.stale);
    assert_eq!(second.records, first.records);
    assert_eq!(second.status.captured_at, first.status.captured_at);
    assert_eq!(second.status.failures.len(), 1);
    assert!(second.status.failures[0].starts_with("live: timed out"));
}

#[tokio::test]
async fn upstream_error_without_snapshot_falls_to_seed() {
    let store = Arc::new(MemoryStore::new());
    let feed = chain(Scripted::new(Behavior::Fail("HTTP 503")), store)
        .fetch()
        .await;

    assert_eq!(feed.status.provenance, Provenance::Seed);
    assert!(feed.status.stale);
    assert_eq!(feed.records, seed_draws());
    assert!(!feed.records.is_empty());
    assert_eq!(feed.status.seed_version.as_deref(), Some(seed_version()));
    assert_eq!(feed.status.captured_at, None);
    assert_eq!(feed.status.failures.len(), 2);
    assert!(feed.status.failures[0].contains("HTTP 503"));
    assert_eq!(feed.status.failures[1], "snapshot: no snapshot stored");
}

#[tokio::test]
async fn all_malformed_batch_keeps_the_old_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let first = chain(Scripted::new(Behavior::Rounds(rounds())), store.clone())
        .fetch()
        .await;

    let junk = vec![json!({ "drawNumber": "1" }), json!(42)];
    let second = chain(Scripted::new(Behavior::Rounds(junk)), store.clone())
        .fetch()
        .await;

    assert_eq!(second.status.provenance, Provenance::Snapshot);
    assert_eq!(second.status.rejected, 2);
    assert_eq!(second.records, first.records);
    assert!(second.status.failures[0].contains("no valid records"));

    let snap = load_snapshot(store.as_ref(), DEFAULT_SNAPSHOT_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.records, first.records);
}

#[tokio::test]
async fn empty_rounds_array_falls_through() {
    let store = Arc::new(MemoryStore::new());
    let feed = chain(Scripted::new(Behavior::Rounds(Vec::new())), store)
        .fetch()
        .await;
    assert_eq!(feed.status.provenance, Provenance::Seed);
}

#[tokio::test]
async fn cancellation_abandons_live_and_falls_through() {
    let store = Arc::new(MemoryStore::new());
    let chain = FallbackChain::new(Scripted::new(Behavior::Hang), store)
        .with_timeout(Duration::from_secs(30));

    let started = Instant::now();
    let feed = chain
        .fetch_until(tokio::time::sleep(Duration::from_millis(20)))
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(feed.status.provenance, Provenance::Seed);
    assert_eq!(feed.status.failures[0], "live: cancelled by caller");
}

#[tokio::test]
async fn already_cancelled_never_polls_the_source() {
    let source = Scripted::new(Behavior::Rounds(rounds()));
    let chain = FallbackChain::new(source.clone(), Arc::new(MemoryStore::new()));
    let feed = chain.fetch_until(async {}).await;
    assert_eq!(source.calls(), 0);
    assert_eq!(feed.status.provenance, Provenance::Seed);
}

#[tokio::test]
async fn expired_snapshot_is_refused() {
    let store = Arc::new(MemoryStore::new());
    let old = CachedSnapshot::new(seed_draws()[..3].to_vec(), Utc::now() - chrono::Duration::days(3));
    save_snapshot(store.as_ref(), DEFAULT_SNAPSHOT_KEY, &old)
        .await
        .unwrap();

    let strict = chain(Scripted::new(Behavior::Fail("down")), store.clone())
        .with_max_age(Some(chrono::Duration::days(1)));
    let feed = strict.fetch().await;
    assert_eq!(feed.status.provenance, Provenance::Seed);
    assert!(feed.status.failures[1].starts_with("snapshot: snapshot expired"));

    let lenient = chain(Scripted::new(Behavior::Fail("down")), store);
    let feed = lenient.fetch().await;
    assert_eq!(feed.status.provenance, Provenance::Snapshot);
    assert_eq!(feed.records, old.records);
}

#[tokio::test]
async fn corrupted_snapshot_counts_as_absent() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(DEFAULT_SNAPSHOT_KEY, "{\"version\":1,\"checksum\":\"x\"".to_string())
        .await
        .unwrap();
    let feed = chain(Scripted::new(Behavior::Fail("down")), store)
        .fetch()
        .await;
    assert_eq!(feed.status.provenance, Provenance::Seed);
    assert!(feed.status.failures[1].starts_with("snapshot: snapshot unreadable"));
}

#[tokio::test]
async fn fresh_snapshot_skips_the_request() {
    let store = Arc::new(MemoryStore::new());
    let recent = CachedSnapshot::new(
        seed_draws()[..5].to_vec(),
        Utc::now() - chrono::Duration::minutes(10),
    );
    save_snapshot(store.as_ref(), DEFAULT_SNAPSHOT_KEY, &recent)
        .await
        .unwrap();

    let source = Scripted::new(Behavior::Rounds(rounds()));
    let feed = chain(source.clone(), store.clone())
        .with_fresh_window(Some(chrono::Duration::hours(1)))
        .fetch()
        .await;
    assert_eq!(source.calls(), 0);
    assert_eq!(feed.status.provenance, Provenance::Snapshot);
    assert!(!feed.status.stale);
    assert_eq!(feed.records, recent.records);

    // outside the window the live tier runs
    let feed = chain(source.clone(), store)
        .with_fresh_window(Some(chrono::Duration::minutes(5)))
        .fetch()
        .await;
    assert_eq!(source.calls(), 1);
    assert_eq!(feed.status.provenance, Provenance::Live);
}

#[tokio::test]
async fn failed_write_back_still_serves_live() {
    let feed = FallbackChain::new(Scripted::new(Behavior::Rounds(rounds())), Arc::new(ReadOnlyStore))
        .fetch()
        .await;
    assert_eq!(feed.status.provenance, Provenance::Live);
    assert_eq!(feed.records.len(), 3);
}

#[tokio::test]
async fn custom_snapshot_key_isolates_feeds() {
    let store = Arc::new(MemoryStore::new());
    chain(Scripted::new(Behavior::Rounds(rounds())), store.clone())
        .with_snapshot_key("other")
        .fetch()
        .await;
    assert!(store.get(DEFAULT_SNAPSHOT_KEY).await.unwrap().is_none());
    assert!(store.get("other").await.unwrap().is_some());
}
