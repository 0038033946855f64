// tests/refresh_service.rs
use std::sync::Arc;
use std::time::Duration;

use maple_metrics::ingest::config::FeedConfig;
use maple_metrics::ingest::providers::ircc_json::IrccJsonProvider;
use maple_metrics::ingest::scheduler::spawn_refresh_task;
use maple_metrics::ingest::snapshot::{FileStore, MemoryStore};
use maple_metrics::{DrawQuery, DrawService, FallbackChain, ProgramType, Provenance};

fn fixture_service(store: Arc<MemoryStore>) -> DrawService {
    let body = std::fs::read_to_string("tests/fixtures/ircc_rounds.json").expect("fixture");
    DrawService::new(FallbackChain::new(
        Arc::new(IrccJsonProvider::from_fixture_str(&body)),
        store,
    ))
}

#[tokio::test]
async fn service_draws_and_forecast() {
    let svc = fixture_service(Arc::new(MemoryStore::new()));
    let feed = svc.get_draws().await;
    assert_eq!(feed.status.provenance, Provenance::Live);

    let f = svc.get_forecast(&feed.records);
    assert!(f.predicted_range.is_some());
    assert!(f.next_estimated_date.is_some());

    // only one PNP round in the fixture: too short to forecast
    let pnp = svc.get_forecast_for(&feed.records, &DrawQuery::program(ProgramType::Pnp));
    assert_eq!(pnp.predicted_range, None);

    svc.clear_snapshot().await.unwrap();
}

#[tokio::test]
async fn service_from_config_with_unreachable_upstream_serves_seed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = FeedConfig {
        // discard port; nothing listens there
        url: "http://127.0.0.1:9/rounds.json".into(),
        timeout_secs: 1,
        snapshot_dir: dir.path().to_path_buf(),
        ..FeedConfig::default()
    };
    let svc = DrawService::from_config(&cfg).unwrap();
    let feed = svc.get_draws().await;
    assert_eq!(feed.status.provenance, Provenance::Seed);
    assert!(feed.status.stale);
    assert!(!feed.records.is_empty());
}

#[tokio::test]
async fn refresh_task_publishes_feeds() {
    let svc = Arc::new(fixture_service(Arc::new(MemoryStore::new())));
    let (handle, mut rx) = spawn_refresh_task(svc, Duration::from_millis(30));

    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("first publish")
        .unwrap();
    let first = rx.borrow_and_update().clone().expect("feed");
    assert_eq!(first.status.provenance, Provenance::Live);
    assert_eq!(first.records.len(), 4);

    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("second publish")
        .unwrap();

    // dropping the last receiver stops the task
    drop(rx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("task stops")
        .unwrap();
}

#[tokio::test]
async fn file_backed_service_survives_upstream_loss() {
    let dir = tempfile::tempdir().unwrap();
    let body = std::fs::read_to_string("tests/fixtures/ircc_rounds.json").expect("fixture");

    let healthy = DrawService::new(FallbackChain::new(
        Arc::new(IrccJsonProvider::from_fixture_str(&body)),
        Arc::new(FileStore::new(dir.path())),
    ));
    let live = healthy.get_draws().await;

    // a fresh process with a broken upstream reads the same directory
    let broken = DrawService::new(FallbackChain::new(
        Arc::new(IrccJsonProvider::from_fixture_str("not json")),
        Arc::new(FileStore::new(dir.path())),
    ));
    let feed = broken.get_draws().await;
    assert_eq!(feed.status.provenance, Provenance::Snapshot);
    assert_eq!(feed.records, live.records);
}
