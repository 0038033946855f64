// src/ingest/snapshot.rs
//! Last-known-good snapshot of the normalized series.
//!
//! The store is an opaque key/value seam; this module owns the blob format:
//! a versioned envelope carrying a SHA-256 of the serialized records. Blobs
//! that fail to decode or verify are treated as absent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::draw::DrawRecord;

pub const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_SNAPSHOT_KEY: &str = "maple_metrics_draw_cache";

/// Get/set/clear by key. Writes are all-or-nothing and last writer wins.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSnapshot {
    pub captured_at: DateTime<Utc>,
    pub records: Vec<DrawRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: u32,
    checksum: String,
    captured_at: DateTime<Utc>,
    records: Vec<DrawRecord>,
}

fn checksum(records: &[DrawRecord]) -> Result<String> {
    let bytes = serde_json::to_vec(records).context("serializing snapshot records")?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

impl CachedSnapshot {
    pub fn new(records: Vec<DrawRecord>, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            records,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let env = Envelope {
            version: SNAPSHOT_VERSION,
            checksum: checksum(&self.records)?,
            captured_at: self.captured_at,
            records: self.records.clone(),
        };
        serde_json::to_string(&env).context("encoding snapshot envelope")
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let env: Envelope = serde_json::from_str(blob).context("decoding snapshot envelope")?;
        if env.version != SNAPSHOT_VERSION {
            return Err(anyhow!(
                "snapshot version {} (expected {SNAPSHOT_VERSION})",
                env.version
            ));
        }
        if checksum(&env.records)? != env.checksum {
            return Err(anyhow!("snapshot checksum mismatch"));
        }
        Ok(Self {
            captured_at: env.captured_at,
            records: env.records,
        })
    }

    /// Age relative to `now`; never negative.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.captured_at).max(chrono::Duration::zero())
    }
}

/// Read and verify the snapshot under `key`. `Ok(None)` when nothing is stored.
pub async fn load_snapshot(store: &dyn SnapshotStore, key: &str) -> Result<Option<CachedSnapshot>> {
    match store.get(key).await? {
        Some(blob) => CachedSnapshot::decode(&blob).map(Some),
        None => Ok(None),
    }
}

/// Overwrite the snapshot under `key`.
pub async fn save_snapshot(store: &dyn SnapshotStore, key: &str, snap: &CachedSnapshot) -> Result<()> {
    store.set(key, snap.encode()?).await
}

/// In-process store; also the test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))?;
        guard.remove(key);
        Ok(())
    }
}

/// Per-process sequence for temp file names.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per key under `dir`. Writes go to a temp file that is
/// renamed over the target, so readers never observe a partial blob.
/// Every write gets its own temp name; concurrent writers to one key race
/// only on the final rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait::async_trait]
impl SnapshotStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading snapshot {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.tmp-{}-{seq}", std::process::id()));

        let written = match tokio::fs::write(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("replacing {}", path.display())),
            Err(e) => Err(e).with_context(|| format!("writing {}", tmp.display())),
        };
        if written.is_err() {
            // best effort; the temp name is never reused
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        written
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
