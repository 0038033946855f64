// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::ircc_json::{DEFAULT_USER_AGENT, IRCC_ROUNDS_URL};
use crate::ingest::snapshot::DEFAULT_SNAPSHOT_KEY;

const ENV_PATH: &str = "MAPLE_FEED_CONFIG";
const ENV_URL: &str = "MAPLE_FEED_URL";
const ENV_TIMEOUT: &str = "MAPLE_FEED_TIMEOUT_SECS";
const ENV_SNAPSHOT_DIR: &str = "MAPLE_SNAPSHOT_DIR";
const ENV_MAX_AGE: &str = "MAPLE_SNAPSHOT_MAX_AGE_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 8;
const MAX_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REFRESH_SECS: u64 = 300;

fn default_url() -> String {
    IRCC_ROUNDS_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_snapshot_key() -> String {
    DEFAULT_SNAPSHOT_KEY.to_string()
}
fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

/// Fetcher settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Live-tier request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,
    /// Snapshots older than this are not served. `None` = no limit.
    #[serde(default)]
    pub snapshot_max_age_secs: Option<u64>,
    /// Serve a snapshot younger than this without a live request. 0 = off.
    #[serde(default)]
    pub fresh_window_secs: u64,
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            snapshot_dir: default_snapshot_dir(),
            snapshot_key: default_snapshot_key(),
            snapshot_max_age_secs: None,
            fresh_window_secs: 0,
            refresh_interval_secs: default_refresh_secs(),
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn snapshot_max_age(&self) -> Option<chrono::Duration> {
        self.snapshot_max_age_secs
            .and_then(|s| i64::try_from(s).ok())
            .map(chrono::Duration::seconds)
    }

    pub fn fresh_window(&self) -> Option<chrono::Duration> {
        (self.fresh_window_secs > 0)
            .then(|| i64::try_from(self.fresh_window_secs).ok())
            .flatten()
            .map(chrono::Duration::seconds)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Replace unusable values with defaults.
    fn sanitized(mut self) -> Self {
        if self.url.trim().is_empty() {
            self.url = default_url();
        }
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            self.timeout_secs = default_timeout_secs();
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        if self.snapshot_key.trim().is_empty() {
            self.snapshot_key = default_snapshot_key();
        }
        if self.refresh_interval_secs == 0 {
            self.refresh_interval_secs = default_refresh_secs();
        }
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_URL) {
            self.url = url;
        }
        if let Some(t) = env_u64(ENV_TIMEOUT) {
            self.timeout_secs = t;
        }
        if let Ok(dir) = std::env::var(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(age) = env_u64(ENV_MAX_AGE) {
            self.snapshot_max_age_secs = Some(age);
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "ingest", key, value = %raw, "ignoring non-numeric env override");
            None
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_feed_config_from(path: &Path) -> Result<FeedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feed_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $MAPLE_FEED_CONFIG
/// 2) config/feed.toml
/// 3) config/feed.json
/// 4) built-in defaults
pub fn load_feed_config_default() -> Result<FeedConfig> {
    let base = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("MAPLE_FEED_CONFIG points to non-existent path"));
        }
        load_feed_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/feed.toml");
        let json_p = PathBuf::from("config/feed.json");
        if toml_p.exists() {
            load_feed_config_from(&toml_p)?
        } else if json_p.exists() {
            load_feed_config_from(&json_p)?
        } else {
            FeedConfig::default()
        }
    };
    Ok(base.apply_env().sanitized())
}

fn parse_feed_config(s: &str, hint_ext: &str) -> Result<FeedConfig> {
    if hint_ext == "json" {
        let cfg: FeedConfig = serde_json::from_str(s).context("parsing feed config json")?;
        return Ok(cfg.sanitized());
    }
    if let Ok(cfg) = toml::from_str::<FeedConfig>(s) {
        return Ok(cfg.sanitized());
    }
    if let Ok(cfg) = serde_json::from_str::<FeedConfig>(s) {
        return Ok(cfg.sanitized());
    }
    Err(anyhow!("unsupported feed config format"))
}
