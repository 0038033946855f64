// src/ingest/providers/ircc_json.rs
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::ingest::types::DrawSource;

/// Public Express Entry rounds feed.
pub const IRCC_ROUNDS_URL: &str =
    "https://www.canada.ca/content/dam/ircc/documents/json/ee_rounds_123_en.json";

pub const DEFAULT_USER_AGENT: &str = "MapleMetrics/1.0 (+draw-forecast)";

#[derive(Debug, Deserialize)]
struct RoundsPayload {
    rounds: Vec<serde_json::Value>,
}

/// Extract the raw round items. The payload must be an object with a
/// top-level `rounds` array; anything else is a malformed batch.
pub fn parse_rounds_payload(body: &str) -> Result<Vec<serde_json::Value>> {
    let payload: RoundsPayload = serde_json::from_str(body)
        .context("parsing rounds payload (expected top-level `rounds` array)")?;
    Ok(payload.rounds)
}

pub struct IrccJsonProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl IrccJsonProvider {
    /// Serve a canned payload (tests, offline demos).
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// Live HTTP provider with a bounded request timeout.
    pub fn from_url(url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .context("building ircc http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        })
    }
}

#[async_trait]
impl DrawSource for IrccJsonProvider {
    async fn fetch_rounds(&self) -> Result<Vec<serde_json::Value>> {
        match &self.mode {
            Mode::Fixture(s) => parse_rounds_payload(s),
            Mode::Http { url, client } => {
                let t0 = Instant::now();
                let resp = client
                    .get(url.as_str())
                    .header(ACCEPT, "application/json")
                    .send()
                    .await
                    .context("ircc http get()")?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("ircc gateway error: {status}");
                }
                let body = resp.text().await.context("ircc http .text()")?;
                histogram!("draws_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                parse_rounds_payload(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "ircc"
    }
}
