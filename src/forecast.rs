//! # Forecasting Engine
//! Pure projections over a newest-first draw series: next draw date, cutoff
//! range, trend, volatility and a confidence figure.
//!
//! No I/O and no shared state; safe to call from any number of tasks.
//!
//! Policy:
//! - fewer than [`MIN_SAMPLES`] records → zero-value result, nothing estimated;
//! - momentum compares the 3 newest scores with up to 3 next-older ones; when
//!   only 3 records exist there is no older window and momentum is 0;
//! - recency uses the signed age of the newest record, so a record dated after
//!   `today` counts for more than one dated today (confidence stays capped);
//! - rounding is half away from zero (`f64::round`).

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::draw::DrawRecord;

pub const MIN_SAMPLES: usize = 3;
/// 11 records → 10 gaps.
const INTERVAL_WINDOW: usize = 11;
const SCORE_WINDOW: usize = 15;
const MOMENTUM_WINDOW: usize = 3;
const TREND_THRESHOLD: f64 = 2.0;
const MOMENTUM_WEIGHT: f64 = 0.2;
const MIN_BUFFER: f64 = 5.0;
const MAX_VOLATILITY: f64 = 100.0;
const MAX_DENSITY: usize = 40;
const RECENCY_HORIZON_DAYS: i64 = 60;
const MAX_CONFIDENCE: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendSignal {
    #[default]
    Steady,
    Rising,
    Falling,
}

impl TrendSignal {
    fn from_momentum(m: f64) -> Self {
        if m > TREND_THRESHOLD {
            TrendSignal::Rising
        } else if m < -TREND_THRESHOLD {
            TrendSignal::Falling
        } else {
            TrendSignal::Steady
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedRange {
    pub low: i32,
    pub high: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub next_estimated_date: Option<NaiveDate>,
    pub predicted_range: Option<PredictedRange>,
    pub trend_signal: TrendSignal,
    /// 0..=100
    pub volatility: u8,
    /// 0..=95
    pub confidence: u8,
}

impl ForecastResult {
    /// Result returned when the series is too short to forecast.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Forecast relative to today's UTC date.
pub fn forecast(series: &[DrawRecord]) -> ForecastResult {
    forecast_at(series, Utc::now().date_naive())
}

/// Forecast with an explicit "today", used for recency.
pub fn forecast_at(series: &[DrawRecord], today: NaiveDate) -> ForecastResult {
    if series.len() < MIN_SAMPLES {
        return ForecastResult::empty();
    }
    let latest = &series[0];

    let next_estimated_date = average_gap_days(series)
        .and_then(|gap| latest.date.checked_add_signed(Duration::days(gap.round() as i64)));

    let scores: Vec<f64> = series
        .iter()
        .take(SCORE_WINDOW)
        .map(|r| f64::from(r.minimum_score))
        .collect();
    let (mean, stddev) = mean_and_stddev(&scores);
    let volatility = if mean > 0.0 {
        (stddev / mean * 1000.0).round().min(MAX_VOLATILITY) as u8
    } else {
        0
    };

    let momentum = momentum(&scores);
    let trend_signal = TrendSignal::from_momentum(momentum);

    let buffer = (stddev * 0.5).round().max(MIN_BUFFER);
    let center = f64::from(latest.minimum_score) + momentum * MOMENTUM_WEIGHT;
    let predicted_range = Some(PredictedRange {
        low: (center - buffer).round() as i32,
        high: (center + buffer).round() as i32,
    });

    let density = (series.len() * 2).min(MAX_DENSITY) as f64;
    // A latest draw dated after `today` is not clamped; negative age raises recency.
    let days_since = (today - latest.date).num_days();
    let recency = (RECENCY_HORIZON_DAYS - days_since).max(0) as f64;
    let confidence = (density + recency).round().min(MAX_CONFIDENCE) as u8;

    tracing::debug!(
        target: "forecast",
        samples = series.len(),
        mean,
        stddev,
        momentum,
        "forecast computed"
    );

    ForecastResult {
        next_estimated_date,
        predicted_range,
        trend_signal,
        volatility,
        confidence,
    }
}

/// Mean gap in days between consecutive records of the newest window.
fn average_gap_days(series: &[DrawRecord]) -> Option<f64> {
    let window = &series[..series.len().min(INTERVAL_WINDOW)];
    let gaps: Vec<i64> = window
        .windows(2)
        .map(|w| (w[0].date - w[1].date).num_days())
        .collect();
    if gaps.is_empty() {
        return None;
    }
    Some(gaps.iter().sum::<i64>() as f64 / gaps.len() as f64)
}

/// Population mean and standard deviation.
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn average(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Average of the newest 3 scores minus the average of the next (up to) 3.
fn momentum(scores: &[f64]) -> f64 {
    let split = scores.len().min(MOMENTUM_WINDOW);
    let older_end = scores.len().min(MOMENTUM_WINDOW * 2);
    match (average(&scores[..split]), average(&scores[split..older_end])) {
        (Some(recent), Some(older)) => recent - older,
        _ => 0.0,
    }
}
