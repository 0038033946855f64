// src/stats.rs
//! Dashboard figures derived from a draw series, plus series filtering.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::draw::{sort_descending, DrawRecord, ProgramType};

/// A draw this many days old (or younger) counts as recent.
pub const RECENT_DRAW_DAYS: i64 = 14;
const AVERAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStatistics {
    pub latest: Option<DrawRecord>,
    pub previous: Option<DrawRecord>,
    /// Cutoff of the latest draw; 0 for an empty series.
    pub latest_score: u32,
    /// Latest cutoff minus previous cutoff.
    pub score_delta: Option<i64>,
    pub last_draw_date: Option<NaiveDate>,
    pub invitations_ytd: u64,
    /// Mean cutoff of the last five draws, one decimal.
    pub average_recent_score: Option<f64>,
    /// YTD invitations vs the same period last year, percent, one decimal.
    pub invitation_growth_pct: Option<f64>,
    pub is_recent_draw: bool,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Same calendar day one year earlier; Feb 29 maps to Feb 28.
fn same_day_last_year(today: NaiveDate) -> Option<NaiveDate> {
    let year = today.year() - 1;
    today
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}

/// Sum of invitations for draws in `year` dated on or before `until`.
fn invitations_in_year(series: &[DrawRecord], year: i32, until: NaiveDate) -> u64 {
    series
        .iter()
        .filter(|r| r.date.year() == year && r.date <= until)
        .map(|r| u64::from(r.invitations_issued))
        .sum()
}

pub fn summarize(series: &[DrawRecord], today: NaiveDate) -> DrawStatistics {
    let mut sorted = series.to_vec();
    sort_descending(&mut sorted);

    let latest = sorted.first().cloned();
    let previous = sorted.get(1).cloned();

    let score_delta = match (&latest, &previous) {
        (Some(l), Some(p)) => Some(i64::from(l.minimum_score) - i64::from(p.minimum_score)),
        _ => None,
    };

    let recent: Vec<f64> = sorted
        .iter()
        .take(AVERAGE_WINDOW)
        .map(|r| f64::from(r.minimum_score))
        .collect();
    let average_recent_score =
        (!recent.is_empty()).then(|| round1(recent.iter().sum::<f64>() / recent.len() as f64));

    let invitations_ytd = invitations_in_year(&sorted, today.year(), today);
    let invitation_growth_pct = same_day_last_year(today)
        .map(|until| invitations_in_year(&sorted, until.year(), until))
        .filter(|&baseline| baseline > 0)
        .map(|baseline| {
            round1((invitations_ytd as f64 - baseline as f64) / baseline as f64 * 100.0)
        });

    let is_recent_draw = latest
        .as_ref()
        .is_some_and(|r| (today - r.date).num_days() <= RECENT_DRAW_DAYS);

    DrawStatistics {
        latest_score: latest.as_ref().map_or(0, |r| r.minimum_score),
        last_draw_date: latest.as_ref().map(|r| r.date),
        latest,
        previous,
        score_delta,
        invitations_ytd,
        average_recent_score,
        invitation_growth_pct,
        is_recent_draw,
    }
}

/// Filter over a series. Empty fields match everything; order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawQuery {
    /// Draw-number substring or case-insensitive description substring.
    pub search: Option<String>,
    pub program: Option<ProgramType>,
}

impl DrawQuery {
    pub fn program(program: ProgramType) -> Self {
        Self {
            search: None,
            program: Some(program),
        }
    }

    pub fn matches(&self, record: &DrawRecord) -> bool {
        if let Some(p) = self.program {
            if record.program_type != p {
                return false;
            }
        }
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };
        record.draw_number.to_string().contains(&needle)
            || record
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }

    pub fn apply(&self, series: &[DrawRecord]) -> Vec<DrawRecord> {
        series.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}
