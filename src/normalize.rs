//! # Record Normalizer
//! Turns raw upstream rounds into validated [`DrawRecord`]s.
//!
//! - Each item is processed independently; a malformed item is dropped with a
//!   warning and never aborts the batch.
//! - Three schema variants are accepted without a version flag (legacy
//!   `round*` fields, current `draw*` fields, canonical export fields).
//! - Output is sorted newest first; an all-dropped batch yields an empty vec.

use std::collections::HashSet;
use std::fmt;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::classify::classify_round;
use crate::draw::{sort_descending, DrawRecord, ProgramType, MAX_SCORE};
use crate::sanitize::{parse_count, parse_draw_date, parse_score, strip_markup};

/// Upstream scalar that may arrive as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Text(s) => s.clone(),
        }
    }

    /// Non-negative count with a fallback, see [`parse_count`].
    pub fn count(&self, fallback: u32) -> u32 {
        match self {
            RawValue::Int(i) => u32::try_from(*i).unwrap_or(fallback),
            RawValue::Float(f) if f.is_finite() && *f >= 0.0 && *f <= u32::MAX as f64 => {
                f.trunc() as u32
            }
            RawValue::Float(_) => fallback,
            RawValue::Text(s) => parse_count(s, fallback),
        }
    }

    /// Signed score, see [`parse_score`].
    pub fn score(&self) -> Option<i64> {
        match self {
            RawValue::Int(i) => Some(*i),
            RawValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            RawValue::Float(_) => None,
            RawValue::Text(s) => parse_score(s),
        }
    }
}

/// One round as published upstream. Every field is optional; validation
/// happens in [`normalize_batch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "roundNumber",
        alias = "drawNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub round_number: Option<RawValue>,
    #[serde(
        rename = "roundDate",
        alias = "date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub round_date: Option<RawValue>,
    #[serde(rename = "drawDateFull", default, skip_serializing_if = "Option::is_none")]
    pub draw_date_full: Option<RawValue>,
    #[serde(rename = "drawDate", default, skip_serializing_if = "Option::is_none")]
    pub draw_date: Option<RawValue>,
    #[serde(
        rename = "roundName",
        alias = "drawName",
        alias = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub round_name: Option<String>,
    #[serde(rename = "roundType", default, skip_serializing_if = "Option::is_none")]
    pub round_type: Option<String>,
    #[serde(rename = "programType", default, skip_serializing_if = "Option::is_none")]
    pub program_type: Option<String>,
    #[serde(
        rename = "roundInvitations",
        alias = "drawSize",
        alias = "invitationsIssued",
        alias = "itasIssued",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub invitations: Option<RawValue>,
    #[serde(
        rename = "roundLowestScore",
        alias = "drawCRS",
        alias = "minimumScore",
        alias = "crsScore",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lowest_score: Option<RawValue>,
}

impl From<&DrawRecord> for RawRecord {
    fn from(r: &DrawRecord) -> Self {
        Self {
            id: Some(r.id.clone()),
            round_number: Some(RawValue::Int(i64::from(r.draw_number))),
            round_date: Some(RawValue::Text(r.date.format("%Y-%m-%d").to_string())),
            draw_date_full: None,
            draw_date: None,
            round_name: r.description.clone(),
            round_type: None,
            program_type: Some(r.program_type.as_str().to_string()),
            invitations: Some(RawValue::Int(i64::from(r.invitations_issued))),
            lowest_score: Some(RawValue::Int(i64::from(r.minimum_score))),
        }
    }
}

/// Why a raw item was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Undecodable(String),
    MissingDate,
    UnparseableDate(String),
    MissingScore,
    UnparseableScore(String),
    ScoreOutOfRange(i64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Undecodable(e) => write!(f, "undecodable record: {e}"),
            Rejection::MissingDate => f.write_str("missing date"),
            Rejection::UnparseableDate(raw) => write!(f, "unparseable date {raw:?}"),
            Rejection::MissingScore => f.write_str("missing minimum score"),
            Rejection::UnparseableScore(raw) => write!(f, "unparseable score {raw:?}"),
            Rejection::ScoreOutOfRange(v) => {
                write!(f, "score {v} outside 0..={MAX_SCORE}")
            }
        }
    }
}

/// A dropped item, kept for logging and the feed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the upstream batch.
    pub index: usize,
    /// Round number or id, when upstream supplied one.
    pub hint: Option<String>,
    pub reason: Rejection,
}

/// Result of normalizing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Valid records, newest first.
    pub records: Vec<DrawRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Normalize a batch and keep only the valid records.
pub fn normalize(raw: Vec<RawRecord>) -> Vec<DrawRecord> {
    normalize_batch(raw).records
}

/// Normalize a batch, reporting every dropped item.
pub fn normalize_batch(raw: Vec<RawRecord>) -> Normalized {
    normalize_indexed(raw.into_iter().enumerate().collect(), Vec::new())
}

/// Normalize untyped JSON items. Items that do not even decode into a
/// [`RawRecord`] are rejected individually.
pub fn normalize_values(items: Vec<serde_json::Value>) -> Normalized {
    let mut decoded = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, v) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawRecord>(v) {
            Ok(r) => decoded.push((index, r)),
            Err(e) => rejected.push(RejectedRecord {
                index,
                hint: None,
                reason: Rejection::Undecodable(e.to_string()),
            }),
        }
    }
    normalize_indexed(decoded, rejected)
}

fn normalize_indexed(
    items: Vec<(usize, RawRecord)>,
    mut rejected: Vec<RejectedRecord>,
) -> Normalized {
    let mut records = Vec::with_capacity(items.len());
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, raw) in items {
        let hint = record_hint(&raw);
        match normalize_one(index, raw) {
            Ok(mut rec) => {
                if !seen_ids.insert(rec.id.clone()) {
                    rec.id = unique_id(&rec.id, index, &seen_ids);
                    seen_ids.insert(rec.id.clone());
                }
                records.push(rec);
            }
            Err(reason) => rejected.push(RejectedRecord {
                index,
                hint,
                reason,
            }),
        }
    }

    rejected.sort_by_key(|r| r.index);
    for r in &rejected {
        tracing::warn!(
            target: "ingest",
            index = r.index,
            hint = r.hint.as_deref().unwrap_or("-"),
            reason = %r.reason,
            "dropping malformed draw record"
        );
    }

    sort_descending(&mut records);

    counter!("draws_records_kept_total").increment(records.len() as u64);
    counter!("draws_records_dropped_total").increment(rejected.len() as u64);

    Normalized { records, rejected }
}

fn record_hint(raw: &RawRecord) -> Option<String> {
    raw.id
        .clone()
        .or_else(|| raw.round_number.as_ref().map(RawValue::as_text))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn unique_id(base: &str, index: usize, taken: &HashSet<String>) -> String {
    let mut candidate = format!("{base}-{index}");
    while taken.contains(&candidate) {
        candidate.push('_');
    }
    candidate
}

fn non_blank(v: &Option<RawValue>) -> Option<String> {
    v.as_ref()
        .map(RawValue::as_text)
        .filter(|s| !strip_markup(s).is_empty())
}

fn normalize_one(index: usize, raw: RawRecord) -> Result<DrawRecord, Rejection> {
    // Date: first candidate field that parses wins.
    let candidates: Vec<String> = [&raw.round_date, &raw.draw_date_full, &raw.draw_date]
        .into_iter()
        .filter_map(non_blank)
        .collect();
    let first = candidates.first().cloned().ok_or(Rejection::MissingDate)?;
    let date = candidates
        .iter()
        .find_map(|c| parse_draw_date(c))
        .ok_or(Rejection::UnparseableDate(first))?;

    let score_raw = raw.lowest_score.as_ref().ok_or(Rejection::MissingScore)?;
    let score = score_raw
        .score()
        .ok_or_else(|| Rejection::UnparseableScore(score_raw.as_text()))?;
    if !(0..=MAX_SCORE).contains(&score) {
        return Err(Rejection::ScoreOutOfRange(score));
    }

    let draw_number = raw.round_number.as_ref().map_or(0, |v| v.count(0));
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if draw_number > 0 {
                format!("ircc-{draw_number}")
            } else {
                format!("ircc-{index}")
            }
        });

    let name = raw.round_name.as_deref().map(strip_markup);
    let round_type = raw.round_type.as_deref().map(strip_markup);

    let program_type = raw
        .program_type
        .as_deref()
        .and_then(ProgramType::from_label)
        .unwrap_or_else(|| classify_round(name.as_deref(), round_type.as_deref()));

    let description = name.filter(|n| {
        !n.is_empty()
            && !round_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(n))
    });

    Ok(DrawRecord {
        id,
        draw_number,
        date,
        program_type,
        invitations_issued: raw.invitations.as_ref().map_or(0, |v| v.count(0)),
        minimum_score: score as u32,
        description,
    })
}
