//! # Draw records
//! Canonical unit produced by the normalizer and consumed by the forecast
//! engine and every presentation collaborator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest cutoff score the points system can produce.
pub const MAX_SCORE: i64 = 1200;

/// Closed set of program categories a round can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramType {
    General,
    #[serde(rename = "CEC")]
    Cec,
    #[serde(rename = "PNP")]
    Pnp,
    #[serde(rename = "FSW")]
    Fsw,
    #[serde(rename = "FST")]
    Fst,
    #[serde(rename = "Category-based", alias = "CategoryBased")]
    CategoryBased,
}

impl ProgramType {
    pub const ALL: [ProgramType; 6] = [
        ProgramType::General,
        ProgramType::Cec,
        ProgramType::Pnp,
        ProgramType::Fsw,
        ProgramType::Fst,
        ProgramType::CategoryBased,
    ];

    /// Short label used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::General => "General",
            ProgramType::Cec => "CEC",
            ProgramType::Pnp => "PNP",
            ProgramType::Fsw => "FSW",
            ProgramType::Fst => "FST",
            ProgramType::CategoryBased => "Category-based",
        }
    }

    /// Parse an already-canonical label (case-insensitive, `-`/`_`/space tolerant).
    /// Free text goes through [`crate::classify`] instead.
    pub fn from_label(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "general" => Some(ProgramType::General),
            "cec" => Some(ProgramType::Cec),
            "pnp" => Some(ProgramType::Pnp),
            "fsw" => Some(ProgramType::Fsw),
            "fst" => Some(ProgramType::Fst),
            "categorybased" => Some(ProgramType::CategoryBased),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated invitation round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRecord {
    pub id: String,
    /// `0` means upstream did not number the round.
    pub draw_number: u32,
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub program_type: ProgramType,
    pub invitations_issued: u32,
    /// Always within `0..=MAX_SCORE`.
    pub minimum_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DrawRecord {
    /// Human label for the round: description when present, else the program.
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.program_type.as_str())
    }
}

/// Total order used for every externally visible series:
/// newest date first, then higher draw number, then id.
pub fn sort_descending(records: &mut [DrawRecord]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.draw_number.cmp(&a.draw_number))
            .then_with(|| a.id.cmp(&b.id))
    });
}
