//! # Classifier
//! Maps free-text round labels to a [`ProgramType`] with an ordered rule table.
//!
//! Rules are evaluated top to bottom and the first hit wins. Category-based
//! keywords sit above the base programs so that a round such as
//! "Provincial Nominee Program + STEM occupations" lands in `CategoryBased`.
//!
//! Keywords match at the start of a word, so `transport` covers
//! "Transportation occupations" while `stem` does not fire on "Systematic".
//! A rule may list phrases it ignores: the category rule skips
//! "federal skilled trades", which keeps the FST rule reachable.

use crate::draw::ProgramType;

/// One row of the strategy table.
pub struct Rule {
    pub keywords: &'static [&'static str],
    /// Phrases blanked out before this rule's keywords are tried.
    pub excludes: &'static [&'static str],
    pub program: ProgramType,
}

pub const RULES: &[Rule] = &[
    Rule {
        keywords: &[
            "category-based",
            "stem",
            "healthcare",
            "french",
            "transport",
            "trade",
            "agriculture",
        ],
        excludes: &["federal skilled trades"],
        program: ProgramType::CategoryBased,
    },
    Rule {
        keywords: &["provincial nominee"],
        excludes: &[],
        program: ProgramType::Pnp,
    },
    Rule {
        keywords: &["canadian experience"],
        excludes: &[],
        program: ProgramType::Cec,
    },
    Rule {
        keywords: &["federal skilled worker"],
        excludes: &[],
        program: ProgramType::Fsw,
    },
    Rule {
        keywords: &["federal skilled trades"],
        excludes: &[],
        program: ProgramType::Fst,
    },
];

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_alphanumeric())
}

/// Substring match that must begin at a word start; the end is free, so
/// inflections ("trades", "transportation") still match.
fn starts_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        !is_word_char(before)
    })
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        let mut text = text.to_owned();
        for phrase in self.excludes {
            text = text.replace(*phrase, " ");
        }
        self.keywords.iter().any(|k| starts_word(&text, k))
    }
}

/// Classify a single combined label.
pub fn classify(label: &str) -> ProgramType {
    let text = label.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&text))
        .map(|rule| rule.program)
        .unwrap_or(ProgramType::General)
}

/// Classify from the two upstream label fields (round name and round type).
pub fn classify_round(name: Option<&str>, round_type: Option<&str>) -> ProgramType {
    let combined = format!(
        "{} {}",
        name.unwrap_or_default(),
        round_type.unwrap_or_default()
    );
    classify(&combined)
}
