//! # Sanitizer
//! Pure coercions from noisy upstream text into canonical values.
//!
//! Dates are strict: anything that does not parse is reported as `None` and the
//! caller drops the record. Quantities are best-effort and fall back to a
//! caller-chosen default.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Textual layouts tried in order after the ISO family fails.
/// `%B` also accepts the three-letter abbreviation when parsing.
const TEXT_FORMATS: &[&str] = &[
    "%B %d, %Y", // May 31, 2024
    "%b %d, %Y", // May 31, 2024 (short form)
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d %B %Y", // 31 May 2024
    "%B %d %Y",
    "%Y/%m/%d",
];

/// Years outside this window are upstream typos (e.g. `31/05/24` read as year 24).
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_trailing_zone() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)[\s,]+(?:UTC|GMT|EST|EDT|CST|CDT|MST|MDT|PST|PDT|AST|ADT|NST|NDT|ET|CT|MT|PT)(?:\s*[+-]\d{1,2}(?::?\d{2})?)?$",
        )
        .unwrap()
    })
}

fn re_trailing_time() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[\s,]+(?:at\s+)?\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]\.?m\.?)?$").unwrap()
    })
}

fn re_leading_weekday() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").unwrap())
}

fn re_signed_number() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap())
}

/// Decode entities, drop tags, turn every Unicode space (NBSP, narrow NBSP,
/// figure space, line breaks) into ASCII space, delete zero-width characters
/// and collapse runs.
fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let untagged = re_tags().replace_all(&decoded, " ");

    let mut out = String::with_capacity(untagged.len());
    for c in untagged.chars() {
        match c {
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => {}
            c if c.is_whitespace() => out.push(' '),
            c => out.push(c),
        }
    }
    re_ws().replace_all(&out, " ").trim().to_string()
}

/// Remove trailing timezone abbreviation, then a trailing time-of-day, then a
/// leading weekday. Only the calendar day survives.
fn strip_clock_noise(s: &str) -> String {
    let mut out = re_trailing_zone().replace(s, "").to_string();
    out = re_trailing_time().replace(&out, "").to_string();
    out = re_leading_weekday().replace(&out, "").to_string();
    out.trim_end_matches([',', ' ']).trim().to_string()
}

/// ISO-8601 family plus RFC 2822. Timestamps keep the calendar day of their
/// own offset; no conversion to UTC happens.
fn parse_well_known(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for f in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt.date());
        }
    }
    let dt = OffsetDateTime::parse(s, &Rfc2822).ok()?;
    NaiveDate::from_ymd_opt(
        dt.year(),
        u32::from(u8::from(dt.month())),
        u32::from(dt.day()),
    )
}

fn plausible(d: NaiveDate) -> Option<NaiveDate> {
    PLAUSIBLE_YEARS.contains(&d.year()).then_some(d)
}

/// Parse a draw date from upstream text.
///
/// Returns `None` when nothing matches; callers must drop the record rather
/// than invent a date.
pub fn parse_draw_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return None;
    }
    if let Some(d) = parse_well_known(&cleaned) {
        return plausible(d);
    }

    let day_only = strip_clock_noise(&cleaned);
    if day_only.is_empty() {
        return None;
    }
    if let Some(d) = parse_well_known(&day_only) {
        return plausible(d);
    }
    TEXT_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&day_only, f).ok())
        .and_then(plausible)
}

/// Best-effort non-negative count: thousands separators, markup and any other
/// non-digit noise are removed. A fractional tail (`"3000.0"`) is ignored.
/// Returns `fallback` when no digits remain or the value overflows.
pub fn parse_count(raw: &str, fallback: u32) -> u32 {
    let cleaned = clean_text(raw);
    let integral = match cleaned.split_once('.') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => cleaned.as_str(),
    };
    let digits: String = integral.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return fallback;
    }
    digits.parse().unwrap_or(fallback)
}

/// Signed integer extraction for scores, so that negative values can be
/// detected and rejected instead of silently losing their sign.
pub fn parse_score(raw: &str) -> Option<i64> {
    let cleaned = clean_text(raw).replace([',', ' ', '_'], "");
    let m = re_signed_number().find(&cleaned)?;
    let text = m.as_str();
    let integral = text.split('.').next().unwrap_or(text);
    integral.parse().ok()
}

/// Free-text label cleanup: entities decoded, tag-like substrings removed,
/// whitespace collapsed and trimmed.
pub fn strip_markup(raw: &str) -> String {
    clean_text(raw)
}
