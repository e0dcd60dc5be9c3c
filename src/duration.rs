//! Normalizes plan durations into canonical seconds.
//!
//! Plans and payment records describe durations either as raw seconds or as
//! free text ("3 months", "1 year"). Normalization is total: anything we
//! cannot make sense of degrades to a 30-day default rather than failing.

use serde::Deserialize;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Fallback for wholly unparseable input.
pub const DEFAULT_DURATION_SECONDS: i64 = 30 * DAY;

/// Unit words ordered longest-first so that e.g. "minute" wins over any
/// shorter word it happens to contain.
const UNITS: [(&str, i64); 6] = [
    ("minute", MINUTE),
    ("month", MONTH),
    ("year", YEAR),
    ("week", WEEK),
    ("hour", HOUR),
    ("day", DAY),
];

/// Duration as it arrives in API payloads: raw seconds or free text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Seconds(i64),
    Text(String),
}

impl DurationInput {
    pub fn normalize(&self) -> i64 {
        match self {
            DurationInput::Seconds(s) => *s,
            DurationInput::Text(t) => normalize_text(t),
        }
    }
}

/// Convert a free-text duration into seconds.
///
/// The first unit word found (longest-first, case-insensitive substring)
/// wins; a missing count defaults to 1. Text with digits but no unit word
/// is read as a day count.
pub fn normalize_text(text: &str) -> i64 {
    let lowered = text.to_lowercase();
    let lowered = lowered.trim();

    for (word, unit_seconds) in UNITS {
        if lowered.contains(word) {
            return leading_count(lowered).unwrap_or(1) * unit_seconds;
        }
    }

    match leading_count(lowered) {
        Some(days) => days * DAY,
        None => DEFAULT_DURATION_SECONDS,
    }
}

/// First contiguous digit run in the string, if any.
fn leading_count(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
