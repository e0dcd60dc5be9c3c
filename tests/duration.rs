//! Duration normalizer tests: canonical unit conversion and the total,
//! never-failing degradation rules.

use gatepass::duration::{DEFAULT_DURATION_SECONDS, DurationInput, normalize_text};

const DAY: i64 = 86400;

#[test]
fn test_integer_input_passes_through() {
    assert_eq!(DurationInput::Seconds(3600).normalize(), 3600);
    assert_eq!(DurationInput::Seconds(0).normalize(), 0);
}

#[test]
fn test_unit_words_convert_to_canonical_seconds() {
    assert_eq!(normalize_text("3 months"), 3 * 30 * DAY);
    assert_eq!(normalize_text("1 year"), 365 * DAY);
    assert_eq!(normalize_text("2 weeks"), 2 * 7 * DAY);
    assert_eq!(normalize_text("10 days"), 10 * DAY);
    assert_eq!(normalize_text("6 hours"), 6 * 3600);
    assert_eq!(normalize_text("45 minutes"), 45 * 60);
}

#[test]
fn test_matching_is_case_insensitive() {
    assert_eq!(normalize_text("3 Months"), 3 * 30 * DAY);
    assert_eq!(normalize_text("1 YEAR"), 365 * DAY);
}

#[test]
fn test_missing_count_defaults_to_one() {
    assert_eq!(normalize_text("month"), 30 * DAY);
    assert_eq!(normalize_text("a year"), 365 * DAY);
    assert_eq!(normalize_text("per week"), 7 * DAY);
}

#[test]
fn test_digits_without_unit_are_days() {
    assert_eq!(normalize_text("14"), 14 * DAY);
    assert_eq!(normalize_text("7 sleeps"), 7 * DAY);
}

#[test]
fn test_unparseable_input_degrades_to_default() {
    assert_eq!(normalize_text(""), DEFAULT_DURATION_SECONDS);
    assert_eq!(normalize_text("forever"), DEFAULT_DURATION_SECONDS);
    assert_eq!(normalize_text("???"), DEFAULT_DURATION_SECONDS);
    assert_eq!(DEFAULT_DURATION_SECONDS, 30 * DAY);
}

#[test]
fn test_longest_unit_word_wins() {
    // "minutes" contains "minute"; it must not be misread through any
    // shorter unit word.
    assert_eq!(normalize_text("90 minutes"), 90 * 60);
    // Both "week" and "day" appear; the longer word is checked first.
    assert_eq!(normalize_text("2 weekdays"), 2 * 7 * DAY);
}

#[test]
fn test_untagged_deserialization() {
    let seconds: DurationInput = serde_json::from_str("2592000").unwrap();
    assert_eq!(seconds.normalize(), 30 * DAY);

    let text: DurationInput = serde_json::from_str("\"3 months\"").unwrap();
    assert_eq!(text.normalize(), 90 * DAY);
}
