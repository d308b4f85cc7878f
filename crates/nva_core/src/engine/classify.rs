//! Failure classification from engine output.

use crate::models::ErrorClass;

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout"];

const CODEC_MARKERS: &[&str] = &[
    "codec",
    "decoder",
    "encoder",
    "error while decoding",
    "no decoder",
    "unsupported pixel format",
];

const FORMAT_MARKERS: &[&str] = &[
    "invalid data found",
    "invalid argument",
    "format",
    "moov atom not found",
    "end of file",
    "non-monotonous",
    "non monotonically",
    "timestamp",
    "dts",
    "no such file",
];

/// Classify a failed attempt from its error message and stderr tail.
///
/// Matching is case-insensitive. Timeout markers win, then codec markers,
/// then format markers.
pub fn classify_failure(text: &str) -> ErrorClass {
    let lower = text.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(TIMEOUT_MARKERS) {
        ErrorClass::Timeout
    } else if contains_any(CODEC_MARKERS) {
        ErrorClass::Codec
    } else if contains_any(FORMAT_MARKERS) {
        ErrorClass::Format
    } else {
        ErrorClass::Unknown
    }
}

const ERROR_LINE_MARKERS: &[&str] = &[
    "error",
    "invalid",
    "fail",
    "not found",
    "unable",
    "could not",
    "no such",
    "unsupported",
    "conversion",
];

/// Pick the lines of engine output that describe a failure.
///
/// Engine stderr also carries stream metadata (`encoder : Lavf...`) that
/// would confuse classification, so only error-looking lines are kept.
/// Falls back to the last line when nothing matches.
pub fn summarize_failure(lines: &[String]) -> String {
    let picked: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| {
            let lower = l.to_lowercase();
            ERROR_LINE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .collect();

    if picked.is_empty() {
        lines
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string()
    } else {
        picked.join("\n")
    }
}
