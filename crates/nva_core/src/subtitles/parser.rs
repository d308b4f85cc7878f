//! Tolerant SRT parsing.
//!
//! Cue boundaries are found from timing lines (`start --> end`) rather than
//! blank lines, so files with missing separators still parse. A digits-only
//! line directly before a timing line is that cue's index.

use std::collections::BTreeSet;

use super::error::ParseError;
use super::rules::Normalizer;
use super::types::{DroppedBlock, IssueTag, Timestamp};

const ARROW: &str = "-->";

/// A cue as read from the file, timecodes already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCue {
    /// Index as written in the file, if any.
    pub raw_index: Option<usize>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub lines: Vec<String>,
    pub issues: BTreeSet<IssueTag>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSubtitles {
    pub cues: Vec<RawCue>,
    pub dropped: Vec<DroppedBlock>,
    /// Rule names in firing order, across all tokens.
    pub rule_hits: Vec<&'static str>,
}

/// Split a timing line into its start and end tokens.
///
/// Anything after the end token (cue settings) is ignored.
pub fn split_timing_line(line: &str) -> Option<(&str, &str)> {
    let (start, rest) = line.split_once(ARROW)?;
    let end = rest.split_whitespace().next()?;
    let start = start.trim();
    if start.is_empty() {
        return None;
    }
    Some((start, end))
}

fn is_timing_line(line: &str) -> bool {
    line.contains(ARROW)
}

fn index_of(line: &str) -> Option<usize> {
    let trimmed = line.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        trimmed.parse().ok()
    } else {
        None
    }
}

/// Parse SRT-like text.
///
/// Fails only when no timing line exists at all, or when every cue had to
/// be dropped.
pub fn parse(text: &str, normalizer: &Normalizer) -> Result<ParsedSubtitles, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();

    let timing: Vec<usize> = (0..lines.len())
        .filter(|&i| is_timing_line(lines[i]))
        .collect();
    if timing.is_empty() {
        return Err(ParseError::NoTimecodes);
    }

    let mut parsed = ParsedSubtitles::default();

    for (k, &at) in timing.iter().enumerate() {
        // Text runs up to the next timing line, minus that cue's index line.
        let mut text_end = timing.get(k + 1).copied().unwrap_or(lines.len());
        if k + 1 < timing.len() && text_end > at + 1 && index_of(lines[text_end - 1]).is_some() {
            text_end -= 1;
        }
        let cue_lines: Vec<String> = lines[at + 1..text_end]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        let previous_end = if k == 0 { 0 } else { timing[k - 1] + 1 };
        let raw_index = (at > previous_end)
            .then(|| index_of(lines[at - 1]))
            .flatten();

        let Some((start_token, end_token)) = split_timing_line(lines[at]) else {
            parsed.dropped.push(DroppedBlock {
                line: at + 1,
                text: lines[at].to_string(),
                reason: "timing line has no start or end".to_string(),
            });
            continue;
        };

        let start = normalizer.normalize(start_token);
        let end = normalizer.normalize(end_token);
        parsed.rule_hits.extend(start.applied.iter().chain(end.applied.iter()));

        match (start.value, end.value) {
            (Some(start_ts), Some(end_ts)) => {
                let mut issues = start.tags;
                issues.extend(end.tags);
                parsed.cues.push(RawCue {
                    raw_index,
                    start: start_ts,
                    end: end_ts,
                    lines: cue_lines,
                    issues,
                });
            }
            _ => {
                let bad = if start.value.is_none() {
                    start.text
                } else {
                    end.text
                };
                tracing::warn!("Dropping cue at line {}: unreadable timecode '{}'", at + 1, bad);
                parsed.dropped.push(DroppedBlock {
                    line: at + 1,
                    text: lines[at].to_string(),
                    reason: format!("unreadable timecode '{}'", bad),
                });
            }
        }
    }

    if parsed.cues.is_empty() {
        return Err(ParseError::NoUsableCues {
            dropped: parsed.dropped.len(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> ParsedSubtitles {
        parse(text, &Normalizer::default()).unwrap()
    }

    #[test]
    fn parses_clean_srt() {
        let parsed = run(
            "1\n00:00:01,000 --> 00:00:03,500\nHello\nworld\n\n2\n00:00:04,000 --> 00:00:06,000\nBye\n",
        );
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].raw_index, Some(1));
        assert_eq!(parsed.cues[0].lines, vec!["Hello", "world"]);
        assert_eq!(parsed.cues[1].start, Timestamp::from_millis(4000));
        assert!(parsed.cues[0].issues.is_empty());
        assert!(parsed.rule_hits.is_empty());
    }

    #[test]
    fn handles_crlf_bom_and_missing_blank_lines() {
        let parsed = run(
            "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nA\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nB\r\n",
        );
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].lines, vec!["A"]);
        assert_eq!(parsed.cues[1].raw_index, Some(2));
    }

    #[test]
    fn normalizes_timecodes_and_records_tags() {
        let parsed = run("1\n00:01.5 --> 00:03\nText\n");
        let cue = &parsed.cues[0];
        assert_eq!(cue.start, Timestamp::from_millis(1500));
        assert_eq!(cue.end, Timestamp::from_millis(3000));
        assert!(cue.issues.contains(&IssueTag::MissingHour));
        assert!(cue.issues.contains(&IssueTag::MissingFraction));
        assert!(!parsed.rule_hits.is_empty());
    }

    #[test]
    fn ignores_cue_settings_after_end() {
        let parsed = run("1\n00:00:01,000 --> 00:00:02,000 align:start position:10%\nA\n");
        assert_eq!(parsed.cues[0].end, Timestamp::from_millis(2000));
    }

    #[test]
    fn drops_unreadable_blocks_and_keeps_the_rest() {
        let parsed = run("1\nsoon --> later\nA\n\n2\n00:00:03,000 --> 00:00:04,000\nB\n");
        assert_eq!(parsed.cues.len(), 1);
        assert_eq!(parsed.dropped.len(), 1);
        assert_eq!(parsed.dropped[0].line, 2);
    }

    #[test]
    fn missing_index_is_none() {
        let parsed = run("00:00:01,000 --> 00:00:02,000\nA\n");
        assert_eq!(parsed.cues[0].raw_index, None);
    }

    #[test]
    fn text_without_timecodes_fails() {
        let err = parse("just some words\n\nand more", &Normalizer::default()).unwrap_err();
        assert!(matches!(err, ParseError::NoTimecodes));
    }

    #[test]
    fn all_blocks_unreadable_fails() {
        let err = parse("1\nx --> y\nA\n", &Normalizer::default()).unwrap_err();
        assert!(matches!(err, ParseError::NoUsableCues { dropped: 1 }));
    }
}
