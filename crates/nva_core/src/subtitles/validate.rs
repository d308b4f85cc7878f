//! Timeline validation and repair.
//!
//! One pass walks the cues in order and fixes, per cue: implausible early
//! jumps, reversed ranges, overlong cues, overlap with the previous cue and
//! cues that are too short. Passes repeat until one finds nothing.

use super::types::{IssueTag, SubtitleCue, Timestamp};
use crate::config::SubtitleSettings;

/// Timeline limits in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineLimits {
    pub default_cue: u64,
    pub min_cue: u64,
    pub max_cue: u64,
    pub min_gap: u64,
    /// Cues starting before this are checked for jumps.
    pub early_timeline: u64,
    /// Early cues longer than this are jumps.
    pub jump_threshold: u64,
}

impl From<&SubtitleSettings> for TimelineLimits {
    fn from(s: &SubtitleSettings) -> Self {
        let ms = |secs: f64| Timestamp::from_secs_f64(secs).as_millis();
        Self {
            default_cue: ms(s.default_cue_secs),
            min_cue: ms(s.min_cue_secs),
            max_cue: ms(s.max_cue_secs),
            min_gap: ms(s.min_gap_secs),
            early_timeline: ms(s.early_timeline_secs),
            jump_threshold: ms(s.jump_threshold_secs),
        }
    }
}

impl Default for TimelineLimits {
    fn default() -> Self {
        Self::from(&SubtitleSettings::default())
    }
}

/// Run one validation pass over `cues`, fixing what it finds.
///
/// Returns the number of anomalies found.
pub fn validate_pass(cues: &mut [SubtitleCue], limits: &TimelineLimits) -> usize {
    let mut anomalies = 0;

    for i in 0..cues.len() {
        let next_start = cues.get(i + 1).map(|c| c.start);
        let (before, rest) = cues.split_at_mut(i);
        let cue = &mut rest[0];

        if cue.start.as_millis() < limits.early_timeline
            && cue.duration_millis() > limits.jump_threshold
        {
            let default_end = cue.start.plus_millis(limits.default_cue);
            let end = match next_start {
                Some(next) if next < default_end && next.millis_since(cue.start) >= limits.min_cue => {
                    next
                }
                _ => default_end,
            };
            tracing::debug!("Cue {}: implausible jump to {}, ending at {}", cue.index, cue.end, end);
            cue.end = end;
            cue.tag(IssueTag::ImplausibleJump);
            anomalies += 1;
        }

        if cue.end <= cue.start {
            cue.end = cue.start.plus_millis(limits.default_cue);
            cue.tag(IssueTag::ReversedRange);
            anomalies += 1;
        }

        if cue.duration_millis() > limits.max_cue {
            cue.end = cue.start.plus_millis(limits.max_cue);
            cue.tag(IssueTag::TooLong);
            anomalies += 1;
        }

        if let Some(prev) = before.last_mut() {
            if cue.start < prev.end {
                let trimmed_end = Timestamp::from_millis(
                    cue.start.as_millis().saturating_sub(limits.min_gap),
                );
                if trimmed_end.millis_since(prev.start) >= limits.min_cue {
                    prev.end = trimmed_end;
                    prev.tag(IssueTag::Overlap);
                } else {
                    let duration = cue
                        .duration_millis()
                        .clamp(limits.min_cue, limits.max_cue.max(limits.min_cue));
                    cue.start = prev.end.plus_millis(limits.min_gap);
                    cue.end = cue.start.plus_millis(duration);
                    cue.tag(IssueTag::Overlap);
                }
                anomalies += 1;
            }
        }

        if cue.duration_millis() < limits.min_cue {
            cue.end = cue.start.plus_millis(limits.min_cue);
            cue.tag(IssueTag::TooShort);
            anomalies += 1;
        }
    }

    anomalies
}

/// Anomalies a pass would find, without changing anything.
pub fn count_anomalies(cues: &[SubtitleCue], limits: &TimelineLimits) -> usize {
    validate_pass(&mut cues.to_vec(), limits)
}
