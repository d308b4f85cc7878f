//! Subtitle data types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Millisecond-precision position on the subtitle timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Negative and non-finite values map to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self((secs * 1000.0).round() as u64)
        } else {
            Self::ZERO
        }
    }

    /// `None` when the value does not fit in milliseconds.
    pub fn from_parts(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<Self> {
        hours
            .checked_mul(60)?
            .checked_add(minutes)?
            .checked_mul(60)?
            .checked_add(seconds)?
            .checked_mul(1000)?
            .checked_add(millis)
            .map(Self)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// `(hours, minutes, seconds, millis)`.
    pub fn parts(&self) -> (u64, u64, u64, u64) {
        let ms = self.0 % 1000;
        let total_secs = self.0 / 1000;
        (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, ms)
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds from `earlier` to `self`, zero if `earlier` is later.
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Strict parse of the canonical `HH:MM:SS,mmm` form.
    ///
    /// Hours take two or more digits; minutes and seconds exactly two and at
    /// most 59; the fraction exactly three.
    pub fn parse(token: &str) -> Option<Self> {
        let (clock, fraction) = token.split_once(',')?;
        let mut fields = clock.split(':');
        let (h, m, s) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() {
            return None;
        }
        let digits = |f: &str, len: Option<usize>| {
            !f.is_empty()
                && f.bytes().all(|b| b.is_ascii_digit())
                && len.is_none_or(|l| f.len() == l)
        };
        if !(digits(h, None) && h.len() >= 2 && digits(m, Some(2)) && digits(s, Some(2)))
            || !digits(fraction, Some(3))
        {
            return None;
        }
        let (h, m, s, ms): (u64, u64, u64, u64) = (
            h.parse().ok()?,
            m.parse().ok()?,
            s.parse().ok()?,
            fraction.parse().ok()?,
        );
        if m > 59 || s > 59 {
            return None;
        }
        Self::from_parts(h, m, s, ms)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s, ms) = self.parts();
        write!(f, "{:02}:{:02}:{:02},{:03}", h, m, s, ms)
    }
}

/// What was wrong with a cue, or what was done to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTag {
    /// Wrong separators or field widths in a timecode.
    MalformedTimecode,
    MissingFraction,
    MissingHour,
    /// Seconds or minutes above 59.
    FieldOverflow,
    /// Hour field reinterpreted as zero.
    HourArtifact,
    /// Index missing or out of sequence.
    Renumbered,
    /// Early cue lasting far too long.
    ImplausibleJump,
    /// End at or before start.
    ReversedRange,
    Overlap,
    TooShort,
    TooLong,
}

impl fmt::Display for IssueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueTag::MalformedTimecode => "malformed timecode",
            IssueTag::MissingFraction => "missing fraction",
            IssueTag::MissingHour => "missing hour",
            IssueTag::FieldOverflow => "field overflow",
            IssueTag::HourArtifact => "hour artifact",
            IssueTag::Renumbered => "renumbered",
            IssueTag::ImplausibleJump => "implausible jump",
            IssueTag::ReversedRange => "reversed range",
            IssueTag::Overlap => "overlap",
            IssueTag::TooShort => "too short",
            IssueTag::TooLong => "too long",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCue {
    /// 1-based position in the track.
    pub index: usize,
    pub start: Timestamp,
    pub end: Timestamp,
    pub lines: Vec<String>,
    pub modified: bool,
    pub issues: BTreeSet<IssueTag>,
}

impl SubtitleCue {
    pub fn new(index: usize, start: Timestamp, end: Timestamp, lines: Vec<String>) -> Self {
        Self {
            index,
            start,
            end,
            lines,
            modified: false,
            issues: BTreeSet::new(),
        }
    }

    /// Zero for reversed cues.
    pub fn duration_millis(&self) -> u64 {
        self.end.millis_since(self.start)
    }

    /// Record `issue` and mark the cue modified.
    pub fn tag(&mut self, issue: IssueTag) {
        self.issues.insert(issue);
        self.modified = true;
    }
}

/// Ordered cues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub cues: Vec<SubtitleCue>,
}

impl SubtitleTrack {
    pub fn new(cues: Vec<SubtitleCue>) -> Self {
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn modified_count(&self) -> usize {
        self.cues.iter().filter(|c| c.modified).count()
    }

    /// End of the last cue.
    pub fn end(&self) -> Timestamp {
        self.cues.iter().map(|c| c.end).max().unwrap_or_default()
    }

    /// `start < end` for every cue and no cue ends after the next starts.
    pub fn is_well_ordered(&self) -> bool {
        self.cues.iter().all(|c| c.start < c.end)
            && self.cues.windows(2).all(|w| w[0].end <= w[1].start)
    }

    /// Indices run 1..=n.
    pub fn is_contiguous(&self) -> bool {
        self.cues.iter().enumerate().all(|(i, c)| c.index == i + 1)
    }
}

/// A cue block that could not be turned into a cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedBlock {
    /// 1-based line number of the timing line.
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Summary of a repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub cues: usize,
    pub modified_cues: usize,
    /// Number of cues carrying each tag.
    pub issues: BTreeMap<IssueTag, usize>,
    /// How often each normalization rule fired.
    pub rule_hits: BTreeMap<String, usize>,
    pub validation_passes: usize,
    pub dropped: Vec<DroppedBlock>,
}

impl RepairReport {
    /// Nothing was changed or dropped.
    pub fn is_clean(&self) -> bool {
        self.modified_cues == 0 && self.dropped.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            return format!("{} cues, no changes", self.cues);
        }
        let issues: Vec<String> = self
            .issues
            .iter()
            .map(|(tag, count)| format!("{} x{}", tag, count))
            .collect();
        format!(
            "{} cues, {} modified ({}), {} dropped",
            self.cues,
            self.modified_cues,
            issues.join(", "),
            self.dropped.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub track: SubtitleTrack,
    pub report: RepairReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats_like_srt() {
        let ts = Timestamp::from_parts(1, 2, 3, 45).unwrap();
        assert_eq!(ts.to_string(), "01:02:03,045");
        assert_eq!(Timestamp::from_secs_f64(57.6).to_string(), "00:00:57,600");
        assert_eq!(Timestamp::from_secs_f64(-3.0), Timestamp::ZERO);
    }

    #[test]
    fn canonical_parse_is_strict() {
        assert_eq!(
            Timestamp::parse("01:00:04,100"),
            Timestamp::from_parts(1, 0, 4, 100)
        );
        assert_eq!(
            Timestamp::parse("100:00:00,000"),
            Timestamp::from_parts(100, 0, 0, 0)
        );
        for bad in ["1:00:04,100", "00:60:00,000", "00:00:04.100", "00:04,100", "00:00:04,10"] {
            assert_eq!(Timestamp::parse(bad), None, "{bad}");
        }
    }

    #[test]
    fn parse_round_trips_display() {
        let ts = Timestamp::from_millis(3_723_456);
        assert_eq!(Timestamp::parse(&ts.to_string()), Some(ts));
    }

    #[test]
    fn well_ordered_track() {
        let a = SubtitleCue::new(1, Timestamp::from_millis(0), Timestamp::from_millis(1000), vec![]);
        let b = SubtitleCue::new(2, Timestamp::from_millis(1000), Timestamp::from_millis(2000), vec![]);
        let track = SubtitleTrack::new(vec![a.clone(), b.clone()]);
        assert!(track.is_well_ordered());
        assert!(track.is_contiguous());

        let overlapping = SubtitleTrack::new(vec![b, a]);
        assert!(!overlapping.is_well_ordered());
    }

    #[test]
    fn tagging_marks_modified() {
        let mut cue = SubtitleCue::new(1, Timestamp::ZERO, Timestamp::from_millis(10), vec![]);
        assert!(!cue.modified);
        cue.tag(IssueTag::TooShort);
        assert!(cue.modified);
        assert!(cue.issues.contains(&IssueTag::TooShort));
    }
}
