//! Subtitle timeline repair.
//!
//! Parsing is tolerant: timecodes are rewritten toward `HH:MM:SS,mmm` by an
//! ordered set of [`TimecodeRule`]s, then the timeline is validated until a
//! pass finds nothing to fix. Every change is tagged on the cue it touched.

mod error;
mod parser;
mod preflight;
mod repair;
mod rules;
mod types;
mod validate;
mod writer;

pub use error::{ParseError, PreflightError, SubtitleError, SubtitleResult};
pub use parser::{parse, split_timing_line, ParsedSubtitles, RawCue};
pub use preflight::{check_subtitle_file, SubtitleFileInfo, SubtitleFormat, MAX_SUBTITLE_BYTES};
pub use repair::{RepairEngine, RepairedFile};
pub use rules::{
    default_rules, FieldWidth, FractionSeparator, FractionWidth, HourArtifact, MinutesCarry,
    MissingFraction, MissingHour, NormalizedToken, Normalizer, RuleContext, SecondsCarry,
    TimecodeRule,
};
pub use types::{
    DroppedBlock, IssueTag, RepairOutcome, RepairReport, SubtitleCue, SubtitleTrack, Timestamp,
};
pub use validate::{count_anomalies, validate_pass, TimelineLimits};
pub use writer::{to_srt, write_srt};
