//! The subtitle timeline repair engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{SubtitleError, SubtitleResult};
use super::parser::{parse, ParsedSubtitles};
use super::preflight::check_subtitle_file;
use super::rules::{Normalizer, RuleContext};
use super::types::{IssueTag, RepairOutcome, RepairReport, SubtitleCue, SubtitleTrack};
use super::validate::{count_anomalies, validate_pass, TimelineLimits};
use super::writer::write_srt;
use crate::config::SubtitleSettings;

/// A repaired subtitle written to disk.
#[derive(Debug, Clone)]
pub struct RepairedFile {
    pub source: PathBuf,
    pub path: PathBuf,
    pub outcome: RepairOutcome,
}

pub struct RepairEngine {
    normalizer: Normalizer,
    limits: TimelineLimits,
    iteration_cap: usize,
    fixed_suffix: String,
}

impl RepairEngine {
    pub fn new(settings: &SubtitleSettings) -> Self {
        let context = RuleContext::with_expected_max_minutes(settings.expected_max_minutes);
        Self {
            normalizer: Normalizer::new(context, settings.iteration_cap),
            limits: TimelineLimits::from(settings),
            iteration_cap: settings.iteration_cap.max(1),
            fixed_suffix: settings.fixed_suffix.clone(),
        }
    }

    pub fn limits(&self) -> &TimelineLimits {
        &self.limits
    }

    /// Parse without timeline validation. Cues keep their normalization tags
    /// and are numbered in file order.
    pub fn parse(&self, text: &str) -> SubtitleResult<SubtitleTrack> {
        let parsed = parse(text, &self.normalizer)?;
        Ok(build_track(parsed.cues).0)
    }

    pub fn parse_file(&self, path: &Path) -> SubtitleResult<SubtitleTrack> {
        check_subtitle_file(path)?;
        let text = fs::read_to_string(path).map_err(|e| SubtitleError::io(path, e))?;
        self.parse(&text)
    }

    /// Normalize, validate and renumber.
    pub fn repair(&self, text: &str) -> SubtitleResult<RepairOutcome> {
        let parsed = parse(text, &self.normalizer)?;
        let ParsedSubtitles {
            cues,
            dropped,
            rule_hits,
        } = parsed;
        let (mut track, raw_indices) = build_track(cues);

        let mut passes = 0;
        while passes < self.iteration_cap {
            passes += 1;
            if validate_pass(&mut track.cues, &self.limits) == 0 {
                break;
            }
        }
        let remaining = count_anomalies(&track.cues, &self.limits);
        if remaining > 0 {
            return Err(SubtitleError::TimelineUnrepairable { passes, remaining });
        }

        for (cue, raw) in track.cues.iter_mut().zip(raw_indices) {
            if raw != Some(cue.index) {
                cue.tag(IssueTag::Renumbered);
            }
        }

        let mut report = RepairReport {
            cues: track.len(),
            modified_cues: track.modified_count(),
            validation_passes: passes,
            dropped,
            ..RepairReport::default()
        };
        for cue in &track.cues {
            for issue in &cue.issues {
                *report.issues.entry(*issue).or_insert(0) += 1;
            }
        }
        let mut hits: BTreeMap<String, usize> = BTreeMap::new();
        for name in rule_hits {
            *hits.entry(name.to_string()).or_insert(0) += 1;
        }
        report.rule_hits = hits;

        tracing::info!("Subtitle repair: {}", report.summary());
        Ok(RepairOutcome { track, report })
    }

    /// Path the repaired copy of `source` is written to:
    /// `<stem><suffix>.srt` next to it.
    pub fn fixed_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitles".to_string());
        source.with_file_name(format!("{}{}.srt", stem, self.fixed_suffix))
    }

    /// Pre-flight, repair and write `<stem>_fixed.srt` next to `source`.
    pub fn repair_file(&self, source: &Path) -> SubtitleResult<RepairedFile> {
        self.repair_file_to(source, &self.fixed_path(source))
    }

    /// Like [`repair_file`](Self::repair_file) with an explicit target.
    pub fn repair_file_to(&self, source: &Path, target: &Path) -> SubtitleResult<RepairedFile> {
        check_subtitle_file(source)?;
        let text = fs::read_to_string(source).map_err(|e| SubtitleError::io(source, e))?;
        let outcome = self.repair(&text)?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SubtitleError::io(parent, e))?;
        }
        write_srt(&outcome.track, target).map_err(|e| SubtitleError::io(target, e))?;
        tracing::info!("Wrote repaired subtitles to {}", target.display());

        Ok(RepairedFile {
            source: source.to_path_buf(),
            path: target.to_path_buf(),
            outcome,
        })
    }
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new(&SubtitleSettings::default())
    }
}

/// Number cues 1..n in file order; returns the raw indices alongside.
fn build_track(cues: Vec<super::parser::RawCue>) -> (SubtitleTrack, Vec<Option<usize>>) {
    let mut raw_indices = Vec::with_capacity(cues.len());
    let cues = cues
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            raw_indices.push(raw.raw_index);
            let mut cue = SubtitleCue::new(i + 1, raw.start, raw.end, raw.lines);
            for issue in raw.issues {
                cue.tag(issue);
            }
            cue
        })
        .collect();
    (SubtitleTrack::new(cues), raw_indices)
}
