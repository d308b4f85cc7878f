//! Compatibility report types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a single input could not be compared with the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileIssue {
    /// The inspector failed on this file.
    Unreadable { reason: String },
    /// The inspector succeeded but the metadata is incomplete.
    Unknown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFinding {
    pub path: PathBuf,
    pub issue: FileIssue,
}

/// Aggregate compatibility of a set of clips.
///
/// Read-only once produced; the selector only consults the four flags and
/// the input totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub frame_rate_mismatch: bool,
    pub resolution_mismatch: bool,
    pub codec_mismatch: bool,
    pub timing_anomaly: bool,
    /// Per-file problems, in input order.
    pub findings: Vec<FileFinding>,
    pub input_count: usize,
    pub total_bytes: u64,
    /// Distinct rounded frame rates among readable inputs.
    pub frame_rates: Vec<u32>,
    /// Distinct resolutions among readable inputs.
    pub resolutions: Vec<(u32, u32)>,
    /// Distinct (video, audio) codec pairs among readable inputs.
    pub codecs: Vec<(String, Option<String>)>,
}

impl CompatibilityReport {
    /// Only frame-rate conversion or timestamp rebuilding can fix these inputs.
    pub fn requires_normalization(&self) -> bool {
        self.frame_rate_mismatch || self.timing_anomaly
    }

    /// Inputs differ in codec or size but not in timing.
    pub fn requires_reencode(&self) -> bool {
        self.codec_mismatch || self.resolution_mismatch
    }

    /// Safe to concatenate without touching the streams.
    pub fn is_uniform(&self) -> bool {
        !self.requires_normalization() && !self.requires_reencode()
    }

    /// Whether any file was unreadable or had unknown metadata.
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let mut flags = Vec::new();
        if self.frame_rate_mismatch {
            flags.push("frame rate");
        }
        if self.resolution_mismatch {
            flags.push("resolution");
        }
        if self.codec_mismatch {
            flags.push("codec");
        }
        if self.timing_anomaly {
            flags.push("timing");
        }
        let flags = if flags.is_empty() {
            "uniform".to_string()
        } else {
            format!("mismatch: {}", flags.join(", "))
        };
        format!(
            "{} inputs, {:.1} MB, {}{}",
            self.input_count,
            self.total_megabytes(),
            flags,
            if self.has_findings() {
                format!(", {} unreadable/unknown", self.findings.len())
            } else {
                String::new()
            }
        )
    }
}
