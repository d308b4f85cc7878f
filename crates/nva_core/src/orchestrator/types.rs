//! Core types for the assembly pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bind::BindPlan;
use crate::config::Settings;
use crate::engine::TranscodeEngine;
use crate::inspect::MediaInspector;
use crate::logging::JobLogger;
use crate::merge::GuardOptions;
use crate::models::{MergeStrategy, OverlayMethod};
use crate::subtitles::{RepairReport, SubtitleFormat};

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// What to assemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyJob {
    /// Clips in playback order.
    pub clips: Vec<PathBuf>,
    /// Raw subtitle track, repaired before it is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<PathBuf>,
    /// Narration audio bound under the video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<PathBuf>,
    pub output: PathBuf,
    /// Overrides the configured narration offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_offset_secs: Option<f64>,
    /// Overrides the configured first overlay method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_method: Option<OverlayMethod>,
}

impl AssemblyJob {
    pub fn new(clips: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            clips,
            subtitle: None,
            narration: None,
            output: output.into(),
            narration_offset_secs: None,
            overlay_method: None,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<PathBuf>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_narration(mut self, narration: impl Into<PathBuf>) -> Self {
        self.narration = Some(narration.into());
        self
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    pub job: AssemblyJob,
    pub settings: Settings,
    pub job_name: String,
    /// Job-specific working directory (under temp_root).
    pub work_dir: PathBuf,
    pub logger: Arc<JobLogger>,
    pub inspector: Arc<dyn MediaInspector>,
    pub engine: Arc<dyn TranscodeEngine>,
    guard_options: Option<GuardOptions>,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    pub fn new(
        job: AssemblyJob,
        settings: Settings,
        job_name: impl Into<String>,
        work_dir: PathBuf,
        logger: Arc<JobLogger>,
        inspector: Arc<dyn MediaInspector>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            job,
            settings,
            job_name: job_name.into(),
            work_dir,
            logger,
            inspector,
            engine,
            guard_options: None,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Replace the supervision timing derived from the merge settings.
    pub fn with_guard_options(mut self, options: GuardOptions) -> Self {
        self.guard_options = Some(options);
        self
    }

    pub fn guard_options(&self) -> GuardOptions {
        self.guard_options
            .unwrap_or_else(|| GuardOptions::from(&self.settings.merge))
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Path for an intermediate file inside the work directory.
    pub fn work_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Steps add their own section and never overwrite another step's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<SubtitlesOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<BindOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeOutput>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Latest video produced so far.
    pub fn current_video(&self) -> Option<&Path> {
        self.bind
            .as_ref()
            .map(|b| b.video.as_path())
            .or_else(|| self.overlay.as_ref().map(|o| o.video.as_path()))
            .or_else(|| self.merge.as_ref().map(|m| m.video.as_path()))
    }

    /// Subtitle file that has to ship next to the output.
    pub fn sidecar(&self) -> Option<&Path> {
        self.overlay.as_ref().and_then(|o| o.sidecar.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutput {
    pub video: PathBuf,
    pub strategy: MergeStrategy,
    /// Fallback chain as selected, e.g. `[stream copy -> re-encode]`.
    pub chain: String,
    pub attempts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitlesOutput {
    pub source: PathBuf,
    /// File attached by the overlay step.
    pub path: PathBuf,
    pub format: SubtitleFormat,
    /// Present when the timeline was repaired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<RepairReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayOutput {
    pub video: PathBuf,
    pub method: OverlayMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<PathBuf>,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindOutput {
    pub video: PathBuf,
    pub plan: BindPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutput {
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<PathBuf>,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Step was skipped (nothing to do, not an error).
    Skipped(String),
}
