//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::models::OverlayMethod;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Output, work and log directories.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Clip merging: selection thresholds, budgets and encode profile.
    #[serde(default)]
    pub merge: MergeSettings,

    /// Subtitle timeline repair.
    #[serde(default)]
    pub subtitles: SubtitleSettings,

    /// Narration binding.
    #[serde(default)]
    pub bind: BindSettings,

    /// Subtitle overlay.
    #[serde(default)]
    pub overlay: OverlaySettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,
}

/// Path configuration for output, work files, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for assembled videos.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job work directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Keep the job work directory after a successful run.
    #[serde(default)]
    pub keep_intermediates: bool,
}

fn default_output_folder() -> String {
    "nva_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            keep_intermediates: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (engine output only shown on failure).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of engine output lines kept for the failure tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log engine arguments one per line.
    #[serde(default)]
    pub show_engine_args_pretty: bool,

    /// Log engine arguments as a JSON array.
    #[serde(default)]
    pub show_engine_args_json: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_engine_args_pretty: false,
            show_engine_args_json: false,
        }
    }
}

/// Merge configuration.
///
/// Each leaf strategy has its own time budget:
/// `clamp(ceil(total_mb / mb_per_minute), min_minutes, max_minutes)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Input count above which clips are merged in groups.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    /// Clips per group when batching.
    #[serde(default = "default_group_size")]
    pub group_size: usize,

    /// Total input size (MB) above which clips are merged in groups.
    #[serde(default = "default_volume_threshold_mb")]
    pub volume_threshold_mb: u64,

    /// Seconds between the graceful stop request and the forced stop.
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,

    /// Interval at which a running engine is polled.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_copy_mb_per_minute")]
    pub copy_mb_per_minute: f64,
    #[serde(default = "default_copy_min_minutes")]
    pub copy_min_minutes: u64,
    #[serde(default = "default_copy_max_minutes")]
    pub copy_max_minutes: u64,

    #[serde(default = "default_reencode_mb_per_minute")]
    pub reencode_mb_per_minute: f64,
    #[serde(default = "default_reencode_min_minutes")]
    pub reencode_min_minutes: u64,
    #[serde(default = "default_reencode_max_minutes")]
    pub reencode_max_minutes: u64,

    #[serde(default = "default_normalize_mb_per_minute")]
    pub normalize_mb_per_minute: f64,
    #[serde(default = "default_normalize_min_minutes")]
    pub normalize_min_minutes: u64,
    #[serde(default = "default_normalize_max_minutes")]
    pub normalize_max_minutes: u64,

    /// Output width for normalize + concat.
    #[serde(default = "default_target_width")]
    pub target_width: u32,

    /// Output height for normalize + concat.
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    /// Output frame rate for re-encode and normalize + concat.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// x264 constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,

    #[serde(default = "default_channels")]
    pub audio_channels: u32,
}

fn default_batch_threshold() -> usize {
    10
}

fn default_group_size() -> usize {
    10
}

fn default_volume_threshold_mb() -> u64 {
    2048
}

fn default_grace_window_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_copy_mb_per_minute() -> f64 {
    300.0
}

fn default_copy_min_minutes() -> u64 {
    1
}

fn default_copy_max_minutes() -> u64 {
    5
}

fn default_reencode_mb_per_minute() -> f64 {
    150.0
}

fn default_reencode_min_minutes() -> u64 {
    2
}

fn default_reencode_max_minutes() -> u64 {
    7
}

fn default_normalize_mb_per_minute() -> f64 {
    100.0
}

fn default_normalize_min_minutes() -> u64 {
    3
}

fn default_normalize_max_minutes() -> u64 {
    8
}

fn default_target_width() -> u32 {
    1280
}

fn default_target_height() -> u32 {
    720
}

fn default_target_fps() -> u32 {
    30
}

fn default_crf() -> u32 {
    23
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u32 {
    2
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            batch_threshold: default_batch_threshold(),
            group_size: default_group_size(),
            volume_threshold_mb: default_volume_threshold_mb(),
            grace_window_secs: default_grace_window_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            copy_mb_per_minute: default_copy_mb_per_minute(),
            copy_min_minutes: default_copy_min_minutes(),
            copy_max_minutes: default_copy_max_minutes(),
            reencode_mb_per_minute: default_reencode_mb_per_minute(),
            reencode_min_minutes: default_reencode_min_minutes(),
            reencode_max_minutes: default_reencode_max_minutes(),
            normalize_mb_per_minute: default_normalize_mb_per_minute(),
            normalize_min_minutes: default_normalize_min_minutes(),
            normalize_max_minutes: default_normalize_max_minutes(),
            target_width: default_target_width(),
            target_height: default_target_height(),
            target_fps: default_target_fps(),
            crf: default_crf(),
            preset: default_preset(),
            audio_codec: default_audio_codec(),
            audio_sample_rate: default_sample_rate(),
            audio_channels: default_channels(),
        }
    }
}

/// Subtitle repair configuration. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleSettings {
    /// Maximum normalization passes per timecode and validation passes per track.
    #[serde(default = "default_iteration_cap")]
    pub iteration_cap: usize,

    /// Duration given to cues whose end had to be rebuilt.
    #[serde(default = "default_cue_secs")]
    pub default_cue_secs: f64,

    #[serde(default = "default_min_cue_secs")]
    pub min_cue_secs: f64,

    #[serde(default = "default_max_cue_secs")]
    pub max_cue_secs: f64,

    /// Gap kept between a cue and the one it overlapped.
    #[serde(default = "default_min_gap_secs")]
    pub min_gap_secs: f64,

    /// Cues starting before this point are checked for implausible jumps.
    #[serde(default = "default_early_timeline_secs")]
    pub early_timeline_secs: f64,

    /// Duration above which an early cue is considered an implausible jump.
    #[serde(default = "default_jump_threshold_secs")]
    pub jump_threshold_secs: f64,

    /// Expected total length of the narration, in minutes.
    ///
    /// When set below 60, a `0H:MM:SS` timestamp that exceeds it is read as
    /// `00:MM:SS` if that fits. Unset means hours are always taken literally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_max_minutes: Option<f64>,

    /// Suffix appended to the file stem of a repaired subtitle.
    #[serde(default = "default_fixed_suffix")]
    pub fixed_suffix: String,
}

fn default_iteration_cap() -> usize {
    5
}

fn default_cue_secs() -> f64 {
    6.0
}

fn default_min_cue_secs() -> f64 {
    0.5
}

fn default_max_cue_secs() -> f64 {
    10.0
}

fn default_min_gap_secs() -> f64 {
    0.3
}

fn default_early_timeline_secs() -> f64 {
    120.0
}

fn default_jump_threshold_secs() -> f64 {
    300.0
}

fn default_fixed_suffix() -> String {
    "_fixed".to_string()
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            iteration_cap: default_iteration_cap(),
            default_cue_secs: default_cue_secs(),
            min_cue_secs: default_min_cue_secs(),
            max_cue_secs: default_max_cue_secs(),
            min_gap_secs: default_min_gap_secs(),
            early_timeline_secs: default_early_timeline_secs(),
            jump_threshold_secs: default_jump_threshold_secs(),
            expected_max_minutes: None,
            fixed_suffix: default_fixed_suffix(),
        }
    }
}

/// Narration binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindSettings {
    /// Seconds of silence before the narration starts.
    #[serde(default = "default_offset_secs")]
    pub offset_secs: f64,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u32,

    #[serde(default = "default_copy_mb_per_minute")]
    pub mb_per_minute: f64,
    #[serde(default = "default_copy_min_minutes")]
    pub min_minutes: u64,
    #[serde(default = "default_copy_max_minutes")]
    pub max_minutes: u64,
}

fn default_offset_secs() -> f64 {
    9.0
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

impl Default for BindSettings {
    fn default() -> Self {
        Self {
            offset_secs: default_offset_secs(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            mb_per_minute: default_copy_mb_per_minute(),
            min_minutes: default_copy_min_minutes(),
            max_minutes: default_copy_max_minutes(),
        }
    }
}

/// Subtitle overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// First method tried; later methods in the chain are fallbacks.
    #[serde(default)]
    pub method: OverlayMethod,

    /// Language tag for embedded subtitle streams.
    #[serde(default = "default_language")]
    pub language: String,

    /// Title for embedded subtitle streams.
    #[serde(default = "default_subtitle_title")]
    pub title: String,

    #[serde(default = "default_hardburn_minutes")]
    pub hardburn_minutes: u64,

    #[serde(default = "default_embed_minutes")]
    pub embed_minutes: u64,

    #[serde(default = "default_sidecar_minutes")]
    pub sidecar_minutes: u64,

    #[serde(default = "default_crf")]
    pub crf: u32,

    #[serde(default = "default_preset")]
    pub preset: String,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_subtitle_title() -> String {
    "Subtitles".to_string()
}

fn default_hardburn_minutes() -> u64 {
    3
}

fn default_embed_minutes() -> u64 {
    2
}

fn default_sidecar_minutes() -> u64 {
    1
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            method: OverlayMethod::default(),
            language: default_language(),
            title: default_subtitle_title(),
            hardburn_minutes: default_hardburn_minutes(),
            embed_minutes: default_embed_minutes(),
            sidecar_minutes: default_sidecar_minutes(),
            crf: default_crf(),
            preset: default_preset(),
        }
    }
}

/// External tool locations. Bare names are looked up in PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Configuration sections for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Merge,
    Subtitles,
    Bind,
    Overlay,
    Tools,
}

impl ConfigSection {
    /// Every section, in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Merge,
        ConfigSection::Subtitles,
        ConfigSection::Bind,
        ConfigSection::Overlay,
        ConfigSection::Tools,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Merge => "merge",
            ConfigSection::Subtitles => "subtitles",
            ConfigSection::Bind => "bind",
            ConfigSection::Overlay => "overlay",
            ConfigSection::Tools => "tools",
        }
    }

    /// Comment written above the section in a generated file.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Merge => "Clip merging: batching, time budgets and encode profile",
            ConfigSection::Subtitles => "Subtitle timeline repair",
            ConfigSection::Bind => "Narration binding",
            ConfigSection::Overlay => "Subtitle overlay (hardburn, embed, sidecar)",
            ConfigSection::Tools => "External tools",
        }
    }
}

impl Settings {
    /// Check cross-field constraints serde defaults cannot express.
    ///
    /// Returns one message per violated constraint.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let m = &self.merge;

        if m.group_size < 2 {
            problems.push("merge.group_size must be at least 2".to_string());
        }
        if m.batch_threshold == 0 {
            problems.push("merge.batch_threshold must be at least 1".to_string());
        }
        if m.poll_interval_ms == 0 {
            problems.push("merge.poll_interval_ms must be positive".to_string());
        }
        let budgets = [
            ("copy", m.copy_mb_per_minute, m.copy_min_minutes, m.copy_max_minutes),
            (
                "reencode",
                m.reencode_mb_per_minute,
                m.reencode_min_minutes,
                m.reencode_max_minutes,
            ),
            (
                "normalize",
                m.normalize_mb_per_minute,
                m.normalize_min_minutes,
                m.normalize_max_minutes,
            ),
            (
                "bind",
                self.bind.mb_per_minute,
                self.bind.min_minutes,
                self.bind.max_minutes,
            ),
        ];
        for (name, rate, min, max) in budgets {
            if rate <= 0.0 || !rate.is_finite() {
                problems.push(format!("{} budget rate must be positive", name));
            }
            if min == 0 || min > max {
                problems.push(format!(
                    "{} budget bounds must satisfy 0 < min <= max (got {}..{})",
                    name, min, max
                ));
            }
        }
        if m.target_width == 0 || m.target_height == 0 || m.target_fps == 0 {
            problems.push("merge target resolution and frame rate must be positive".to_string());
        }

        let s = &self.subtitles;
        if s.iteration_cap == 0 {
            problems.push("subtitles.iteration_cap must be at least 1".to_string());
        }
        if s.min_cue_secs <= 0.0 || s.min_cue_secs > s.max_cue_secs {
            problems.push("subtitles cue bounds must satisfy 0 < min <= max".to_string());
        }
        if s.default_cue_secs < s.min_cue_secs || s.default_cue_secs > s.max_cue_secs {
            problems.push("subtitles.default_cue_secs must lie within [min, max]".to_string());
        }
        if s.max_cue_secs >= s.jump_threshold_secs {
            problems.push("subtitles.max_cue_secs must be below jump_threshold_secs".to_string());
        }
        if s.min_gap_secs < 0.0 {
            problems.push("subtitles.min_gap_secs must not be negative".to_string());
        }
        if let Some(bound) = s.expected_max_minutes {
            if bound <= 0.0 {
                problems.push("subtitles.expected_max_minutes must be positive".to_string());
            }
        }

        if self.bind.offset_secs < 0.0 {
            problems.push("bind.offset_secs must not be negative".to_string());
        }

        problems
    }
}
