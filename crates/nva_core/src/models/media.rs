//! Media descriptors produced by the inspector.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Start offsets smaller than this are treated as zero.
pub const START_OFFSET_EPSILON: f64 = 1e-6;

/// Inspection result for one media file.
///
/// Produced once per input and never re-derived. Merge outputs that are fed
/// back into a later merge are inspected as new inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub path: PathBuf,
    /// Container duration in seconds.
    pub duration_secs: f64,
    /// Video codec tag (`h264`, `hevc`, ...). Empty when no video stream was found.
    pub video_codec: String,
    /// Audio codec tag, `None` for silent clips.
    pub audio_codec: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Declared frame rate (`r_frame_rate`).
    pub nominal_fps: f64,
    /// Measured frame rate (`avg_frame_rate`).
    pub average_fps: f64,
    /// Start offset of the first video stream, in seconds.
    pub video_start_secs: f64,
    /// Start offset of the first audio stream, in seconds.
    pub audio_start_secs: f64,
    pub byte_size: u64,
}

impl MediaDescriptor {
    /// Create a descriptor with only the path set.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration_secs: 0.0,
            video_codec: String::new(),
            audio_codec: None,
            width: 0,
            height: 0,
            nominal_fps: 0.0,
            average_fps: 0.0,
            video_start_secs: 0.0,
            audio_start_secs: 0.0,
            byte_size: 0,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Nominal frame rate rounded to a whole number.
    pub fn rounded_fps(&self) -> u32 {
        self.nominal_fps.round().max(0.0) as u32
    }

    /// (video codec, audio codec) pair used for codec comparison.
    pub fn codec_pair(&self) -> (String, Option<String>) {
        (self.video_codec.clone(), self.audio_codec.clone())
    }

    /// Whether the metadata is complete enough to compare against other clips.
    pub fn has_reliable_metadata(&self) -> bool {
        !self.video_codec.is_empty()
            && self.width > 0
            && self.height > 0
            && self.nominal_fps > 0.0
            && self.nominal_fps.is_finite()
    }

    /// Whether either stream starts at a non-zero timestamp.
    pub fn has_start_offset(&self) -> bool {
        self.video_start_secs.abs() > START_OFFSET_EPSILON
            || self.audio_start_secs.abs() > START_OFFSET_EPSILON
    }

    /// Absolute difference between declared and measured frame rate.
    pub fn frame_rate_divergence(&self) -> f64 {
        if self.average_fps <= 0.0 || !self.average_fps.is_finite() {
            return 0.0;
        }
        (self.nominal_fps - self.average_fps).abs()
    }
}
