//! Media inspection using `ffprobe -show_format -show_streams`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use super::{InspectError, InspectResult, MediaInspector};
use crate::models::MediaDescriptor;

/// Inspector that shells out to `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    program: String,
}

impl FfprobeInspector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaInspector for FfprobeInspector {
    fn inspect(&self, path: &Path) -> InspectResult<MediaDescriptor> {
        if !path.exists() {
            return Err(InspectError::NotFound(path.to_path_buf()));
        }

        tracing::debug!("Probing media: {}", path.display());

        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| InspectError::spawn(&self.program, e))?;

        if !output.status.success() {
            return Err(InspectError::ToolFailed {
                tool: self.program.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            InspectError::InvalidOutput {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Ok(parse_probe_json(&json, path, file_size))
    }
}

/// Build a descriptor from ffprobe JSON.
///
/// Missing fields are left at zero/empty; the compatibility analyzer treats
/// such descriptors as unknown rather than failing here.
pub(crate) fn parse_probe_json(json: &Value, path: &Path, file_size: u64) -> MediaDescriptor {
    let mut descriptor = MediaDescriptor::new(PathBuf::from(path));

    let format = json.get("format");
    descriptor.duration_secs = format
        .and_then(|f| number_field(f, "duration"))
        .unwrap_or(0.0);
    descriptor.byte_size = format
        .and_then(|f| number_field(f, "size"))
        .map(|s| s as u64)
        .filter(|s| *s > 0)
        .unwrap_or(file_size);

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);

    let first_of = |kind: &str| {
        streams
            .iter()
            .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some(kind))
    };

    if let Some(video) = first_of("video") {
        descriptor.video_codec = string_field(video, "codec_name").unwrap_or_default();
        descriptor.width = video.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
        descriptor.height = video.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;
        descriptor.nominal_fps = video
            .get("r_frame_rate")
            .and_then(|r| r.as_str())
            .and_then(parse_rational)
            .unwrap_or(0.0);
        descriptor.average_fps = video
            .get("avg_frame_rate")
            .and_then(|r| r.as_str())
            .and_then(parse_rational)
            .unwrap_or(0.0);
        descriptor.video_start_secs = number_field(video, "start_time").unwrap_or(0.0);

        if descriptor.duration_secs <= 0.0 {
            descriptor.duration_secs = number_field(video, "duration").unwrap_or(0.0);
        }
    }

    if let Some(audio) = first_of("audio") {
        descriptor.audio_codec = string_field(audio, "codec_name");
        descriptor.audio_start_secs = number_field(audio, "start_time").unwrap_or(0.0);

        if descriptor.duration_secs <= 0.0 {
            descriptor.duration_secs = number_field(audio, "duration").unwrap_or(0.0);
        }
    }

    descriptor
}

/// Parse an ffprobe rational such as `30000/1001`. `0/0` yields `None`.
pub(crate) fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = match value.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (value.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let rate = num / den;
    rate.is_finite().then_some(rate)
}

/// ffprobe reports most numbers as strings.
fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
