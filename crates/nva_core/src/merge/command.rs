//! Engine arguments for each leaf merge strategy.

use std::io;
use std::path::{Path, PathBuf};

use super::scope::AttemptScope;
use crate::config::MergeSettings;
use crate::engine::EngineInvocation;
use crate::models::MergeStrategy;

/// Output format for the re-encoding strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
    pub audio_codec: String,
    pub sample_rate: u32,
    pub channels: u32,
}

impl From<&MergeSettings> for EncodeProfile {
    fn from(s: &MergeSettings) -> Self {
        Self {
            width: s.target_width,
            height: s.target_height,
            fps: s.target_fps,
            crf: s.crf,
            preset: s.preset.clone(),
            audio_codec: s.audio_codec.clone(),
            sample_rate: s.audio_sample_rate,
            channels: s.audio_channels,
        }
    }
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::from(&MergeSettings::default())
    }
}

/// Build the invocation for `strategy`.
///
/// Concat-demuxer strategies write their manifest into `scope`. Batched is
/// not a leaf and is rejected.
pub fn build_invocation(
    strategy: MergeStrategy,
    inputs: &[PathBuf],
    output: &Path,
    profile: &EncodeProfile,
    scope: &mut AttemptScope,
) -> io::Result<EngineInvocation> {
    let args = match strategy {
        MergeStrategy::StreamCopy => {
            let manifest = scope.write_manifest(inputs)?;
            stream_copy_args(&manifest, output)
        }
        MergeStrategy::Reencode => {
            let manifest = scope.write_manifest(inputs)?;
            reencode_args(&manifest, output, profile)
        }
        MergeStrategy::NormalizeConcat => normalize_args(inputs, output, profile),
        MergeStrategy::Batched => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "batched merge has no single engine invocation",
            ))
        }
    };

    Ok(EngineInvocation::new(
        format!("{} of {} clips", strategy, inputs.len()),
        args,
        output,
    ))
}

fn concat_input(manifest: &Path) -> Vec<String> {
    vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-probesize".into(),
        "50M".into(),
        "-analyzeduration".into(),
        "50M".into(),
        "-i".into(),
        manifest.display().to_string(),
    ]
}

fn stream_copy_args(manifest: &Path, output: &Path) -> Vec<String> {
    let mut args = concat_input(manifest);
    args.extend(
        [
            "-c",
            "copy",
            "-avoid_negative_ts",
            "make_zero",
            "-fflags",
            "+genpts+igndts",
            "-max_muxing_queue_size",
            "1024",
        ]
        .map(String::from),
    );
    args.push(output.display().to_string());
    args
}

fn reencode_args(manifest: &Path, output: &Path, profile: &EncodeProfile) -> Vec<String> {
    let mut args = concat_input(manifest);
    args.extend(video_encode_args(profile));
    args.extend([
        "-r".to_string(),
        profile.fps.to_string(),
        "-g".to_string(),
        (profile.fps * 2).to_string(),
        "-vsync".to_string(),
        "cfr".to_string(),
        "-c:a".to_string(),
        profile.audio_codec.clone(),
        "-ar".to_string(),
        profile.sample_rate.to_string(),
        "-ac".to_string(),
        profile.channels.to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        "-fflags".to_string(),
        "+genpts".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args.push(output.display().to_string());
    args
}

/// Every input decoded separately, scaled into the target frame, padded and
/// converted to the target rate before a video-only concat.
fn normalize_args(inputs: &[PathBuf], output: &Path, profile: &EncodeProfile) -> Vec<String> {
    let mut args = Vec::with_capacity(inputs.len() * 2 + 16);
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(normalize_filter(inputs.len(), profile));
    args.extend(["-map".to_string(), "[outv]".to_string()]);
    args.extend(video_encode_args(profile));
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.display().to_string(),
    ]);
    args
}

fn normalize_filter(count: usize, profile: &EncodeProfile) -> String {
    let (w, h, r) = (profile.width, profile.height, profile.fps);
    let mut graph = String::new();
    let mut labels = String::new();
    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,fps={r},setsar=1[v{i}];"
        ));
        labels.push_str(&format!("[v{i}]"));
    }
    graph.push_str(&format!("{labels}concat=n={count}:v=1:a=0[outv]"));
    graph
}

fn video_encode_args(profile: &EncodeProfile) -> Vec<String> {
    vec![
        "-c:v".into(),
        "libx264".into(),
        "-crf".into(),
        profile.crf.to_string(),
        "-preset".into(),
        profile.preset.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ]
}
