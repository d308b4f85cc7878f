//! Engine arguments for each overlay method.

use std::io;
use std::path::Path;

use crate::config::OverlaySettings;
use crate::engine::EngineInvocation;
use crate::merge::AttemptScope;
use crate::models::OverlayMethod;

/// Build the invocation for `method`.
///
/// Hardburn reads the subtitle from a copy inside `scope`, so the filter
/// never sees the caller's path.
pub fn overlay_invocation(
    method: OverlayMethod,
    video: &Path,
    subtitle: &Path,
    output: &Path,
    settings: &OverlaySettings,
    scope: &mut AttemptScope,
) -> io::Result<EngineInvocation> {
    let mut args = vec!["-i".to_string(), video.display().to_string()];
    match method {
        OverlayMethod::Hardburn => {
            let safe = scope.safe_copy(subtitle, "overlay_subs")?;
            args.extend([
                "-vf".to_string(),
                format!("subtitles='{}'", escape_filter_path(&safe)),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-crf".to_string(),
                settings.crf.to_string(),
                "-preset".to_string(),
                settings.preset.clone(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:a".to_string(),
                "copy".to_string(),
            ]);
        }
        OverlayMethod::Embed => {
            args.extend([
                "-i".to_string(),
                subtitle.display().to_string(),
                "-map".to_string(),
                "0".to_string(),
                "-map".to_string(),
                "1:0".to_string(),
                "-c".to_string(),
                "copy".to_string(),
                "-c:s".to_string(),
                "mov_text".to_string(),
                "-metadata:s:s:0".to_string(),
                format!("language={}", settings.language),
                "-metadata:s:s:0".to_string(),
                format!("title={}", settings.title),
            ]);
        }
        OverlayMethod::Sidecar => {
            args.extend(["-c".to_string(), "copy".to_string()]);
        }
    }
    args.push(output.display().to_string());

    Ok(EngineInvocation::new(
        format!("{} subtitles", method),
        args,
        output,
    ))
}

/// Escape a path for use inside a quoted filter argument.
fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.display().to_string().chars() {
        match c {
            '\\' => escaped.push('/'),
            '\'' => escaped.push_str("'\\''"),
            ':' => escaped.push_str("\\:"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Where the sidecar subtitle goes: next to `output`, keeping the
/// subtitle's own extension (`srt` when it has none).
pub fn sidecar_path(output: &Path, subtitle: &Path) -> std::path::PathBuf {
    let ext = subtitle
        .extension()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| std::ffi::OsStr::new("srt"));
    output.with_extension(ext)
}
