//! Subtitle file checks before any processing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::PreflightError;

/// Largest subtitle file accepted.
pub const MAX_SUBTITLE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Ssa,
}

impl SubtitleFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            "ass" => Some(Self::Ass),
            "ssa" => Some(Self::Ssa),
            _ => None,
        }
    }

    /// Whether the timeline repair engine can read this format.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::Srt | Self::Vtt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleFileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub format: SubtitleFormat,
}

/// Check that `path` exists, is non-empty, at most [`MAX_SUBTITLE_BYTES`]
/// and has a known subtitle extension.
pub fn check_subtitle_file(path: &Path) -> Result<SubtitleFileInfo, PreflightError> {
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(PreflightError::NotFound(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PreflightError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(PreflightError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let size = metadata.len();
    if size == 0 {
        return Err(PreflightError::Empty(path.to_path_buf()));
    }
    if size > MAX_SUBTITLE_BYTES {
        return Err(PreflightError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_SUBTITLE_BYTES,
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let format = SubtitleFormat::from_extension(&extension).ok_or_else(|| {
        PreflightError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }
    })?;

    Ok(SubtitleFileInfo {
        path: path.to_path_buf(),
        size,
        format,
    })
}
