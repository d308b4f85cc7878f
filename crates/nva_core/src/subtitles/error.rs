//! Subtitle error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The input could not be read as subtitles at all.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No timecode lines found")]
    NoTimecodes,

    #[error("No usable cues ({dropped} blocks had unreadable timecodes)")]
    NoUsableCues { dropped: usize },
}

/// Pre-flight rejection of a subtitle file.
#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("Subtitle file not found: {0}")]
    NotFound(PathBuf),

    #[error("Subtitle file is empty: {0}")]
    Empty(PathBuf),

    #[error("Subtitle file {path} is {size} bytes, limit is {limit}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Unsupported subtitle format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("Subtitle parse failure: {0}")]
    Parse(#[from] ParseError),

    /// Validation passes kept finding anomalies.
    #[error("Subtitle timeline unrepairable: {remaining} anomalies left after {passes} passes")]
    TimelineUnrepairable { passes: usize, remaining: usize },

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SubtitleError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type SubtitleResult<T> = Result<T, SubtitleError>;
