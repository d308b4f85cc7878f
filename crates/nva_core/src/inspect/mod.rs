//! Media inspection.
//!
//! The inspector is an external collaborator: it reads container metadata
//! and produces one [`MediaDescriptor`] per file. Inspection failures are
//! data, not fatal errors; the compatibility analyzer turns them into a
//! maximally unsafe report.

mod ffprobe;

pub use ffprobe::FfprobeInspector;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::MediaDescriptor;

/// Errors reading media metadata.
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Unreadable metadata for '{}': {message}", path.display())]
    InvalidOutput { path: PathBuf, message: String },
}

impl InspectError {
    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }
}

/// Result type for inspection.
pub type InspectResult<T> = Result<T, InspectError>;

/// Reads container and stream metadata.
pub trait MediaInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> InspectResult<MediaDescriptor>;
}

/// Outcome of inspecting one input.
#[derive(Debug)]
pub struct Inspection {
    pub path: PathBuf,
    /// Size on disk, known even when inspection failed.
    pub byte_size: u64,
    pub outcome: InspectResult<MediaDescriptor>,
}

impl Inspection {
    pub fn descriptor(&self) -> Option<&MediaDescriptor> {
        self.outcome.as_ref().ok()
    }
}

/// Inspect every path, in order.
pub fn inspect_all(inspector: &dyn MediaInspector, paths: &[PathBuf]) -> Vec<Inspection> {
    paths
        .iter()
        .map(|path| {
            let byte_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            let outcome = inspector.inspect(path);
            if let Err(ref e) = outcome {
                tracing::warn!("Inspection failed for {}: {}", path.display(), e);
            }
            Inspection {
                path: path.clone(),
                byte_size,
                outcome,
            }
        })
        .collect()
}
