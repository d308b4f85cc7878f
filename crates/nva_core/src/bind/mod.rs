//! Narration binding.
//!
//! Muxes a narration track under the assembled video. The narration starts
//! after a configurable offset; the output always lasts exactly as long as
//! the video, so long narration is cut and short narration is padded with
//! silence.

mod binder;
mod policy;

pub use binder::{bind_invocation, AudioVideoBinder, BindOutcome, BIND_OPERATION};
pub use policy::{BindPlan, DurationReconciliationPolicy, ReconcileAction};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use crate::inspect::InspectError;
use crate::merge::{ExecutionAttempt, GuardError};

#[derive(Error, Debug)]
pub enum BindError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Narration offset must be a non-negative number of seconds, got {0}")]
    InvalidOffset(f64),

    #[error("Cannot determine {0} duration")]
    UnknownDuration(&'static str),

    #[error("Cannot inspect bind input: {0}")]
    Inspect(#[from] InspectError),

    #[error("Bind failed: {message}")]
    Failed {
        message: String,
        attempt: Box<ExecutionAttempt<&'static str>>,
    },

    #[error("Bind cancelled")]
    Cancelled,

    #[error("Transcoding engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

impl From<GuardError> for BindError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Spawn(source) => BindError::EngineUnavailable(source),
            GuardError::Setup { operation, source } => BindError::Io { operation, source },
            GuardError::Poll(source) => BindError::io("poll engine process", source),
        }
    }
}

pub type BindResult<T> = Result<T, BindError>;
