//! Attaching subtitles to the assembled video.
//!
//! Methods form a fallback chain starting at the configured one:
//! hardburn, then an embedded soft track, then a sidecar file next to a
//! stream-copied video. Each method is one supervised engine attempt.

mod command;

pub use command::{overlay_invocation, sidecar_path};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::OverlaySettings;
use crate::engine::{EngineError, TranscodeEngine};
use crate::logging::JobLogger;
use crate::merge::{
    drive, EscalationState, ExecutionAttempt, ExecutionGuard, FatalReason, GuardError,
    GuardOptions,
};
use crate::models::{ErrorClass, OverlayMethod};

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("All overlay methods failed; last was {method} ({class} error): {message}")]
    ChainExhausted {
        method: OverlayMethod,
        class: ErrorClass,
        message: String,
        attempts: Vec<ExecutionAttempt<OverlayMethod>>,
    },

    #[error("Overlay cancelled during {method}")]
    Cancelled {
        method: OverlayMethod,
        attempts: Vec<ExecutionAttempt<OverlayMethod>>,
    },

    #[error("Transcoding engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl OverlayError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

impl From<GuardError> for OverlayError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Spawn(source) => OverlayError::EngineUnavailable(source),
            GuardError::Setup { operation, source } => OverlayError::Io { operation, source },
            GuardError::Poll(source) => OverlayError::io("poll engine process", source),
        }
    }
}

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug, Clone, Serialize)]
pub struct OverlayOutcome {
    pub output: PathBuf,
    pub method: OverlayMethod,
    /// Subtitle file written next to the output by the sidecar method.
    pub sidecar: Option<PathBuf>,
    pub attempts: Vec<ExecutionAttempt<OverlayMethod>>,
}

pub struct SubtitleOverlay<'a> {
    engine: &'a dyn TranscodeEngine,
    settings: OverlaySettings,
    guard_options: GuardOptions,
    work_dir: PathBuf,
    logger: Option<&'a JobLogger>,
}

impl<'a> SubtitleOverlay<'a> {
    pub fn new(
        engine: &'a dyn TranscodeEngine,
        settings: &OverlaySettings,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            settings: settings.clone(),
            guard_options: GuardOptions::default(),
            work_dir: work_dir.into(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<&'a JobLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_guard_options(mut self, options: GuardOptions) -> Self {
        self.guard_options = options;
        self
    }

    /// Start the chain at `method` instead of the configured one.
    pub fn with_method(mut self, method: OverlayMethod) -> Self {
        self.settings.method = method;
        self
    }

    fn budget(&self, method: OverlayMethod) -> Duration {
        let minutes = match method {
            OverlayMethod::Hardburn => self.settings.hardburn_minutes,
            OverlayMethod::Embed => self.settings.embed_minutes,
            OverlayMethod::Sidecar => self.settings.sidecar_minutes,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn overlay(&self, video: &Path, subtitle: &Path, output: &Path) -> OverlayResult<OverlayOutcome> {
        for input in [video, subtitle] {
            if !input.is_file() {
                return Err(OverlayError::InputNotFound(input.to_path_buf()));
            }
        }
        for dir in [Some(self.work_dir.as_path()), output.parent()].into_iter().flatten() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| OverlayError::io(format!("create {}", dir.display()), e))?;
            }
        }

        let chain = self.settings.method.chain_from();
        tracing::info!(
            "Overlay chain: {}",
            chain.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(" -> ")
        );

        let guard = ExecutionGuard::new(self.engine, &self.work_dir, self.guard_options)
            .with_logger(self.logger);
        let run = drive(&chain, |method| {
            guard.run(method, self.budget(method), |scope| {
                overlay_invocation(method, video, subtitle, output, &self.settings, scope)
            })
        })?;

        match (run.state, run.succeeded_with()) {
            (EscalationState::Succeeded { .. }, Some(method)) => {
                let sidecar = if method == OverlayMethod::Sidecar {
                    let target = sidecar_path(output, subtitle);
                    fs::copy(subtitle, &target).map_err(|e| {
                        OverlayError::io(format!("copy subtitles to {}", target.display()), e)
                    })?;
                    Some(target)
                } else {
                    None
                };
                tracing::info!("Subtitles attached with {}", method);
                Ok(OverlayOutcome {
                    output: output.to_path_buf(),
                    method,
                    sidecar,
                    attempts: run.attempts,
                })
            }
            (EscalationState::Fatal { reason: FatalReason::Cancelled, .. }, _) => {
                Err(OverlayError::Cancelled {
                    method: run.last_attempt().map_or(self.settings.method, |a| a.strategy),
                    attempts: run.attempts,
                })
            }
            _ => {
                let (method, class, message) = match run.last_attempt() {
                    Some(last) => (
                        last.strategy,
                        last.error_class.unwrap_or(ErrorClass::Unknown),
                        last.message.clone().unwrap_or_default(),
                    ),
                    None => (
                        self.settings.method,
                        ErrorClass::Unknown,
                        "no method attempted".to_string(),
                    ),
                };
                Err(OverlayError::ChainExhausted {
                    method,
                    class,
                    message,
                    attempts: run.attempts,
                })
            }
        }
    }
}
