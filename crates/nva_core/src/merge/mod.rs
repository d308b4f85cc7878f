//! Clip merging.
//!
//! [`ClipMerger`] inspects the inputs, analyzes their compatibility, selects
//! a fallback chain and escalates along it, one supervised engine attempt
//! at a time. Large inputs are merged in groups first (see [`partition`]).
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use nva_core::config::MergeSettings;
//! use nva_core::engine::FfmpegEngine;
//! use nva_core::inspect::FfprobeInspector;
//! use nva_core::merge::ClipMerger;
//!
//! let inspector = FfprobeInspector::new("ffprobe");
//! let engine = FfmpegEngine::new("ffmpeg");
//! let merger = ClipMerger::new(&inspector, &engine, &MergeSettings::default(), "/tmp/nva-work");
//! let clips = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
//! let outcome = merger.merge(&clips, "merged.mp4".as_ref()).unwrap();
//! println!("merged with {}", outcome.strategy);
//! ```

mod batch;
mod budget;
mod command;
mod escalation;
mod guard;
mod scope;
mod strategy;

pub use batch::partition;
pub use budget::{BudgetTable, TimeBudget};
pub use command::{build_invocation, EncodeProfile};
pub use escalation::{
    drive, transition, EscalationEvent, EscalationRun, EscalationState, FatalReason,
};
pub use guard::{ExecutionAttempt, ExecutionGuard, GuardError, GuardOptions};
pub use scope::{unique_token, AttemptScope};
pub use strategy::{FallbackChain, SelectorLimits, StrategySelector};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::compat::{analyze, CompatibilityReport};
use crate::config::MergeSettings;
use crate::engine::{EngineError, TranscodeEngine};
use crate::inspect::{inspect_all, Inspection, MediaInspector};
use crate::logging::JobLogger;
use crate::models::{ErrorClass, MergeStrategy};

/// Errors from a merge request.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No input clips given")]
    NoInputs,

    #[error("Input clip not found: {0}")]
    InputNotFound(PathBuf),

    /// Every strategy in the chain failed.
    #[error("All merge strategies failed; last was {strategy} ({class} error): {message}")]
    ChainExhausted {
        strategy: MergeStrategy,
        class: ErrorClass,
        message: String,
        attempts: Vec<ExecutionAttempt<MergeStrategy>>,
    },

    /// The engine was terminated from outside during `strategy`.
    #[error("Merge cancelled during {strategy}")]
    Cancelled {
        strategy: MergeStrategy,
        attempts: Vec<ExecutionAttempt<MergeStrategy>>,
    },

    #[error("Transcoding engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("Batch group {index} failed: {source}")]
    Group {
        index: usize,
        #[source]
        source: Box<MergeError>,
    },

    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl MergeError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Attempts made before the error, when the error came from escalation.
    pub fn attempts(&self) -> &[ExecutionAttempt<MergeStrategy>] {
        match self {
            MergeError::ChainExhausted { attempts, .. } | MergeError::Cancelled { attempts, .. } => {
                attempts
            }
            MergeError::Group { source, .. } => source.attempts(),
            _ => &[],
        }
    }
}

impl From<GuardError> for MergeError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Spawn(source) => MergeError::EngineUnavailable(source),
            GuardError::Setup { operation, source } => MergeError::Io { operation, source },
            GuardError::Poll(source) => MergeError::io("poll engine process", source),
        }
    }
}

pub type MergeResult<T> = Result<T, MergeError>;

/// Result of a successful merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub output: PathBuf,
    pub report: CompatibilityReport,
    pub chain: FallbackChain,
    /// Strategy that produced the output; `Batched` for grouped merges.
    pub strategy: MergeStrategy,
    /// Every attempt made, groups included, in execution order.
    pub attempts: Vec<ExecutionAttempt<MergeStrategy>>,
    /// Group sizes when the merge was batched.
    pub groups: Option<Vec<usize>>,
}

pub struct ClipMerger<'a> {
    inspector: &'a dyn MediaInspector,
    engine: &'a dyn TranscodeEngine,
    selector: StrategySelector,
    budgets: BudgetTable,
    profile: EncodeProfile,
    guard_options: GuardOptions,
    group_size: usize,
    work_dir: PathBuf,
    logger: Option<&'a JobLogger>,
}

impl<'a> ClipMerger<'a> {
    pub fn new(
        inspector: &'a dyn MediaInspector,
        engine: &'a dyn TranscodeEngine,
        settings: &MergeSettings,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inspector,
            engine,
            selector: StrategySelector::new(SelectorLimits::from(settings)),
            budgets: BudgetTable::from(settings),
            profile: EncodeProfile::from(settings),
            guard_options: GuardOptions::from(settings),
            group_size: settings.group_size.max(2),
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

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Merge `inputs` in order into `output`.
    pub fn merge(&self, inputs: &[PathBuf], output: &Path) -> MergeResult<MergeOutcome> {
        if inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }
        if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
            return Err(MergeError::InputNotFound(missing.clone()));
        }

        fs::create_dir_all(&self.work_dir)
            .map_err(|e| MergeError::io(format!("create {}", self.work_dir.display()), e))?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| MergeError::io(format!("create {}", parent.display()), e))?;
        }

        tracing::info!("Merging {} clips into {}", inputs.len(), output.display());
        let inspections = inspect_all(self.inspector, inputs);
        self.merge_inspected(&inspections, output)
    }

    fn merge_inspected(
        &self,
        inspections: &[Inspection],
        output: &Path,
    ) -> MergeResult<MergeOutcome> {
        let report = analyze(inspections);
        let chain = self
            .selector
            .select(&report, inspections.len(), report.total_bytes);

        tracing::info!("Compatibility: {}", report.summary());
        tracing::info!("Fallback chain: {}", chain);
        if let Some(logger) = self.logger {
            logger.info(&format!("Compatibility: {}", report.summary()));
            logger.info(&format!("Fallback chain: {}", chain));
        }

        if chain.is_batched() {
            return batch::merge_batched(self, inspections, report, output);
        }

        let paths: Vec<PathBuf> = inspections.iter().map(|i| i.path.clone()).collect();
        let (strategy, attempts) = self.run_chain(&chain, &paths, output, report.total_bytes)?;
        Ok(MergeOutcome {
            output: output.to_path_buf(),
            report,
            chain,
            strategy,
            attempts,
            groups: None,
        })
    }

    /// Escalate along `chain` until one strategy produces `output`.
    fn run_chain(
        &self,
        chain: &FallbackChain,
        inputs: &[PathBuf],
        output: &Path,
        total_bytes: u64,
    ) -> MergeResult<(MergeStrategy, Vec<ExecutionAttempt<MergeStrategy>>)> {
        let guard = ExecutionGuard::new(self.engine, &self.work_dir, self.guard_options)
            .with_logger(self.logger);

        let run = drive(chain.strategies(), |strategy| {
            let budget = self.budgets.for_strategy(strategy).for_bytes(total_bytes);
            guard.run(strategy, budget, |scope| {
                build_invocation(strategy, inputs, output, &self.profile, scope)
            })
        })?;

        match (run.state, run.succeeded_with()) {
            (EscalationState::Succeeded { .. }, Some(strategy)) => Ok((strategy, run.attempts)),
            (EscalationState::Fatal { reason: FatalReason::Cancelled, .. }, _) => {
                Err(MergeError::Cancelled {
                    strategy: run.last_attempt().map_or(chain.first(), |a| a.strategy),
                    attempts: run.attempts,
                })
            }
            _ => {
                let (strategy, class, message) = match run.last_attempt() {
                    Some(last) => (
                        last.strategy,
                        last.error_class.unwrap_or(ErrorClass::Unknown),
                        last.message.clone().unwrap_or_default(),
                    ),
                    None => (
                        chain.first(),
                        ErrorClass::Unknown,
                        "no strategy attempted".to_string(),
                    ),
                };
                Err(MergeError::ChainExhausted {
                    strategy,
                    class,
                    message,
                    attempts: run.attempts,
                })
            }
        }
    }
}
