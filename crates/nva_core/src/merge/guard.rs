//! Supervised execution of a single engine invocation.
//!
//! The guard starts one engine process, enforces its wall-clock budget with
//! two-phase cancellation (graceful stop, grace window, force stop), and
//! turns the outcome into an [`ExecutionAttempt`]. Temporaries live in an
//! [`AttemptScope`] that is dropped on every exit path; a partial output is
//! removed when the attempt does not succeed.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::scope::AttemptScope;
use crate::config::MergeSettings;
use crate::engine::{
    classify_failure, summarize_failure, EngineError, EngineInvocation, EngineProcess,
    ProcessState, TranscodeEngine,
};
use crate::logging::JobLogger;
use crate::models::{AttemptStatus, ErrorClass};

/// Errors that prevent an attempt from being made at all.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error(transparent)]
    Spawn(#[from] EngineError),

    #[error("Failed to {operation}: {source}")]
    Setup {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Lost track of engine process: {0}")]
    Poll(#[source] io::Error),
}

impl GuardError {
    pub fn setup(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Setup {
            operation: operation.into(),
            source,
        }
    }
}

/// Result of one supervised attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionAttempt<S> {
    pub strategy: S,
    pub budget: Duration,
    pub status: AttemptStatus,
    /// Set for every non-success terminal status.
    pub error_class: Option<ErrorClass>,
    pub message: Option<String>,
    pub elapsed: Duration,
}

impl<S: fmt::Display> ExecutionAttempt<S> {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }

    pub fn describe(&self) -> String {
        match (&self.error_class, &self.message) {
            (Some(class), Some(message)) => format!(
                "{} {} after {:.1}s ({} error: {})",
                self.strategy,
                self.status,
                self.elapsed.as_secs_f64(),
                class,
                message
            ),
            _ => format!(
                "{} {} after {:.1}s",
                self.strategy,
                self.status,
                self.elapsed.as_secs_f64()
            ),
        }
    }
}

/// Timing knobs for the guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardOptions {
    /// Time between graceful and forced stop.
    pub grace_window: Duration,
    pub poll_interval: Duration,
    /// Replaces every computed budget when set.
    pub budget_override: Option<Duration>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self::from(&MergeSettings::default())
    }
}

impl From<&MergeSettings> for GuardOptions {
    fn from(settings: &MergeSettings) -> Self {
        Self {
            grace_window: Duration::from_secs(settings.grace_window_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            budget_override: None,
        }
    }
}

/// Exclusive handle to the running attempt.
struct AttemptHandle {
    process: Box<dyn EngineProcess>,
    stop_requested_at: Option<Instant>,
    force_stopped: bool,
}

impl AttemptHandle {
    fn new(process: Box<dyn EngineProcess>) -> Self {
        Self {
            process,
            stop_requested_at: None,
            force_stopped: false,
        }
    }

    fn request_graceful_stop(&mut self) {
        if self.stop_requested_at.is_some() {
            return;
        }
        if let Err(e) = self.process.request_graceful_stop() {
            tracing::warn!("Graceful stop failed: {}", e);
        }
        self.stop_requested_at = Some(Instant::now());
    }

    fn force_stop(&mut self) {
        if self.force_stopped {
            return;
        }
        if let Err(e) = self.process.force_stop() {
            tracing::warn!("Force stop failed: {}", e);
        }
        self.force_stopped = true;
    }

    fn stopped_by_guard(&self) -> bool {
        self.stop_requested_at.is_some()
    }
}

pub struct ExecutionGuard<'a> {
    engine: &'a dyn TranscodeEngine,
    work_dir: PathBuf,
    options: GuardOptions,
    logger: Option<&'a JobLogger>,
}

impl<'a> ExecutionGuard<'a> {
    pub fn new(
        engine: &'a dyn TranscodeEngine,
        work_dir: impl Into<PathBuf>,
        options: GuardOptions,
    ) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
            options,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<&'a JobLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn options(&self) -> GuardOptions {
        self.options
    }

    /// Run one attempt of `strategy` within `budget`.
    ///
    /// `prepare` builds the invocation and may create temporaries in the
    /// scope it is given; they are removed before this returns.
    pub fn run<S, F>(
        &self,
        strategy: S,
        budget: Duration,
        prepare: F,
    ) -> Result<ExecutionAttempt<S>, GuardError>
    where
        S: Copy + fmt::Display,
        F: FnOnce(&mut AttemptScope) -> io::Result<EngineInvocation>,
    {
        let budget = self.options.budget_override.unwrap_or(budget);
        let mut scope = AttemptScope::new(&self.work_dir);
        let invocation = prepare(&mut scope)
            .map_err(|e| GuardError::setup(format!("prepare {} attempt", strategy), e))?;

        tracing::info!(
            "Starting {} (budget {}s): {}",
            strategy,
            budget.as_secs(),
            invocation.label
        );
        tracing::debug!("{}", invocation.command_line(self.engine.program()));
        if let Some(logger) = self.logger {
            logger.command(self.engine.program(), &invocation.args);
            logger.log_engine_args_pretty(&invocation.args);
            logger.log_engine_args_json(&invocation.args);
        }

        let started = Instant::now();
        let mut handle = AttemptHandle::new(self.engine.start(&invocation)?);
        let outcome = self.supervise(&mut handle, budget);
        let elapsed = started.elapsed();

        let attempt = match outcome {
            Ok(final_state) => self.conclude(
                strategy,
                budget,
                elapsed,
                &handle,
                final_state,
                &invocation.output,
            ),
            Err(e) => {
                handle.force_stop();
                remove_partial_output(&invocation.output);
                return Err(GuardError::Poll(e));
            }
        };

        if !attempt.succeeded() {
            remove_partial_output(&invocation.output);
        }
        drop(handle);
        drop(scope);
        Ok(attempt)
    }

    fn supervise(&self, handle: &mut AttemptHandle, budget: Duration) -> io::Result<ProcessState> {
        let started = Instant::now();
        let mut last_progress: Option<u64> = None;
        loop {
            let state = handle.process.poll()?;
            if !state.is_running() {
                return Ok(state);
            }

            match handle.stop_requested_at {
                None if started.elapsed() >= budget => {
                    tracing::warn!("Budget of {}s expired, requesting stop", budget.as_secs());
                    handle.request_graceful_stop();
                }
                Some(at) if at.elapsed() >= self.options.grace_window => {
                    tracing::warn!("Engine ignored graceful stop, killing it");
                    handle.force_stop();
                }
                _ => {}
            }

            if let (Some(logger), Some(secs)) = (self.logger, handle.process.progress_secs()) {
                let whole = secs as u64;
                if last_progress != Some(whole) {
                    logger.debug(&format!("Engine at {}s of media", whole));
                    last_progress = Some(whole);
                }
            }

            thread::sleep(self.options.poll_interval);
        }
    }

    fn conclude<S: Copy + fmt::Display>(
        &self,
        strategy: S,
        budget: Duration,
        elapsed: Duration,
        handle: &AttemptHandle,
        state: ProcessState,
        output: &Path,
    ) -> ExecutionAttempt<S> {
        let mut attempt = ExecutionAttempt {
            strategy,
            budget,
            status: AttemptStatus::Failed,
            error_class: None,
            message: None,
            elapsed,
        };

        if handle.stopped_by_guard() {
            attempt.status = AttemptStatus::TimedOut;
            attempt.error_class = Some(ErrorClass::Timeout);
            attempt.message = Some(format!("exceeded budget of {}s", budget.as_secs()));
        } else {
            match state {
                ProcessState::Exited { success: true, .. } => {
                    if output_is_usable(output) {
                        attempt.status = AttemptStatus::Succeeded;
                    } else {
                        attempt.error_class = Some(ErrorClass::Format);
                        attempt.message = Some(format!(
                            "engine exited cleanly but {} is missing or empty",
                            output.display()
                        ));
                    }
                }
                ProcessState::Exited { success: false, code } => {
                    let diagnostics = handle.process.diagnostics();
                    let summary = summarize_failure(&diagnostics);
                    attempt.error_class = Some(classify_failure(&summary));
                    attempt.message = Some(if summary.is_empty() {
                        format!("engine exited with code {}", code.unwrap_or(-1))
                    } else {
                        summary
                    });
                }
                ProcessState::Signalled { signal } => {
                    let stopped = state.is_stop_signal();
                    attempt.status = if stopped {
                        AttemptStatus::Cancelled
                    } else {
                        AttemptStatus::Failed
                    };
                    attempt.error_class = Some(ErrorClass::Unknown);
                    let verb = if stopped { "terminated" } else { "crashed" };
                    attempt.message = Some(match signal {
                        Some(sig) => format!("engine {} by signal {}", verb, sig),
                        None => format!("engine {} by a signal", verb),
                    });
                }
                ProcessState::Running => {}
            }
        }

        if attempt.succeeded() {
            tracing::info!("{}", attempt.describe());
            if let Some(logger) = self.logger {
                logger.success(&attempt.describe());
                logger.clear_tail();
            }
        } else {
            tracing::warn!("{}", attempt.describe());
            if let Some(logger) = self.logger {
                for line in handle.process.diagnostics() {
                    logger.engine_line(&line);
                }
                logger.warn(&attempt.describe());
                logger.show_tail(&strategy.to_string());
                logger.clear_tail();
            }
        }
        attempt
    }
}

fn output_is_usable(output: &Path) -> bool {
    fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false)
}

fn remove_partial_output(output: &Path) {
    if output.exists() {
        if let Err(e) = fs::remove_file(output) {
            tracing::warn!("Failed to remove partial output {}: {}", output.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MergeStrategy;
    use crate::testing::{Script, ScriptedEngine};
    use tempfile::tempdir;

    fn fast_options() -> GuardOptions {
        GuardOptions {
            grace_window: Duration::from_millis(40),
            poll_interval: Duration::from_millis(2),
            budget_override: None,
        }
    }

    fn invocation_into(output: PathBuf) -> impl FnOnce(&mut AttemptScope) -> io::Result<EngineInvocation> {
        move |_scope| Ok(EngineInvocation::new("test", vec![output.display().to_string()], output))
    }

    #[test]
    fn successful_attempt_keeps_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let engine = ScriptedEngine::succeeding();
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(MergeStrategy::StreamCopy, Duration::from_secs(60), invocation_into(output.clone()))
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::Succeeded);
        assert_eq!(attempt.error_class, None);
        assert!(output.exists());
        assert!(engine.stops.lock().is_empty());
    }

    #[test]
    fn failure_is_classified_from_diagnostics() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let engine = ScriptedEngine::with_scripts(vec![Script::Fail(
            "Unknown encoder 'libx264'".to_string(),
        )]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(MergeStrategy::Reencode, Duration::from_secs(60), invocation_into(output.clone()))
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.error_class, Some(ErrorClass::Codec));
        assert!(attempt.message.unwrap().contains("libx264"));
    }

    #[test]
    fn clean_exit_without_output_is_a_format_failure() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::with_scripts(vec![Script::SucceedWithoutOutput]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(
                MergeStrategy::StreamCopy,
                Duration::from_secs(60),
                invocation_into(dir.path().join("out.mp4")),
            )
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.error_class, Some(ErrorClass::Format));
    }

    #[test]
    fn timeout_escalates_from_term_to_kill() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let engine = ScriptedEngine::with_scripts(vec![Script::Hang { honors_term: false }]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(MergeStrategy::NormalizeConcat, Duration::from_millis(20), invocation_into(output.clone()))
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::TimedOut);
        assert_eq!(attempt.error_class, Some(ErrorClass::Timeout));
        assert_eq!(*engine.stops.lock(), vec!["term", "kill"]);
        assert!(attempt.elapsed >= Duration::from_millis(60));
        assert!(!output.exists(), "partial output must be removed");
    }

    #[test]
    fn graceful_stop_within_grace_window_skips_kill() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::with_scripts(vec![Script::Hang { honors_term: true }]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(
                MergeStrategy::Reencode,
                Duration::from_millis(10),
                invocation_into(dir.path().join("out.mp4")),
            )
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::TimedOut);
        assert_eq!(*engine.stops.lock(), vec!["term"]);
    }

    #[test]
    fn outside_signal_means_cancelled() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::with_scripts(vec![Script::KilledExternally]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let attempt = guard
            .run(
                MergeStrategy::StreamCopy,
                Duration::from_secs(60),
                invocation_into(dir.path().join("out.mp4")),
            )
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::Cancelled);
        assert!(engine.stops.lock().is_empty());
    }

    #[test]
    fn engine_crash_is_a_failure() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::with_scripts(vec![Script::Crashed]);
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());
        let out = dir.path().join("out.mp4");

        let attempt = guard
            .run(
                MergeStrategy::StreamCopy,
                Duration::from_secs(60),
                invocation_into(out.clone()),
            )
            .unwrap();

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.error_class, Some(ErrorClass::Unknown));
        assert!(attempt.message.as_deref().unwrap().contains("crashed"));
        assert!(!out.exists());
    }

    #[test]
    fn missing_engine_is_an_error() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::unavailable();
        let guard = ExecutionGuard::new(&engine, dir.path(), fast_options());

        let result = guard.run(
            MergeStrategy::StreamCopy,
            Duration::from_secs(60),
            invocation_into(dir.path().join("out.mp4")),
        );
        assert!(matches!(result, Err(GuardError::Spawn(_))));
    }

    #[test]
    fn scope_temporaries_are_removed_on_failure() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.mp4");
        fs::write(&input, "clip").unwrap();
        let output = dir.path().join("out.mp4");
        let engine = ScriptedEngine::always_failing("Invalid data found when processing input");
        let guard = ExecutionGuard::new(&engine, dir.path().join("work"), fast_options());

        let mut manifest = PathBuf::new();
        let attempt = guard
            .run(MergeStrategy::StreamCopy, Duration::from_secs(60), |scope| {
                manifest = scope.write_manifest(&[input.clone()])?;
                Ok(EngineInvocation::new("copy", vec![], output.clone()))
            })
            .unwrap();

        assert_eq!(attempt.error_class, Some(ErrorClass::Format));
        assert!(!manifest.as_os_str().is_empty());
        assert!(!manifest.exists());
    }

    #[test]
    fn budget_override_wins() {
        let dir = tempdir().unwrap();
        let engine = ScriptedEngine::with_scripts(vec![Script::Hang { honors_term: true }]);
        let options = GuardOptions {
            budget_override: Some(Duration::from_millis(5)),
            ..fast_options()
        };
        let guard = ExecutionGuard::new(&engine, dir.path(), options);

        let attempt = guard
            .run(
                MergeStrategy::StreamCopy,
                Duration::from_secs(3600),
                invocation_into(dir.path().join("out.mp4")),
            )
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::TimedOut);
        assert_eq!(attempt.budget, Duration::from_millis(5));
    }
}
