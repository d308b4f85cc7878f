//! Runs the bind as one supervised engine attempt.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::policy::{BindPlan, DurationReconciliationPolicy};
use super::{BindError, BindResult};
use crate::config::BindSettings;
use crate::engine::{EngineInvocation, TranscodeEngine};
use crate::inspect::MediaInspector;
use crate::logging::JobLogger;
use crate::merge::{ExecutionAttempt, ExecutionGuard, GuardOptions, TimeBudget};
use crate::models::AttemptStatus;

/// Label the bind attempt is recorded under.
pub const BIND_OPERATION: &str = "bind";

#[derive(Debug, Clone, Serialize)]
pub struct BindOutcome {
    pub output: PathBuf,
    pub plan: BindPlan,
    pub attempt: ExecutionAttempt<&'static str>,
}

pub struct AudioVideoBinder<'a> {
    inspector: &'a dyn MediaInspector,
    engine: &'a dyn TranscodeEngine,
    settings: BindSettings,
    policy: DurationReconciliationPolicy,
    guard_options: GuardOptions,
    work_dir: PathBuf,
    logger: Option<&'a JobLogger>,
}

impl<'a> AudioVideoBinder<'a> {
    pub fn new(
        inspector: &'a dyn MediaInspector,
        engine: &'a dyn TranscodeEngine,
        settings: &BindSettings,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inspector,
            engine,
            settings: settings.clone(),
            policy: DurationReconciliationPolicy::default(),
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

    /// Delay `narration` by `offset_secs` (the configured offset when
    /// `None`) and mux it under `video`, keeping the video's duration.
    pub fn bind(
        &self,
        video: &Path,
        narration: &Path,
        output: &Path,
        offset_secs: Option<f64>,
    ) -> BindResult<BindOutcome> {
        for input in [video, narration] {
            if !input.is_file() {
                return Err(BindError::InputNotFound(input.to_path_buf()));
            }
        }
        let offset = offset_secs.unwrap_or(self.settings.offset_secs);

        let video_info = self.inspector.inspect(video)?;
        let narration_info = self.inspector.inspect(narration)?;
        let plan = self
            .policy
            .plan(video_info.duration_secs, narration_info.duration_secs, offset)?;
        tracing::info!(
            "Binding narration ({:.1}s + {:.1}s offset) to video ({:.1}s): {:?}",
            plan.narration_secs,
            plan.offset_secs,
            plan.video_secs,
            plan.action
        );

        for dir in [Some(self.work_dir.as_path()), output.parent()].into_iter().flatten() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| BindError::io(format!("create {}", dir.display()), e))?;
            }
        }

        let total_bytes = [video, narration]
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        let budget = TimeBudget::new(
            self.settings.mb_per_minute,
            self.settings.min_minutes,
            self.settings.max_minutes,
        )
        .for_bytes(total_bytes);

        let guard = ExecutionGuard::new(self.engine, &self.work_dir, self.guard_options)
            .with_logger(self.logger);
        let attempt = guard.run(BIND_OPERATION, budget, |_scope| {
            Ok(bind_invocation(video, narration, output, &plan, &self.settings))
        })?;

        match attempt.status {
            AttemptStatus::Succeeded => Ok(BindOutcome {
                output: output.to_path_buf(),
                plan,
                attempt,
            }),
            AttemptStatus::Cancelled => Err(BindError::Cancelled),
            _ => Err(BindError::Failed {
                message: attempt.describe(),
                attempt: Box::new(attempt),
            }),
        }
    }
}

/// `-map 0:v:0` with a stream copy, narration delayed and padded with
/// silence, everything cut at the video's duration. Subtitle streams of the
/// video, if any, are carried over.
pub fn bind_invocation(
    video: &Path,
    narration: &Path,
    output: &Path,
    plan: &BindPlan,
    settings: &BindSettings,
) -> EngineInvocation {
    let delay = plan.offset_millis();
    let filter = format!("[1:a]adelay={}|{},apad[narr]", delay, delay);
    let args = vec![
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        narration.display().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "[narr]".to_string(),
        "-map".to_string(),
        "0:s?".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:s".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-b:a".to_string(),
        settings.audio_bitrate.clone(),
        "-ar".to_string(),
        settings.sample_rate.to_string(),
        "-ac".to_string(),
        settings.channels.to_string(),
        "-t".to_string(),
        format!("{:.3}", plan.output_secs),
        output.display().to_string(),
    ];
    EngineInvocation::new(
        format!("bind narration with {:.1}s offset", plan.offset_secs),
        args,
        output,
    )
}
