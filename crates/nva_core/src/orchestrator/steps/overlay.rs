//! Overlay step - attaches the repaired subtitles to the merged video.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, OverlayOutput, StepOutcome};
use crate::overlay::SubtitleOverlay;

const OVERLAID_NAME: &str = "overlaid.mp4";

pub struct OverlayStep;

impl OverlayStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OverlayStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for OverlayStep {
    fn name(&self) -> &str {
        "Overlay"
    }

    fn description(&self) -> &str {
        "Attach subtitles to the video"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.subtitles.is_some() && state.current_video().is_none() {
            return Err(StepError::precondition_failed("No video to attach subtitles to"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let Some(subtitles) = &state.subtitles else {
            return Ok(StepOutcome::Skipped("No subtitles".to_string()));
        };
        let video = state
            .current_video()
            .ok_or_else(|| StepError::precondition_failed("No video to attach subtitles to"))?;

        let mut overlay = SubtitleOverlay::new(
            ctx.engine.as_ref(),
            &ctx.settings.overlay,
            ctx.work_path("overlay"),
        )
        .with_logger(Some(ctx.logger.as_ref()))
        .with_guard_options(ctx.guard_options());
        if let Some(method) = ctx.job.overlay_method {
            overlay = overlay.with_method(method);
        }

        let outcome = overlay.overlay(video, &subtitles.path, &ctx.work_path(OVERLAID_NAME))?;
        for attempt in &outcome.attempts {
            ctx.logger.info(&attempt.describe());
        }

        state.overlay = Some(OverlayOutput {
            video: outcome.output,
            method: outcome.method,
            sidecar: outcome.sidecar,
            attempts: outcome.attempts.len(),
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let overlay = state
            .overlay
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Overlay result not recorded"))?;
        if !overlay.video.is_file() {
            return Err(StepError::file_not_found(&overlay.video));
        }
        if let Some(sidecar) = &overlay.sidecar {
            if !sidecar.is_file() {
                return Err(StepError::file_not_found(sidecar));
            }
        }
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
