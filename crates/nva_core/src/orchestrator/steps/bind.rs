//! Bind step - lays the narration track under the current video.

use crate::bind::AudioVideoBinder;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{BindOutput, Context, JobState, StepOutcome};

const BOUND_NAME: &str = "bound.mp4";

pub struct BindStep;

impl BindStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BindStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for BindStep {
    fn name(&self) -> &str {
        "Bind"
    }

    fn description(&self) -> &str {
        "Bind narration audio to the video"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let Some(narration) = &ctx.job.narration else {
            return Ok(());
        };
        if !narration.is_file() {
            return Err(StepError::file_not_found(narration));
        }
        if let Some(offset) = ctx.job.narration_offset_secs {
            if !offset.is_finite() || offset < 0.0 {
                return Err(StepError::invalid_input(format!(
                    "Narration offset must be a non-negative number of seconds, got {}",
                    offset
                )));
            }
        }
        if state.current_video().is_none() {
            return Err(StepError::precondition_failed("No video to bind narration to"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let Some(narration) = &ctx.job.narration else {
            return Ok(StepOutcome::Skipped("No narration".to_string()));
        };
        let video = state
            .current_video()
            .ok_or_else(|| StepError::precondition_failed("No video to bind narration to"))?
            .to_path_buf();

        let binder = AudioVideoBinder::new(
            ctx.inspector.as_ref(),
            ctx.engine.as_ref(),
            &ctx.settings.bind,
            ctx.work_path("bind"),
        )
        .with_logger(Some(ctx.logger.as_ref()))
        .with_guard_options(ctx.guard_options());

        let outcome = binder.bind(
            &video,
            narration,
            &ctx.work_path(BOUND_NAME),
            ctx.job.narration_offset_secs,
        )?;
        ctx.logger.info(&format!(
            "Narration bound at {:.2}s offset, output {:.2}s",
            outcome.plan.offset_secs, outcome.plan.output_secs
        ));

        state.bind = Some(BindOutput {
            video: outcome.output,
            plan: outcome.plan,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let bind = state
            .bind
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Bind result not recorded"))?;
        let size = std::fs::metadata(&bind.video)
            .map_err(|_| StepError::file_not_found(&bind.video))?
            .len();
        if size == 0 {
            return Err(StepError::invalid_output(format!(
                "Bound video is empty: {}",
                bind.video.display()
            )));
        }
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
