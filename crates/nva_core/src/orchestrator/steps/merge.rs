//! Merge step - concatenates the job's clips into one video.

use crate::merge::ClipMerger;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, MergeOutput, StepOutcome};

/// Intermediate file the merge writes.
const MERGED_NAME: &str = "merged.mp4";

pub struct MergeStep;

impl MergeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MergeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MergeStep {
    fn name(&self) -> &str {
        "Merge"
    }

    fn description(&self) -> &str {
        "Merge clips into one video"
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if ctx.job.clips.is_empty() {
            return Err(StepError::invalid_input("No clips to merge"));
        }
        if let Some(missing) = ctx.job.clips.iter().find(|c| !c.is_file()) {
            return Err(StepError::file_not_found(missing));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        ctx.logger
            .info(&format!("Merging {} clips", ctx.job.clips.len()));

        let merger = ClipMerger::new(
            ctx.inspector.as_ref(),
            ctx.engine.as_ref(),
            &ctx.settings.merge,
            ctx.work_path("merge"),
        )
        .with_logger(Some(ctx.logger.as_ref()))
        .with_guard_options(ctx.guard_options());

        let output = ctx.work_path(MERGED_NAME);
        let outcome = merger.merge(&ctx.job.clips, &output)?;

        for attempt in &outcome.attempts {
            ctx.logger.info(&attempt.describe());
        }
        ctx.logger.info(&format!(
            "Merged with {} after {} attempt(s)",
            outcome.strategy,
            outcome.attempts.len()
        ));

        state.merge = Some(MergeOutput {
            video: outcome.output,
            strategy: outcome.strategy,
            chain: outcome.chain.to_string(),
            attempts: outcome.attempts.len(),
            groups: outcome.groups,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let merged = state
            .merge
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Merge result not recorded"))?;
        let size = std::fs::metadata(&merged.video).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(StepError::invalid_output(format!(
                "Merged video missing or empty: {}",
                merged.video.display()
            )));
        }
        Ok(())
    }
}
