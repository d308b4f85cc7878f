//! Pipeline step trait definition.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One stage of an assembly job.
///
/// The pipeline runner calls, in order:
///
/// 1. `validate_input` - check preconditions before execution
/// 2. `execute` - do the work and record it in `state`
/// 3. `validate_output` - only after `execute` returned `Success`
pub trait PipelineStep: Send + Sync {
    /// Step name, used in logs and error context.
    fn name(&self) -> &str;

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Returns `StepOutcome::Skipped` when there is nothing to do for this
    /// job (not an error).
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Whether this step can be skipped.
    fn is_optional(&self) -> bool {
        false
    }

    fn description(&self) -> &str {
        self.name()
    }
}
