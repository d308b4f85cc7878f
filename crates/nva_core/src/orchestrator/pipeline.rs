//! Pipeline runner that executes steps in sequence.

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Steps run in order, each validated before and after execution.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run every step against `ctx`, recording results in `state`.
    ///
    /// Stops at the first failing step.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        };

        let total_steps = self.steps.len().max(1);

        for (i, step) in self.steps.iter().enumerate() {
            let step_name = step.name();
            ctx.logger.phase(step_name);
            tracing::info!("[{}] {}", ctx.job_name, step.description());

            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));
            ctx.logger.progress(percent);

            ctx.logger.debug(&format!("Validating input for '{}'", step_name));
            if let Err(e) = step.validate_input(ctx, state) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
            }

            let outcome = step.execute(ctx, state).map_err(|e| {
                ctx.logger.error(&format!("Execution failed: {}", e));
                PipelineError::step_failed(&ctx.job_name, step_name, e)
            })?;

            match outcome {
                StepOutcome::Success => {
                    if let Err(e) = step.validate_output(ctx, state) {
                        ctx.logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                    }
                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        ctx.report_progress("Complete", 100, "Pipeline finished");
        ctx.logger.progress(100);
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::errors::{StepError, StepResult};
    use crate::orchestrator::test_support::context;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingStep {
        name: &'static str,
        skip: bool,
        fail_output: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingStep {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                skip: false,
                fail_output: false,
                log: Arc::clone(log),
            }
        }
    }

    impl PipelineStep for RecordingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            self.log.lock().push(format!("{}:in", self.name));
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            self.log.lock().push(format!("{}:run", self.name));
            if self.skip {
                Ok(StepOutcome::Skipped("nothing to do".to_string()))
            } else {
                Ok(StepOutcome::Success)
            }
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            self.log.lock().push(format!("{}:out", self.name));
            if self.fail_output {
                Err(StepError::invalid_output("no file"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn runs_steps_in_order_and_skips_output_check_for_skipped() {
        let (_dir, ctx) = context();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut skipping = RecordingStep::new("B", &log);
        skipping.skip = true;
        let pipeline = Pipeline::new()
            .with_step(RecordingStep::new("A", &log))
            .with_step(skipping);

        let result = pipeline.run(&ctx, &mut JobState::new("j")).unwrap();

        assert_eq!(result.steps_completed, vec!["A"]);
        assert_eq!(result.steps_skipped, vec!["B"]);
        assert!(!result.all_completed());
        assert_eq!(result.total_steps(), 2);
        assert_eq!(*log.lock(), vec!["A:in", "A:run", "A:out", "B:in", "B:run"]);
    }

    #[test]
    fn output_failure_stops_the_pipeline() {
        let (_dir, ctx) = context();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = RecordingStep::new("A", &log);
        failing.fail_output = true;
        let pipeline = Pipeline::new()
            .with_step(failing)
            .with_step(RecordingStep::new("B", &log));

        let err = pipeline.run(&ctx, &mut JobState::new("j")).unwrap_err();

        assert_eq!(err.step_name(), Some("A"));
        assert!(!log.lock().iter().any(|e| e.starts_with("B")));
    }

    #[test]
    fn step_names_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .with_step(RecordingStep::new("Merge", &log))
            .with_step(RecordingStep::new("Bind", &log));
        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Merge", "Bind"]);
    }
}
