//! Pipeline orchestrator for assembly jobs.
//!
//! A job runs as a sequence of steps that validate their input, execute,
//! and record their results in a [`JobState`].
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Merge      clips -> merged.mp4
//!     ├── Step: Subtitles  raw track -> <stem>_fixed.srt
//!     ├── Step: Overlay    hardburn / embed / sidecar
//!     ├── Step: Bind       narration under the video
//!     └── Step: Finalize   move into place
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nva_core::orchestrator::{AssemblyJob, Assembler};
//!
//! let job = AssemblyJob::new(clips, "out/promo.mp4")
//!     .with_subtitle("script.srt")
//!     .with_narration("voice.mp3");
//! let report = Assembler::new(settings, inspector, engine).run(job, "promo", None, None)?;
//! println!("Completed: {:?}", report.steps_completed);
//! ```

mod assembly;
mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use assembly::{Assembler, AssemblyReport};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{BindStep, FinalizeStep, MergeStep, OverlayStep, SubtitlesStep};
pub use types::{
    AssemblyJob, BindOutput, Context, FinalizeOutput, JobState, MergeOutput, OverlayOutput,
    ProgressCallback, StepOutcome, SubtitlesOutput,
};

/// Create the assembly pipeline with all steps in order.
///
/// 1. Merge - join the clips, escalating strategies as needed
/// 2. Subtitles - repair the raw subtitle timeline
/// 3. Overlay - attach subtitles (skipped without subtitles)
/// 4. Bind - lay narration under the video (skipped without narration)
/// 5. Finalize - move the last intermediate to the job output
pub fn create_assembly_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(MergeStep::new())
        .with_step(SubtitlesStep::new())
        .with_step(OverlayStep::new())
        .with_step(BindStep::new())
        .with_step(FinalizeStep::new())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_pipeline_order() {
        let pipeline = create_assembly_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec!["Merge", "Subtitles", "Overlay", "Bind", "Finalize"]
        );
    }
}
