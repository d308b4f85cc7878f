//! Finalize step - moves the last intermediate to the requested output.

use std::fs;
use std::path::Path;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, FinalizeOutput, JobState, StepOutcome};
use crate::overlay::sidecar_path;

pub struct FinalizeStep;

impl FinalizeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinalizeStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Rename, or copy and remove when the rename crosses filesystems.
fn move_file(from: &Path, to: &Path) -> StepResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| {
        StepError::io_error(format!("copy {} to {}", from.display(), to.display()), e)
    })?;
    if let Err(e) = fs::remove_file(from) {
        tracing::warn!("Could not remove {}: {}", from.display(), e);
    }
    Ok(())
}

impl PipelineStep for FinalizeStep {
    fn name(&self) -> &str {
        "Finalize"
    }

    fn description(&self) -> &str {
        "Move the assembled video into place"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.current_video().is_none() {
            return Err(StepError::precondition_failed("Nothing was assembled"));
        }
        if ctx.job.output.is_dir() {
            return Err(StepError::invalid_input(format!(
                "Output path is a directory: {}",
                ctx.job.output.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let video = state
            .current_video()
            .ok_or_else(|| StepError::precondition_failed("Nothing was assembled"))?
            .to_path_buf();
        let output = &ctx.job.output;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StepError::io_error(format!("create {}", parent.display()), e)
            })?;
        }
        move_file(&video, output)?;
        ctx.logger.info(&format!("Output: {}", output.display()));

        let sidecar = match state.sidecar() {
            Some(source) => {
                let target = sidecar_path(output, source);
                fs::copy(source, &target).map_err(|e| {
                    StepError::io_error(format!("copy subtitles to {}", target.display()), e)
                })?;
                ctx.logger.info(&format!("Sidecar subtitles: {}", target.display()));
                Some(target)
            }
            None => None,
        };

        state.finalize = Some(FinalizeOutput {
            output: output.clone(),
            sidecar,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let finalize = state
            .finalize
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Final output not recorded"))?;
        if !finalize.output.is_file() {
            return Err(StepError::file_not_found(&finalize.output));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergeStrategy, OverlayMethod};
    use crate::orchestrator::test_support::{context_for, Fakes};
    use crate::orchestrator::types::{MergeOutput, OverlayOutput};
    use crate::orchestrator::AssemblyJob;
    use tempfile::tempdir;

    #[test]
    fn moves_video_and_sidecar_next_to_output() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::succeeding();
        let output = dir.path().join("final").join("promo.mp4");
        let ctx = context_for(dir.path(), AssemblyJob::new(vec![], &output), &fakes);

        let video = ctx.work_path("overlaid.mp4");
        let sidecar = ctx.work_path("overlaid.srt");
        fs::write(&video, b"assembled").unwrap();
        fs::write(&sidecar, "1\n00:00:01,000 --> 00:00:02,000\nHi\n\n").unwrap();
        let mut state = JobState::new("j");
        state.overlay = Some(OverlayOutput {
            video: video.clone(),
            method: OverlayMethod::Sidecar,
            sidecar: Some(sidecar),
            attempts: 3,
        });

        FinalizeStep.validate_input(&ctx, &state).unwrap();
        FinalizeStep.execute(&ctx, &mut state).unwrap();
        FinalizeStep.validate_output(&ctx, &state).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"assembled");
        assert!(!video.exists());
        let finalize = state.finalize.unwrap();
        assert_eq!(finalize.sidecar, Some(dir.path().join("final").join("promo.srt")));
        assert!(dir.path().join("final").join("promo.srt").is_file());
    }

    #[test]
    fn ass_sidecar_is_not_renamed_to_srt() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::succeeding();
        let output = dir.path().join("promo.mp4");
        let ctx = context_for(dir.path(), AssemblyJob::new(vec![], &output), &fakes);

        let video = ctx.work_path("overlaid.mp4");
        let sidecar = ctx.work_path("overlaid.ass");
        fs::write(&video, b"assembled").unwrap();
        fs::write(&sidecar, "[Script Info]\n").unwrap();
        let mut state = JobState::new("j");
        state.overlay = Some(OverlayOutput {
            video,
            method: OverlayMethod::Sidecar,
            sidecar: Some(sidecar),
            attempts: 1,
        });

        FinalizeStep.execute(&ctx, &mut state).unwrap();

        let expected = dir.path().join("promo.ass");
        assert_eq!(state.finalize.unwrap().sidecar, Some(expected.clone()));
        assert!(expected.is_file());
        assert!(!dir.path().join("promo.srt").exists());
    }

    #[test]
    fn requires_an_assembled_video() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), AssemblyJob::new(vec![], dir.path().join("o.mp4")), &fakes);

        let err = FinalizeStep.validate_input(&ctx, &JobState::new("j")).unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }

    #[test]
    fn output_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), AssemblyJob::new(vec![], dir.path()), &fakes);
        let mut state = JobState::new("j");
        state.merge = Some(MergeOutput {
            video: ctx.work_path("merged.mp4"),
            strategy: MergeStrategy::Reencode,
            chain: "[re-encode]".to_string(),
            attempts: 1,
            groups: None,
        });

        let err = FinalizeStep.validate_input(&ctx, &state).unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }
}
