//! Subtitles step - repairs the job's subtitle timeline.
//!
//! SRT and VTT input is repaired and written as `<stem>_fixed.srt` next to
//! the source. ASS/SSA files are passed through untouched.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome, SubtitlesOutput};
use crate::subtitles::{check_subtitle_file, RepairEngine, SubtitleError};

pub struct SubtitlesStep;

impl SubtitlesStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubtitlesStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SubtitlesStep {
    fn name(&self) -> &str {
        "Subtitles"
    }

    fn description(&self) -> &str {
        "Repair the subtitle timeline"
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if let Some(subtitle) = &ctx.job.subtitle {
            check_subtitle_file(subtitle).map_err(SubtitleError::from)?;
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let Some(source) = &ctx.job.subtitle else {
            return Ok(StepOutcome::Skipped("No subtitle file".to_string()));
        };
        let info = check_subtitle_file(source).map_err(SubtitleError::from)?;

        if !info.format.is_repairable() {
            ctx.logger.warn(&format!(
                "{} is {:?}; attaching without timeline repair",
                source.display(),
                info.format
            ));
            state.subtitles = Some(SubtitlesOutput {
                source: source.clone(),
                path: source.clone(),
                format: info.format,
                report: None,
            });
            return Ok(StepOutcome::Success);
        }

        let engine = RepairEngine::new(&ctx.settings.subtitles);
        let repaired = engine.repair_file(source)?;
        let report = repaired.outcome.report;

        ctx.logger.info(&format!("Subtitle repair: {}", report.summary()));
        for dropped in &report.dropped {
            ctx.logger.warn(&format!(
                "Dropped cue at line {}: {}",
                dropped.line, dropped.reason
            ));
        }
        ctx.logger
            .info(&format!("Repaired subtitles: {}", repaired.path.display()));

        state.subtitles = Some(SubtitlesOutput {
            source: source.clone(),
            path: repaired.path,
            format: info.format,
            report: Some(report),
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let subtitles = state
            .subtitles
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Subtitle result not recorded"))?;
        if !subtitles.path.is_file() {
            return Err(StepError::file_not_found(&subtitles.path));
        }
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{context_for, Fakes};
    use crate::orchestrator::AssemblyJob;
    use crate::subtitles::IssueTag;
    use std::fs;
    use tempfile::tempdir;

    fn job(dir: &std::path::Path) -> AssemblyJob {
        AssemblyJob::new(vec![dir.join("a.mp4")], dir.join("final.mp4"))
    }

    #[test]
    fn repairs_srt_next_to_source() {
        let dir = tempdir().unwrap();
        let subs = dir.path().join("script.srt");
        fs::write(
            &subs,
            "1\n00:00:57,600 --> 01:00:04,100\nFirst\n\n2\n00:00:58,000 --> 00:01:01,000\nSecond\n",
        )
        .unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), job(dir.path()).with_subtitle(&subs), &fakes);
        let mut state = JobState::new("j");

        SubtitlesStep.validate_input(&ctx, &state).unwrap();
        assert_eq!(SubtitlesStep.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        SubtitlesStep.validate_output(&ctx, &state).unwrap();

        let output = state.subtitles.unwrap();
        assert_eq!(output.path, dir.path().join("script_fixed.srt"));
        let report = output.report.unwrap();
        assert_eq!(report.issues.get(&IssueTag::ImplausibleJump), Some(&1));
        let written = fs::read_to_string(&output.path).unwrap();
        assert!(written.contains("00:00:57,600 --> 00:01:03,600"));
    }

    #[test]
    fn ass_passes_through() {
        let dir = tempdir().unwrap();
        let subs = dir.path().join("styled.ass");
        fs::write(&subs, "[Script Info]\nTitle: x\n").unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), job(dir.path()).with_subtitle(&subs), &fakes);
        let mut state = JobState::new("j");

        SubtitlesStep.execute(&ctx, &mut state).unwrap();

        let output = state.subtitles.unwrap();
        assert_eq!(output.path, subs);
        assert!(output.report.is_none());
    }

    #[test]
    fn skipped_without_subtitle() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), job(dir.path()), &fakes);
        let mut state = JobState::new("j");
        assert!(matches!(
            SubtitlesStep.execute(&ctx, &mut state).unwrap(),
            StepOutcome::Skipped(_)
        ));
        assert!(state.subtitles.is_none());
    }

    #[test]
    fn unsupported_extension_fails_validation() {
        let dir = tempdir().unwrap();
        let subs = dir.path().join("notes.txt");
        fs::write(&subs, "hello").unwrap();
        let fakes = Fakes::succeeding();
        let ctx = context_for(dir.path(), job(dir.path()).with_subtitle(&subs), &fakes);
        let err = SubtitlesStep.validate_input(&ctx, &JobState::new("j")).unwrap_err();
        assert!(matches!(err, StepError::Subtitles(SubtitleError::Preflight(_))));
    }
}
