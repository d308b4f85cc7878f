//! Runs one assembly job end to end.
//!
//! The [`Assembler`] owns what a job needs besides its inputs: settings,
//! the inspector and the engine. Each run gets its own work directory under
//! `temp_root` and its own log file under `logs_folder`.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::engine::TranscodeEngine;
use crate::inspect::MediaInspector;
use crate::logging::{sanitize_filename, JobLogger, LineCallback, LogConfig};
use crate::merge::{unique_token, GuardOptions};

use super::errors::{PipelineError, PipelineResult};
use super::types::{AssemblyJob, Context, JobState, ProgressCallback};
use super::create_assembly_pipeline;

/// What a finished job produced.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub job_id: String,
    pub output: PathBuf,
    /// Subtitle file shipped next to the output, when subtitles were not
    /// attached to the video itself.
    pub sidecar: Option<PathBuf>,
    /// Repaired subtitle file, kept next to its source.
    pub repaired_subtitles: Option<PathBuf>,
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
    pub log_path: PathBuf,
    /// Set when intermediates were kept.
    pub work_dir: Option<PathBuf>,
    pub state: JobState,
}

pub struct Assembler {
    settings: Settings,
    inspector: Arc<dyn MediaInspector>,
    engine: Arc<dyn TranscodeEngine>,
    guard_options: Option<GuardOptions>,
}

impl Assembler {
    pub fn new(
        settings: Settings,
        inspector: Arc<dyn MediaInspector>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            settings,
            inspector,
            engine,
            guard_options: None,
        }
    }

    pub fn with_guard_options(mut self, options: GuardOptions) -> Self {
        self.guard_options = Some(options);
        self
    }

    /// Run `job` through the assembly pipeline.
    ///
    /// The work directory is removed after a successful run unless
    /// `keep_intermediates` is set. After a failure it is kept for
    /// inspection.
    pub fn run(
        &self,
        job: AssemblyJob,
        job_name: &str,
        log_callback: Option<LineCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> PipelineResult<AssemblyReport> {
        let job_id = format!("{}_{}", sanitize_filename(job_name), unique_token());
        let work_dir = PathBuf::from(&self.settings.paths.temp_root).join(&job_id);
        fs::create_dir_all(&work_dir).map_err(|e| {
            PipelineError::setup_failed(
                job_name,
                format!("Failed to create work directory {}: {}", work_dir.display(), e),
            )
        })?;

        let logger = JobLogger::new(
            job_name,
            &self.settings.paths.logs_folder,
            LogConfig::from(&self.settings.logging),
            log_callback,
        )
        .map(Arc::new)
        .map_err(|e| {
            PipelineError::setup_failed(job_name, format!("Failed to create logger: {}", e))
        })?;
        let log_path = logger.log_path().to_path_buf();

        logger.info(&format!("Starting job: {}", job_name));
        logger.info(&format!("Clips: {}", job.clips.len()));
        if let Some(subtitle) = &job.subtitle {
            logger.info(&format!("Subtitles: {}", subtitle.display()));
        }
        if let Some(narration) = &job.narration {
            logger.info(&format!("Narration: {}", narration.display()));
        }

        let mut ctx = Context::new(
            job,
            self.settings.clone(),
            job_name,
            work_dir.clone(),
            Arc::clone(&logger),
            Arc::clone(&self.inspector),
            Arc::clone(&self.engine),
        );
        if let Some(options) = self.guard_options {
            ctx = ctx.with_guard_options(options);
        }
        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut state = JobState::new(&job_id);
        let run = create_assembly_pipeline().run(&ctx, &mut state);

        let run_result = match run {
            Ok(result) => result,
            Err(e) => {
                logger.error(&format!("Pipeline failed: {}", e));
                logger.info(&format!("Intermediates kept in {}", work_dir.display()));
                logger.show_tail("Last engine output");
                logger.close();
                return Err(e);
            }
        };

        let kept = if self.settings.paths.keep_intermediates {
            logger.info(&format!("Intermediates kept in {}", work_dir.display()));
            Some(work_dir)
        } else {
            if let Err(e) = fs::remove_dir_all(&work_dir) {
                logger.warn(&format!(
                    "Could not remove work directory {}: {}",
                    work_dir.display(),
                    e
                ));
            }
            None
        };

        let output = state
            .finalize
            .as_ref()
            .map(|f| f.output.clone())
            .unwrap_or_else(|| ctx.job.output.clone());
        logger.success(&format!("Job completed: {}", output.display()));
        logger.close();

        Ok(AssemblyReport {
            job_id,
            sidecar: state.finalize.as_ref().and_then(|f| f.sidecar.clone()),
            repaired_subtitles: state
                .subtitles
                .as_ref()
                .filter(|s| s.report.is_some())
                .map(|s| s.path.clone()),
            output,
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
            log_path,
            work_dir: kept,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergeStrategy, OverlayMethod};
    use crate::orchestrator::test_support::{fast_guard, Fakes};
    use crate::orchestrator::StepError;
    use crate::testing::{touch_clips, Script};
    use std::path::Path;
    use tempfile::tempdir;

    fn settings_in(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.paths.temp_root = dir.join("temp").display().to_string();
        settings.paths.logs_folder = dir.join("logs").display().to_string();
        settings
    }

    fn assembler(settings: Settings, fakes: &Fakes) -> Assembler {
        Assembler::new(settings, fakes.inspector.clone(), fakes.engine.clone())
            .with_guard_options(fast_guard())
    }

    #[test]
    fn full_job_produces_output_and_cleans_up() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 3);
        let subs = dir.path().join("script.srt");
        fs::write(
            &subs,
            "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:02,500 --> 00:00:05,000\nAgain\n\n",
        )
        .unwrap();
        let narration = dir.path().join("voice.mp3");
        fs::write(&narration, b"audio").unwrap();
        let output = dir.path().join("final").join("promo.mp4");
        let job = AssemblyJob::new(clips, &output)
            .with_subtitle(&subs)
            .with_narration(&narration);
        let fakes = Fakes::succeeding();

        let report = assembler(settings_in(dir.path()), &fakes)
            .run(job, "promo", None, None)
            .unwrap();

        assert_eq!(
            report.steps_completed,
            vec!["Merge", "Subtitles", "Overlay", "Bind", "Finalize"]
        );
        assert!(report.steps_skipped.is_empty());
        assert_eq!(report.output, output);
        assert!(output.is_file());
        assert!(report.sidecar.is_none());
        assert_eq!(report.repaired_subtitles, Some(dir.path().join("script_fixed.srt")));
        assert!(dir.path().join("script_fixed.srt").is_file());
        assert_eq!(report.state.merge.as_ref().unwrap().strategy, MergeStrategy::StreamCopy);
        assert_eq!(report.state.overlay.as_ref().unwrap().method, OverlayMethod::Hardburn);
        assert!(report.work_dir.is_none());
        assert_eq!(fs::read_dir(dir.path().join("temp")).unwrap().count(), 0);
        assert!(report.log_path.is_file());
        // merge, hardburn, bind
        assert_eq!(fakes.engine.start_count(), 3);
    }

    #[test]
    fn clips_only_job_skips_optional_steps() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 2);
        let output = dir.path().join("out.mp4");
        let fakes = Fakes::succeeding();
        let mut settings = settings_in(dir.path());
        settings.paths.keep_intermediates = true;

        let report = assembler(settings, &fakes)
            .run(AssemblyJob::new(clips, &output), "clips only", None, None)
            .unwrap();

        assert_eq!(report.steps_completed, vec!["Merge", "Finalize"]);
        assert_eq!(report.steps_skipped, vec!["Subtitles", "Overlay", "Bind"]);
        let kept = report.work_dir.unwrap();
        assert!(kept.is_dir());
        assert!(kept.file_name().unwrap().to_string_lossy().starts_with("clips_only_"));
        assert!(output.is_file());
    }

    #[test]
    fn failed_job_keeps_work_dir_and_names_the_step() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 2);
        let fakes = Fakes::with_scripts(vec![
            Script::Fail("Invalid data found when processing input".to_string()),
            Script::Fail("Invalid data found when processing input".to_string()),
            Script::Fail("Invalid data found when processing input".to_string()),
        ]);

        let err = assembler(settings_in(dir.path()), &fakes)
            .run(AssemblyJob::new(clips, dir.path().join("out.mp4")), "broken", None, None)
            .unwrap_err();

        assert_eq!(err.step_name(), Some("Merge"));
        assert!(matches!(
            err,
            PipelineError::StepFailed { source: StepError::Merge(_), .. }
        ));
        assert_eq!(fs::read_dir(dir.path().join("temp")).unwrap().count(), 1);
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[test]
    fn progress_reaches_completion() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 2);
        let fakes = Fakes::succeeding();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |step, percent, _| {
            sink.lock().push((step.to_string(), percent));
        });

        assembler(settings_in(dir.path()), &fakes)
            .run(AssemblyJob::new(clips, dir.path().join("out.mp4")), "p", None, Some(callback))
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.first().unwrap(), &("Merge".to_string(), 0));
        assert_eq!(seen.last().unwrap(), &("Complete".to_string(), 100));
    }
}
