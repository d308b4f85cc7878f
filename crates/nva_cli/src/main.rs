//! nva - command-line front end for the narrated video assembler.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use nva_core::bind::AudioVideoBinder;
use nva_core::compat::analyze;
use nva_core::config::{ConfigManager, Settings};
use nva_core::engine::FfmpegEngine;
use nva_core::inspect::{inspect_all, FfprobeInspector};
use nva_core::logging::{init_tracing, LogLevel};
use nva_core::merge::{unique_token, ClipMerger, GuardOptions};
use nva_core::models::OverlayMethod;
use nva_core::orchestrator::{Assembler, AssemblyJob};
use nva_core::overlay::SubtitleOverlay;
use nva_core::subtitles::RepairEngine;

#[derive(Parser)]
#[command(name = "nva")]
#[command(version, about = "Assemble narrated videos from stock clips, subtitles and narration")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (created with defaults when missing)
    #[arg(short, long, global = true, value_name = "PATH", default_value = "nva.toml")]
    config: PathBuf,

    /// Log level; RUST_LOG overrides it
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LevelArg,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge clips in order into one video
    Merge {
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Repair a subtitle timeline and write `<stem>_fixed.srt`
    #[command(name = "repair-subs")]
    RepairSubs {
        input: PathBuf,

        /// Write here instead of next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bind a narration track to a video
    Bind {
        video: PathBuf,
        narration: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Narration delay in seconds (default from config)
        #[arg(long)]
        offset: Option<f64>,
    },

    /// Attach subtitles to a video
    Overlay {
        video: PathBuf,
        subtitle: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// First method to try: hardburn, embed or sidecar
        #[arg(long)]
        method: Option<OverlayMethod>,
    },

    /// Run the full pipeline: merge, repair subtitles, overlay, bind
    Assemble {
        /// Clips in playback order
        clips: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        subtitle: Option<PathBuf>,

        #[arg(long)]
        narration: Option<PathBuf>,

        #[arg(long)]
        offset: Option<f64>,

        #[arg(long)]
        method: Option<OverlayMethod>,

        /// Read the job from a JSON file instead of the arguments
        #[arg(long, conflicts_with_all = ["clips", "subtitle", "narration"])]
        job: Option<PathBuf>,

        /// Job name used for the log file and work directory
        #[arg(long, default_value = "assembly")]
        name: String,
    },

    /// Inspect clips and report whether they can be stream-copied together
    Inspect {
        #[arg(required = true)]
        clips: Vec<PathBuf>,
    },

    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCmd),
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for LogLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Trace => LogLevel::Trace,
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.into());

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

/// Settings plus the production inspector and engine.
struct Tools {
    settings: Settings,
    inspector: FfprobeInspector,
    engine: FfmpegEngine,
    guard_options: GuardOptions,
}

impl Tools {
    fn load(config: &Path) -> Result<Self> {
        let settings = load_settings(config)?;
        Ok(Self {
            inspector: FfprobeInspector::new(settings.tools.ffprobe.clone()),
            engine: FfmpegEngine::new(settings.tools.ffmpeg.clone()),
            guard_options: GuardOptions::from(&settings.merge),
            settings,
        })
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Merge { clips, output } => {
            let tools = Tools::load(&cli.config)?;
            let scratch = Scratch::new(&tools.settings, "merge")?;
            let outcome = ClipMerger::new(
                &tools.inspector,
                &tools.engine,
                &tools.settings.merge,
                scratch.path(),
            )
            .with_guard_options(tools.guard_options)
            .merge(&clips, &output)?;
            scratch.finish();
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!("{}", outcome.report.summary());
                println!(
                    "Merged {} clips with {} after {} attempt(s): {}",
                    clips.len(),
                    outcome.strategy,
                    outcome.attempts.len(),
                    outcome.output.display()
                );
                if let Some(groups) = &outcome.groups {
                    println!("Groups: {:?}", groups);
                }
            }
        }

        Commands::RepairSubs { input, output } => {
            let settings = load_settings(&cli.config)?;
            let repair = RepairEngine::new(&settings.subtitles);
            let repaired = match output {
                Some(target) => repair.repair_file_to(&input, &target)?,
                None => repair.repair_file(&input)?,
            };
            if cli.json {
                print_json(&repaired.outcome.report)?;
            } else {
                println!("{}", repaired.outcome.report.summary());
                for dropped in &repaired.outcome.report.dropped {
                    println!("  dropped line {}: {}", dropped.line, dropped.reason);
                }
                println!("Wrote {}", repaired.path.display());
            }
        }

        Commands::Bind {
            video,
            narration,
            output,
            offset,
        } => {
            let tools = Tools::load(&cli.config)?;
            let scratch = Scratch::new(&tools.settings, "bind")?;
            let outcome = AudioVideoBinder::new(
                &tools.inspector,
                &tools.engine,
                &tools.settings.bind,
                scratch.path(),
            )
            .with_guard_options(tools.guard_options)
            .bind(&video, &narration, &output, offset)?;
            scratch.finish();
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Bound narration at {:.2}s ({:?}), output {:.2}s: {}",
                    outcome.plan.offset_secs,
                    outcome.plan.action,
                    outcome.plan.output_secs,
                    outcome.output.display()
                );
            }
        }

        Commands::Overlay {
            video,
            subtitle,
            output,
            method,
        } => {
            let tools = Tools::load(&cli.config)?;
            let scratch = Scratch::new(&tools.settings, "overlay")?;
            let mut overlay =
                SubtitleOverlay::new(&tools.engine, &tools.settings.overlay, scratch.path())
                    .with_guard_options(tools.guard_options);
            if let Some(method) = method {
                overlay = overlay.with_method(method);
            }
            let outcome = overlay.overlay(&video, &subtitle, &output)?;
            scratch.finish();
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Subtitles attached with {} after {} attempt(s): {}",
                    outcome.method,
                    outcome.attempts.len(),
                    outcome.output.display()
                );
                if let Some(sidecar) = &outcome.sidecar {
                    println!("Sidecar: {}", sidecar.display());
                }
            }
        }

        Commands::Assemble {
            clips,
            output,
            subtitle,
            narration,
            offset,
            method,
            job,
            name,
        } => {
            let tools = Tools::load(&cli.config)?;
            let settings = tools.settings;
            let mut job = match job {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading job file {}", path.display()))?;
                    serde_json::from_str::<AssemblyJob>(&text)
                        .with_context(|| format!("parsing job file {}", path.display()))?
                }
                None => {
                    if clips.is_empty() {
                        bail!("no clips given");
                    }
                    let output = output.clone().unwrap_or_else(|| {
                        Path::new(&settings.paths.output_folder).join(format!("{}.mp4", name))
                    });
                    let mut job = AssemblyJob::new(clips, output);
                    job.subtitle = subtitle;
                    job.narration = narration;
                    job
                }
            };
            if let Some(output) = output {
                job.output = output;
            }
            if offset.is_some() {
                job.narration_offset_secs = offset;
            }
            if method.is_some() {
                job.overlay_method = method;
            }

            let assembler =
                Assembler::new(settings, Arc::new(tools.inspector), Arc::new(tools.engine));
            let report = assembler.run(job, &name, None, None)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Completed: {}", report.steps_completed.join(", "));
                if !report.steps_skipped.is_empty() {
                    println!("Skipped: {}", report.steps_skipped.join(", "));
                }
                println!("Output: {}", report.output.display());
                if let Some(sidecar) = &report.sidecar {
                    println!("Sidecar: {}", sidecar.display());
                }
                if let Some(work_dir) = &report.work_dir {
                    println!("Intermediates: {}", work_dir.display());
                }
                println!("Log: {}", report.log_path.display());
            }
        }

        Commands::Inspect { clips } => {
            let tools = Tools::load(&cli.config)?;
            let inspections = inspect_all(&tools.inspector, &clips);
            let report = analyze(&inspections);
            if cli.json {
                let files: Vec<_> = inspections
                    .iter()
                    .map(|i| match &i.outcome {
                        Ok(d) => serde_json::json!({ "path": i.path, "descriptor": d }),
                        Err(e) => serde_json::json!({ "path": i.path, "error": e.to_string() }),
                    })
                    .collect();
                print_json(&serde_json::json!({ "files": files, "report": report }))?;
            } else {
                for inspection in &inspections {
                    match &inspection.outcome {
                        Ok(d) => println!(
                            "{}: {} {}x{} @ {:.3} fps, {:.1}s",
                            inspection.path.display(),
                            d.video_codec,
                            d.width,
                            d.height,
                            d.nominal_fps,
                            d.duration_secs
                        ),
                        Err(e) => println!("{}: {}", inspection.path.display(), e),
                    }
                }
                println!("{}", report.summary());
            }
        }

        Commands::Config(cmd) => config_command(&cli.config, &cmd, cli.json)?,
    }

    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings> {
    let mut config = ConfigManager::new(path);
    config
        .load_or_create()
        .with_context(|| format!("loading config {}", path.display()))?;
    config.ensure_dirs_exist()?;
    Ok(config.into_settings())
}

fn config_command(path: &Path, cmd: &ConfigCmd, json: bool) -> Result<()> {
    match cmd {
        ConfigCmd::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ConfigManager::with_settings(path, Settings::default()).save()?;
            println!("Wrote {}", path.display());
        }
        ConfigCmd::Show => {
            let settings = load_settings(path)?;
            if json {
                print_json(&settings)?;
            } else {
                print!("{}", toml::to_string_pretty(&settings)?);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Work directory for a single command, removed on success.
struct Scratch {
    path: PathBuf,
    keep: bool,
}

impl Scratch {
    fn new(settings: &Settings, label: &str) -> Result<Self> {
        let path = Path::new(&settings.paths.temp_root).join(format!("{}_{}", label, unique_token()));
        fs::create_dir_all(&path)
            .with_context(|| format!("creating work directory {}", path.display()))?;
        Ok(Self {
            path,
            keep: settings.paths.keep_intermediates,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn finish(self) {
        if self.keep {
            tracing::info!("Intermediates kept in {}", self.path.display());
        } else if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}
