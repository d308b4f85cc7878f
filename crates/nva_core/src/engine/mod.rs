//! External transcoding engine.
//!
//! The assembler never decodes or encodes frames itself; it hands argument
//! lists to an engine process and supervises it. [`TranscodeEngine`] starts
//! a process, [`EngineProcess`] is the exclusive handle to it.
//!
//! # Example
//!
//! ```no_run
//! use nva_core::engine::{EngineInvocation, FfmpegEngine, ProcessState, TranscodeEngine};
//!
//! let engine = FfmpegEngine::new("ffmpeg");
//! let invocation = EngineInvocation::new(
//!     "probe copy",
//!     vec!["-i".into(), "in.mp4".into(), "-c".into(), "copy".into(), "out.mp4".into()],
//!     "out.mp4",
//! );
//! let mut process = engine.start(&invocation).unwrap();
//! while process.poll().unwrap() == ProcessState::Running {
//!     std::thread::sleep(std::time::Duration::from_millis(200));
//! }
//! ```

mod classify;
mod ffmpeg;

pub use classify::{classify_failure, summarize_failure};
pub use ffmpeg::{FfmpegEngine, FfmpegProcess};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors starting an engine process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine binary could not be launched.
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Engine I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}

/// One engine run: the argument list plus the file it is expected to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    /// Short description for logs (`"re-encode 12 clips"`).
    pub label: String,
    /// Arguments after the program name. The output path is the last one.
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl EngineInvocation {
    pub fn new(label: impl Into<String>, args: Vec<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            args,
            output: output.into(),
        }
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains([' ', '\'', '"', ';', '[', ']']) {
                line.push('"');
                line.push_str(&arg.replace('"', "\\\""));
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Observed state of an engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited on its own with an exit code.
    Exited { success: bool, code: Option<i32> },
    /// Terminated by a signal.
    Signalled { signal: Option<i32> },
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    /// Signalled by SIGINT, SIGTERM or SIGKILL. Any other signal death
    /// (SIGSEGV, SIGABRT, ...) is a crash of the engine itself.
    pub fn is_stop_signal(&self) -> bool {
        match self {
            ProcessState::Signalled { signal: Some(sig) } => is_stop_signal(*sig),
            _ => false,
        }
    }
}

#[cfg(unix)]
fn is_stop_signal(sig: i32) -> bool {
    use nix::sys::signal::Signal;

    matches!(
        Signal::try_from(sig),
        Ok(Signal::SIGINT | Signal::SIGTERM | Signal::SIGKILL)
    )
}

#[cfg(not(unix))]
fn is_stop_signal(_sig: i32) -> bool {
    false
}

/// Exclusive handle to a running engine process.
///
/// Dropping a handle whose process is still alive must kill and reap it.
pub trait EngineProcess: Send {
    /// Non-blocking status check.
    fn poll(&mut self) -> io::Result<ProcessState>;

    /// Ask the engine to stop and finalize (SIGTERM on Unix).
    fn request_graceful_stop(&mut self) -> io::Result<()>;

    /// Kill the engine immediately.
    fn force_stop(&mut self) -> io::Result<()>;

    /// Most recent diagnostic output lines, oldest first.
    fn diagnostics(&self) -> Vec<String>;

    /// Media time processed so far, when the engine reports it.
    fn progress_secs(&self) -> Option<f64> {
        None
    }
}

/// Something that can run engine invocations.
pub trait TranscodeEngine: Send + Sync {
    /// Program name for logs.
    fn program(&self) -> &str;

    fn start(&self, invocation: &EngineInvocation) -> Result<Box<dyn EngineProcess>, EngineError>;
}
