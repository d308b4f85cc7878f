//! FFmpeg-backed engine.
//!
//! Runs `ffmpeg` as a child process. Stderr is drained by one reader thread
//! per process into a bounded tail buffer; `time=` progress stamps are
//! parsed out of the stream instead of being buffered.

use std::collections::VecDeque;
use std::io::{self, BufReader, Read};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::{EngineError, EngineInvocation, EngineProcess, ProcessState, TranscodeEngine};

/// Default number of stderr lines kept per process.
pub const DEFAULT_TAIL_LINES: usize = 40;

/// Engine that runs the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: String,
    tail_lines: usize,
}

impl FfmpegEngine {
    /// `program` is a path or a bare name looked up in PATH.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Set how many stderr lines are kept for diagnostics.
    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines.max(1);
        self
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn program(&self) -> &str {
        &self.program
    }

    fn start(&self, invocation: &EngineInvocation) -> Result<Box<dyn EngineProcess>, EngineError> {
        tracing::debug!("Starting {}", invocation.command_line(&self.program));

        let mut child = Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-y")
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::spawn(&self.program, e))?;

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(self.tail_lines)));
        let progress = Arc::new(Mutex::new(None));

        let reader = match child.stderr.take() {
            Some(stderr) => {
                let tail = Arc::clone(&tail);
                let progress = Arc::clone(&progress);
                let capacity = self.tail_lines;
                let spawned = thread::Builder::new()
                    .name("ffmpeg-stderr".to_string())
                    .spawn(move || drain_stderr(stderr, &tail, &progress, capacity));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EngineError::Io(e));
                    }
                }
            }
            None => None,
        };

        Ok(Box::new(FfmpegProcess {
            child,
            tail,
            progress,
            reader,
            finished: None,
        }))
    }
}

/// A running `ffmpeg` child.
pub struct FfmpegProcess {
    child: Child,
    tail: Arc<Mutex<VecDeque<String>>>,
    progress: Arc<Mutex<Option<f64>>>,
    reader: Option<JoinHandle<()>>,
    finished: Option<ProcessState>,
}

impl FfmpegProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn join_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl EngineProcess for FfmpegProcess {
    fn poll(&mut self) -> io::Result<ProcessState> {
        if let Some(state) = self.finished {
            return Ok(state);
        }

        match self.child.try_wait()? {
            Some(status) => {
                // The pipe closes when the process exits, so this returns promptly.
                self.join_reader();
                let state = exit_state(status);
                self.finished = Some(state);
                Ok(state)
            }
            None => Ok(ProcessState::Running),
        }
    }

    fn request_graceful_stop(&mut self) -> io::Result<()> {
        if self.finished.is_some() {
            return Ok(());
        }
        terminate(&mut self.child)
    }

    fn force_stop(&mut self) -> io::Result<()> {
        if self.finished.is_some() {
            return Ok(());
        }
        self.child.kill()
    }

    fn diagnostics(&self) -> Vec<String> {
        self.tail.lock().iter().cloned().collect()
    }

    fn progress_secs(&self) -> Option<f64> {
        *self.progress.lock()
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if self.finished.is_none() {
            if let Ok(None) = self.child.try_wait() {
                tracing::warn!("Killing ffmpeg process {} on drop", self.child.id());
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
        self.join_reader();
    }
}

#[cfg(unix)]
fn exit_state(status: ExitStatus) -> ProcessState {
    use std::os::unix::process::ExitStatusExt;

    match status.code() {
        Some(code) => ProcessState::Exited {
            success: status.success(),
            code: Some(code),
        },
        None => ProcessState::Signalled {
            signal: status.signal(),
        },
    }
}

#[cfg(not(unix))]
fn exit_state(status: ExitStatus) -> ProcessState {
    ProcessState::Exited {
        success: status.success(),
        code: status.code(),
    }
}

/// Send SIGTERM so ffmpeg can finalize the container before exiting.
#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "process id out of range"))?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn drain_stderr(
    stderr: ChildStderr,
    tail: &Mutex<VecDeque<String>>,
    progress: &Mutex<Option<f64>>,
    capacity: usize,
) {
    let mut line = Vec::with_capacity(256);
    let handle_line = |raw: &[u8]| {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }
        if let Some(secs) = parse_progress_time(text) {
            *progress.lock() = Some(secs);
            return;
        }
        let mut buffer = tail.lock();
        if buffer.len() >= capacity {
            buffer.pop_front();
        }
        buffer.push_back(text.to_string());
    };

    // ffmpeg rewrites its progress line with '\r', so both terminators end a line.
    for byte in BufReader::new(stderr).bytes() {
        let Ok(byte) = byte else { break };
        if byte == b'\n' || byte == b'\r' {
            handle_line(&line);
            line.clear();
        } else {
            line.push(byte);
        }
    }
    handle_line(&line);
}

/// Extract the `time=HH:MM:SS.xx` stamp from an ffmpeg progress line.
pub(crate) fn parse_progress_time(line: &str) -> Option<f64> {
    if !line.starts_with("frame=") && !line.starts_with("size=") {
        return None;
    }
    let start = line.find("time=")? + "time=".len();
    let value = line[start..].split_whitespace().next()?;

    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_line() {
        let line = "frame=  240 fps= 60 q=28.0 size=    1024kB time=00:01:02.50 bitrate=1342.2kbits/s speed=2.1x";
        assert_eq!(parse_progress_time(line), Some(62.5));
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert_eq!(parse_progress_time("Duration: 00:00:10.00, start: 0.000000"), None);
        assert_eq!(parse_progress_time("frame=  10 time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let engine = FfmpegEngine::new("/nonexistent/nva-test-ffmpeg");
        let invocation = EngineInvocation::new("noop", vec!["out.mp4".to_string()], "out.mp4");
        let err = match engine.start(&invocation) {
            Err(e) => e,
            Ok(_) => panic!("expected spawn failure"),
        };
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
