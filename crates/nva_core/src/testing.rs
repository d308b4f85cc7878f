//! Scripted engine and inspector used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{EngineError, EngineInvocation, EngineProcess, ProcessState, TranscodeEngine};
use crate::inspect::{InspectError, InspectResult, MediaInspector};
use crate::models::MediaDescriptor;

/// Descriptor for a typical stock clip.
pub fn clip(path: impl Into<PathBuf>, codec: &str, width: u32, height: u32, fps: f64) -> MediaDescriptor {
    MediaDescriptor {
        video_codec: codec.to_string(),
        audio_codec: Some("aac".to_string()),
        width,
        height,
        nominal_fps: fps,
        average_fps: fps,
        duration_secs: 10.0,
        byte_size: 1024 * 1024,
        ..MediaDescriptor::new(path)
    }
}

/// Create `count` small files named `clip_000.mp4`, ... in `dir`.
pub fn touch_clips(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("clip_{:03}.mp4", i));
            fs::write(&path, format!("clip {}", i)).unwrap();
            path
        })
        .collect()
}

/// Inspector answering from a table.
///
/// Existing files that are not in the table get a uniform 1280x720@30 h264
/// descriptor, so merge outputs can be fed back in.
#[derive(Default)]
pub struct FakeInspector {
    known: HashMap<PathBuf, MediaDescriptor>,
    failing: HashSet<PathBuf>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip(mut self, path: &Path, codec: &str, width: u32, height: u32, fps: f64) -> Self {
        self.known
            .insert(path.to_path_buf(), clip(path, codec, width, height, fps));
        self
    }

    pub fn with_descriptor(mut self, descriptor: MediaDescriptor) -> Self {
        self.known.insert(descriptor.path.clone(), descriptor);
        self
    }

    pub fn failing(mut self, path: &Path) -> Self {
        self.failing.insert(path.to_path_buf());
        self
    }
}

impl MediaInspector for FakeInspector {
    fn inspect(&self, path: &Path) -> InspectResult<MediaDescriptor> {
        self.calls.lock().push(path.to_path_buf());
        if self.failing.contains(path) {
            return Err(InspectError::InvalidOutput {
                path: path.to_path_buf(),
                message: "moov atom not found".to_string(),
            });
        }
        if let Some(d) = self.known.get(path) {
            return Ok(d.clone());
        }
        if path.exists() {
            let mut d = clip(path, "h264", 1280, 720, 30.0);
            d.byte_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            return Ok(d);
        }
        Err(InspectError::NotFound(path.to_path_buf()))
    }
}

/// What a scripted process does once started.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Writes the output file and exits 0.
    Succeed,
    /// Exits 0 without producing output.
    SucceedWithoutOutput,
    /// Exits 1 with this stderr line.
    Fail(String),
    /// Writes partial output and runs until stopped.
    /// Exits on SIGTERM only when `honors_term` is set.
    Hang { honors_term: bool },
    /// Terminated by a signal nobody in the process sent.
    KilledExternally,
    /// Writes partial output, then dies of SIGSEGV.
    Crashed,
}

/// Engine that plays back one script per started process.
pub struct ScriptedEngine {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    pub invocations: Mutex<Vec<EngineInvocation>>,
    /// Contents of every concat manifest seen at start, in order.
    pub manifests: Mutex<Vec<String>>,
    /// `"term"` and `"kill"` events, in order.
    pub stops: Arc<Mutex<Vec<&'static str>>>,
    refuse_to_start: bool,
}

impl ScriptedEngine {
    /// Every process succeeds.
    pub fn succeeding() -> Self {
        Self::with_scripts(Vec::new())
    }

    /// Processes follow `scripts` in order, then succeed.
    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: Script::Succeed,
            invocations: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
            stops: Arc::new(Mutex::new(Vec::new())),
            refuse_to_start: false,
        }
    }

    /// Every process fails with `message`.
    pub fn always_failing(message: &str) -> Self {
        let mut engine = Self::succeeding();
        engine.fallback = Script::Fail(message.to_string());
        engine
    }

    /// Behaves like a missing binary.
    pub fn unavailable() -> Self {
        let mut engine = Self::succeeding();
        engine.refuse_to_start = true;
        engine
    }

    pub fn start_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn invocation(&self, index: usize) -> EngineInvocation {
        self.invocations.lock()[index].clone()
    }

    /// File names listed in the `index`-th manifest.
    pub fn manifest_names(&self, index: usize) -> Vec<String> {
        self.manifests.lock()[index]
            .lines()
            .filter_map(|l| l.strip_prefix("file '")?.strip_suffix('\''))
            .filter_map(|p| Path::new(p).file_name().map(|n| n.to_string_lossy().to_string()))
            .collect()
    }
}

impl TranscodeEngine for ScriptedEngine {
    fn program(&self) -> &str {
        "fake-ffmpeg"
    }

    fn start(&self, invocation: &EngineInvocation) -> Result<Box<dyn EngineProcess>, EngineError> {
        if self.refuse_to_start {
            return Err(EngineError::spawn(
                "fake-ffmpeg",
                io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            ));
        }
        self.invocations.lock().push(invocation.clone());
        for pair in invocation.args.windows(2) {
            if pair[0] == "-i" && pair[1].ends_with(".txt") {
                if let Ok(text) = fs::read_to_string(&pair[1]) {
                    self.manifests.lock().push(text);
                }
            }
        }
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Script::Hang { .. } | Script::Crashed = script {
            fs::write(&invocation.output, b"partial").map_err(EngineError::Io)?;
        }

        Ok(Box::new(FakeProcess {
            script,
            output: invocation.output.clone(),
            term_requested: false,
            killed: false,
            stops: Arc::clone(&self.stops),
        }))
    }
}

struct FakeProcess {
    script: Script,
    output: PathBuf,
    term_requested: bool,
    killed: bool,
    stops: Arc<Mutex<Vec<&'static str>>>,
}

impl EngineProcess for FakeProcess {
    fn poll(&mut self) -> io::Result<ProcessState> {
        let state = match &self.script {
            Script::Succeed => {
                if !self.output.exists() {
                    fs::write(&self.output, b"fake media")?;
                }
                ProcessState::Exited {
                    success: true,
                    code: Some(0),
                }
            }
            Script::SucceedWithoutOutput => ProcessState::Exited {
                success: true,
                code: Some(0),
            },
            Script::Fail(_) => ProcessState::Exited {
                success: false,
                code: Some(1),
            },
            Script::Hang { honors_term } => {
                if self.killed {
                    ProcessState::Signalled { signal: Some(9) }
                } else if self.term_requested && *honors_term {
                    ProcessState::Exited {
                        success: false,
                        code: Some(255),
                    }
                } else {
                    ProcessState::Running
                }
            }
            Script::KilledExternally => ProcessState::Signalled { signal: Some(9) },
            Script::Crashed => ProcessState::Signalled { signal: Some(11) },
        };
        Ok(state)
    }

    fn request_graceful_stop(&mut self) -> io::Result<()> {
        self.term_requested = true;
        self.stops.lock().push("term");
        Ok(())
    }

    fn force_stop(&mut self) -> io::Result<()> {
        self.killed = true;
        self.stops.lock().push("kill");
        Ok(())
    }

    fn diagnostics(&self) -> Vec<String> {
        match &self.script {
            Script::Fail(message) => vec![
                "    encoder         : Lavf60.3.100".to_string(),
                message.clone(),
            ],
            Script::Hang { .. } => vec!["frame=  120 fps=0.0".to_string()],
            _ => Vec::new(),
        }
    }
}
