//! Per-attempt temporary files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use tempfile::{Builder, TempPath};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique token for temp names: timestamp, process id and a counter.
pub fn unique_token() -> String {
    format!(
        "{}_{}_{}",
        Local::now().format("%Y%m%d%H%M%S%3f"),
        std::process::id(),
        TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Owns the temporaries of one attempt. Dropping the scope removes them.
pub struct AttemptScope {
    dir: PathBuf,
    token: String,
    files: Vec<TempPath>,
}

impl AttemptScope {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            token: unique_token(),
            files: Vec::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths currently owned by the scope.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|p| p.to_path_buf()).collect()
    }

    /// Write a text file named `<stem>_<token>*<suffix>`.
    pub fn write_file(&mut self, stem: &str, suffix: &str, contents: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let mut file = Builder::new()
            .prefix(&format!("{}_{}_", stem, self.token))
            .suffix(suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(self.keep(file.into_temp_path()))
    }

    /// Concat demuxer manifest listing `inputs` in order.
    ///
    /// Paths are made absolute and single quotes escaped the way the
    /// concat demuxer expects (`'` becomes `'\''`).
    pub fn write_manifest(&mut self, inputs: &[PathBuf]) -> io::Result<PathBuf> {
        let mut contents = String::new();
        for input in inputs {
            let absolute = std::path::absolute(input)?;
            let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
            contents.push_str(&format!("file '{}'\n", escaped));
        }
        self.write_file("concat", ".txt", &contents)
    }

    /// Copy `source` to a token-named path without characters that need
    /// escaping in filter arguments.
    pub fn safe_copy(&mut self, source: &Path, stem: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let target = Builder::new()
            .prefix(&format!("{}_{}_", stem, self.token))
            .suffix(&extension)
            .rand_bytes(6)
            .tempfile_in(&self.dir)?
            .into_temp_path();
        fs::copy(source, &target)?;
        Ok(self.keep(target))
    }

    fn keep(&mut self, path: TempPath) -> PathBuf {
        let owned = path.to_path_buf();
        self.files.push(path);
        owned
    }
}

impl Drop for AttemptScope {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                tracing::warn!("Failed to remove temp file {}: {}", shown, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tokens_are_unique() {
        let a = unique_token();
        let b = unique_token();
        assert_ne!(a, b);
        assert!(a.contains(&std::process::id().to_string()));
    }

    #[test]
    fn manifest_lists_inputs_in_order_and_escapes_quotes() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.mp4");
        let second = dir.path().join("it's.mp4");

        let mut scope = AttemptScope::new(dir.path());
        let manifest = scope.write_manifest(&[first.clone(), second.clone()]).unwrap();

        let text = fs::read_to_string(&manifest).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("file '{}'", first.display()));
        assert!(lines[1].ends_with("it'\\''s.mp4'"));
        let name = manifest.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("concat_{}_", scope.token())));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn drop_removes_every_temporary() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("narration [final].srt");
        fs::write(&source, "1\n00:00:01,000 --> 00:00:02,000\nhi\n").unwrap();

        let (manifest, copy) = {
            let mut scope = AttemptScope::new(dir.path().join("work"));
            let manifest = scope.write_manifest(&[source.clone()]).unwrap();
            let copy = scope.safe_copy(&source, "subs").unwrap();
            assert!(manifest.exists());
            assert_eq!(fs::read_to_string(&copy).unwrap(), fs::read_to_string(&source).unwrap());
            assert!(copy.extension().is_some_and(|e| e == "srt"));
            (manifest, copy)
        };

        assert!(!manifest.exists());
        assert!(!copy.exists());
        assert!(source.exists());
    }

    #[test]
    fn drop_tolerates_files_removed_early() {
        crate::logging::init_test_tracing();
        let dir = tempdir().unwrap();
        let manifest = {
            let mut scope = AttemptScope::new(dir.path());
            let manifest = scope.write_manifest(&[dir.path().join("a.mp4")]).unwrap();
            fs::remove_file(&manifest).unwrap();
            manifest
        };
        assert!(!manifest.exists());
    }
}
