//! SRT output.

use std::fs;
use std::io;
use std::path::Path;

use super::types::SubtitleTrack;

/// Render `track` as SRT. Cue indices are written as stored.
pub fn to_srt(track: &SubtitleTrack) -> String {
    let mut out = String::new();
    for cue in &track.cues {
        out.push_str(&format!("{}\n{} --> {}\n", cue.index, cue.start, cue.end));
        for line in &cue.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Write `track` to `path` via a temp file and rename.
pub fn write_srt(track: &SubtitleTrack, path: &Path) -> io::Result<()> {
    let temp = path.with_extension("srt.tmp");
    fs::write(&temp, to_srt(track))?;
    fs::rename(&temp, path)
}
