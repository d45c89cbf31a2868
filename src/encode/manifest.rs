//! `ffmpeg` concat-demuxer manifest over the ordered frame files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

pub const MANIFEST_FILE_NAME: &str = "frames_list.txt";

#[derive(Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Ordered `file` / `duration` pairs. Rendering is deterministic: the same frames and rate
/// always produce the same bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct ConcatManifest {
    entries: Vec<ManifestEntry>,
}

impl ConcatManifest {
    /// One entry per frame lasting `1/fps`; with `shorten_last` the final entry lasts half a
    /// frame.
    pub fn new(frames: &[PathBuf], fps: Fps, shorten_last: bool) -> ReelResult<Self> {
        if frames.is_empty() {
            return Err(ReelError::encode("cannot build a concat manifest with no frames"));
        }
        let step = fps.frame_duration_secs();
        let mut entries = frames
            .iter()
            .map(|p| ManifestEntry {
                path: p.clone(),
                duration_secs: step,
            })
            .collect::<Vec<_>>();
        if shorten_last && let Some(last) = entries.last_mut() {
            last.duration_secs = step / 2.0;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.entries.iter().map(|e| e.duration_secs).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 64);
        out.push_str("ffconcat version 1.0\n");
        for e in &self.entries {
            let _ = writeln!(out, "file '{}'", escape_concat_path(&e.path));
            let _ = writeln!(out, "duration {:.6}", e.duration_secs);
        }
        // The demuxer ignores the last duration unless the file is listed again.
        if let Some(last) = self.entries.last() {
            let _ = writeln!(out, "file '{}'", escape_concat_path(&last.path));
        }
        out
    }

    /// Write the manifest into `dir` and return its path.
    pub fn write_to_dir(&self, dir: &Path) -> ReelResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&path, self.render()).map_err(|e| ReelError::io(&path, e))?;
        Ok(path)
    }
}

/// Quote a path for a single-quoted concat `file` directive.
pub fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[cfg(test)]
#[path = "../../tests/unit/encode/manifest.rs"]
mod tests;
