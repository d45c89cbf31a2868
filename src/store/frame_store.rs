use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::FrameRGBA;

/// Still-image extension for persisted frames (lossless).
pub const FRAME_EXT: &str = "png";
/// Zero-padded decimal width of the frame index in file names.
pub const INDEX_WIDTH: usize = 8;

const FRAME_PREFIX: &str = "frame_";
const BATCH_PREFIX: &str = "batch_";

/// `frame_00000042.png`
pub fn frame_file_name(frame_index: FrameIndex) -> String {
    format!(
        "{FRAME_PREFIX}{:0width$}.{FRAME_EXT}",
        frame_index.0,
        width = INDEX_WIDTH
    )
}

/// Parse the frame index back out of a persisted frame's file name.
pub fn parse_frame_index(path: &Path) -> Option<FrameIndex> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(FRAME_EXT) {
        return None;
    }
    let digits = stem.strip_prefix(FRAME_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(FrameIndex)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameStoreEntry {
    pub frame_index: FrameIndex,
    pub path: PathBuf,
}

/// Handle to one batch's directory. Cheap to clone and safe to share across workers: every
/// frame index maps to its own file, so concurrent writers never touch the same path.
#[derive(Clone, Debug)]
pub struct BatchDir {
    batch_index: usize,
    path: PathBuf,
    background: [u8; 4],
}

impl BatchDir {
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `frame` as `batch_dir/frame_{index:08}.png` and return the path.
    ///
    /// Alpha is flattened over the store background so the persisted image is opaque.
    pub fn persist(&self, frame_index: FrameIndex, frame: &FrameRGBA) -> ReelResult<PathBuf> {
        let path = self.path.join(frame_file_name(frame_index));
        save_png(&path, frame, self.background)?;
        Ok(path)
    }
}

/// Flatten `frame` over `bg_rgba` and write it to `path` as PNG.
pub fn save_png(path: &Path, frame: &FrameRGBA, bg_rgba: [u8; 4]) -> ReelResult<()> {
    let rgba = frame.to_opaque_rgba8(bg_rgba)?;
    image::save_buffer_with_format(
        path,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| {
        let source = match e {
            image::ImageError::IoError(io) => io,
            other => std::io::Error::other(other),
        };
        ReelError::io(path, source)
    })
}

/// Disk-backed, append-only index of rendered frames.
#[derive(Debug)]
pub struct FrameStore {
    root: PathBuf,
    background: [u8; 4],
    entries: Vec<FrameStoreEntry>,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            background: [0, 0, 0, 255],
            entries: Vec::new(),
        }
    }

    /// Background used when flattening translucent frames.
    pub fn with_background(mut self, bg_rgba: [u8; 4]) -> Self {
        self.background = bg_rgba;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (idempotently) `root/batch_<i>`.
    pub fn allocate_batch_directory(&self, batch_index: usize) -> ReelResult<BatchDir> {
        let path = self.root.join(format!("{BATCH_PREFIX}{batch_index}"));
        std::fs::create_dir_all(&path).map_err(|e| ReelError::io(&path, e))?;
        Ok(BatchDir {
            batch_index,
            path,
            background: self.background,
        })
    }

    /// Append a persisted frame to the index.
    pub fn record(&mut self, entry: FrameStoreEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrameStoreEntry] {
        &self.entries
    }

    /// All recorded paths, ordered by the frame index parsed from each file name.
    ///
    /// The file name is the authoritative sort key; a name that does not parse, or two
    /// entries for the same index, is an error.
    pub fn finalize(&self) -> ReelResult<Vec<PathBuf>> {
        let mut keyed = self
            .entries
            .iter()
            .map(|e| {
                parse_frame_index(&e.path)
                    .map(|idx| (idx, e.path.clone()))
                    .ok_or_else(|| {
                        ReelError::validation(format!(
                            "frame store entry '{}' does not carry a frame index",
                            e.path.display()
                        ))
                    })
            })
            .collect::<ReelResult<Vec<_>>>()?;
        keyed.sort_by_key(|(idx, _)| *idx);

        if let Some(w) = keyed.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ReelError::validation(format!(
                "frame {} was persisted more than once",
                w[0].0
            )));
        }
        Ok(keyed.into_iter().map(|(_, p)| p).collect())
    }

    /// Indices in `[0, total)` with no recorded frame.
    pub fn missing_frames(&self, total: u64) -> Vec<FrameIndex> {
        let mut seen = vec![false; total as usize];
        for e in &self.entries {
            if let Some(idx) = parse_frame_index(&e.path)
                && let Some(slot) = seen.get_mut(idx.0 as usize)
            {
                *slot = true;
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, present)| !**present)
            .map(|(i, _)| FrameIndex(i as u64))
            .collect()
    }

    /// Rebuild the index from the `batch_*` directories on disk.
    ///
    /// Returns the number of frames found.
    pub fn rescan(&mut self) -> ReelResult<usize> {
        let mut entries = Vec::new();
        let dirs = std::fs::read_dir(&self.root)
            .with_context(|| format!("read frame store root '{}'", self.root.display()))?;
        for dir in dirs {
            let dir = dir.with_context(|| format!("list '{}'", self.root.display()))?;
            let name = dir.file_name();
            let is_batch = name.to_str().is_some_and(|n| n.starts_with(BATCH_PREFIX));
            if !is_batch || !dir.path().is_dir() {
                continue;
            }
            let batch_path = dir.path();
            for file in std::fs::read_dir(&batch_path)
                .with_context(|| format!("list '{}'", batch_path.display()))?
            {
                let path = file
                    .with_context(|| format!("list '{}'", batch_path.display()))?
                    .path();
                if let Some(frame_index) = parse_frame_index(&path) {
                    entries.push(FrameStoreEntry { frame_index, path });
                }
            }
        }
        self.entries = entries;
        Ok(self.entries.len())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/frame_store.rs"]
mod tests;
