use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};
use crate::store::frame_store::FrameStore;

const TEMP_PREFIX: &str = "podreel-";

/// Resources owned by one generation run: the temporary directory that holds the frame store,
/// plus the media references export needs.
///
/// The directory is released by [`PipelineState::teardown`] or, failing that, when the state
/// is dropped.
#[derive(Debug)]
pub struct PipelineState {
    temp: Option<tempfile::TempDir>,
    root: PathBuf,
    store: FrameStore,
    total_frames: u64,
    audio: Option<PathBuf>,
    logo: Option<PathBuf>,
    title: Option<String>,
}

impl PipelineState {
    /// Create a fresh run directory under `temp_root` (system temp dir when `None`).
    pub fn create(temp_root: Option<&Path>) -> ReelResult<Self> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix(TEMP_PREFIX);
            b
        };
        let temp = match temp_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| ReelError::io(root, e))?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("create run directory in '{}'", root.display()))?
            }
            None => builder.tempdir().context("create run directory")?,
        };
        let root = temp.path().to_path_buf();
        tracing::debug!(path = %root.display(), "run directory created");
        Ok(Self {
            store: FrameStore::new(&root),
            root,
            temp: Some(temp),
            total_frames: 0,
            audio: None,
            logo: None,
            title: None,
        })
    }

    pub fn with_media(
        mut self,
        audio: Option<PathBuf>,
        logo: Option<PathBuf>,
        title: Option<String>,
    ) -> Self {
        self.audio = audio;
        self.logo = logo;
        self.title = title;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FrameStore {
        &mut self.store
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total: u64) {
        self.total_frames = total;
    }

    pub fn audio(&self) -> Option<&Path> {
        self.audio.as_deref()
    }

    pub fn logo(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether [`teardown`](Self::teardown) already removed the run directory.
    pub fn is_released(&self) -> bool {
        self.temp.is_none()
    }

    /// Remove the run directory. Failures are logged, never returned. Safe to call twice.
    pub fn teardown(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => tracing::debug!(path = %self.root.display(), "run directory removed"),
            Err(e) => tracing::warn!(
                path = %self.root.display(),
                error = %e,
                "failed to remove run directory"
            ),
        }
    }
}
