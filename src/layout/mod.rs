//! Frame composition capability consumed by the render scheduler.
//!
//! A [`Layout`] rasterizes one frame for a subtitle context. Layouts hold drawing state (decoded
//! pictures, font databases) that is not shared across threads: each render worker builds its
//! own instance through a [`LayoutFactory`].

use std::path::{Path, PathBuf};

use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::FrameRGBA;
use crate::subtitle::entry::SubtitleEntry;

/// Podcast-style layout: header, speaker pictures and wrapped subtitle text.
pub mod podcast;
/// SVG text helpers shared by layouts.
pub mod text;

/// Optional configuration slots a layout supports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutSlots {
    pub logo: bool,
    pub title: bool,
}

pub trait Layout {
    /// Slots this layout declares. The orchestrator only calls setters for declared slots.
    fn slots(&self) -> LayoutSlots;

    /// Output dimensions of every frame this layout produces.
    fn canvas(&self) -> Canvas;

    fn add_speaker(&mut self, name: &str, image_path: &Path) -> ReelResult<()>;

    fn set_logo(&mut self, _path: &Path) -> ReelResult<()> {
        Err(ReelError::layout("layout has no logo slot"))
    }

    fn set_title(&mut self, _title: &str) -> ReelResult<()> {
        Err(ReelError::layout("layout has no title slot"))
    }

    /// Rasterize one frame. `subtitle` is `None` for frames with no active line.
    fn create_frame(
        &mut self,
        subtitle: Option<&SubtitleEntry>,
        opacity: u8,
    ) -> ReelResult<FrameRGBA>;
}

/// Builds fresh, independent [`Layout`] instances.
pub trait LayoutFactory: Send + Sync {
    fn build(&self) -> ReelResult<Box<dyn Layout>>;
}

/// Speakers, logo and title applied to every layout instance.
#[derive(Clone, Debug, Default)]
pub struct LayoutSetup {
    pub speakers: Vec<(String, PathBuf)>,
    pub logo: Option<PathBuf>,
    pub title: Option<String>,
}

/// Wraps a factory so every built layout is configured the same way.
pub struct ConfiguredFactory<'a> {
    inner: &'a dyn LayoutFactory,
    setup: &'a LayoutSetup,
}

impl<'a> ConfiguredFactory<'a> {
    pub fn new(inner: &'a dyn LayoutFactory, setup: &'a LayoutSetup) -> Self {
        Self { inner, setup }
    }

    pub fn build(&self) -> ReelResult<Box<dyn Layout>> {
        let mut layout = self.inner.build()?;
        apply_setup(layout.as_mut(), self.setup)?;
        Ok(layout)
    }
}

/// Register speakers and fill the declared optional slots.
pub fn apply_setup(layout: &mut dyn Layout, setup: &LayoutSetup) -> ReelResult<()> {
    for (name, path) in &setup.speakers {
        layout.add_speaker(name, path)?;
    }
    let slots = layout.slots();
    if let Some(logo) = setup.logo.as_deref() {
        if slots.logo {
            layout.set_logo(logo)?;
        } else {
            tracing::debug!(path = %logo.display(), "layout declares no logo slot; logo ignored");
        }
    }
    if let Some(title) = setup.title.as_deref() {
        if slots.title {
            layout.set_title(title)?;
        } else {
            tracing::debug!("layout declares no title slot; title ignored");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/layout/mod.rs"]
mod tests;
