use std::path::{Path, PathBuf};
use std::sync::Arc;

use resvg::tiny_skia;

use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::layout::text::{self, HAnchor, TextStyle};
use crate::layout::{Layout, LayoutFactory, LayoutSlots};
use crate::render::frame::FrameRGBA;
use crate::subtitle::entry::SubtitleEntry;

const DP_MARGIN_LEFT: i32 = 40;
const TEXT_MARGIN: i32 = 50;
const NAME_MARGIN: i32 = 30;
const MIN_SPACING: i32 = 40;
const LOGO_SIZE: u32 = 100;
const LOGO_MARGIN_RIGHT: i32 = 50;
const TITLE_FONT_SIZE: f32 = 60.0;
const NAME_FONT_SIZE: f32 = 30.0;
const SUBTITLE_FONT_SIZE: f32 = 40.0;
const RING_GAP: f32 = 4.0;
const RING_WIDTH: f32 = 4.0;

/// Serializable description of a [`PodcastLayout`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PodcastLayoutSpec {
    pub canvas: Canvas,
    pub header_height: u32,
    /// Edge length of the square speaker picture.
    pub picture_size: u32,
    pub show_speaker_names: bool,
    pub background: [u8; 3],
    pub header_background: [u8; 3],
    pub highlight: [u8; 3],
    pub default_title: String,
    /// Extra directories scanned for fonts on top of the system fonts.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for PodcastLayoutSpec {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            header_height: 150,
            picture_size: 120,
            show_speaker_names: true,
            background: [20, 20, 20],
            header_background: [30, 30, 30],
            highlight: [255, 200, 0],
            default_title: "My Podcast".to_owned(),
            font_dirs: Vec::new(),
        }
    }
}

impl PodcastLayoutSpec {
    pub fn validate(&self) -> ReelResult<()> {
        self.canvas.validate()?;
        if self.picture_size == 0 {
            return Err(ReelError::validation("picture_size must be > 0"));
        }
        if self.header_height >= self.canvas.height {
            return Err(ReelError::validation(format!(
                "header_height {} leaves no room on a {}px tall canvas",
                self.header_height, self.canvas.height
            )));
        }
        Ok(())
    }

    /// Top-left corner of each of `count` speaker pictures, stacked down the left edge.
    pub fn picture_positions(&self, count: usize) -> Vec<(i32, i32)> {
        let n = count as i32;
        let available = self.canvas.height as i32 - self.header_height as i32;
        let spacing = ((available - n * self.picture_size as i32) / (n + 1)).max(MIN_SPACING);
        let start_y = self.header_height as i32 + spacing;
        (0..n)
            .map(|i| {
                (
                    DP_MARGIN_LEFT,
                    start_y + i * (self.picture_size as i32 + spacing),
                )
            })
            .collect()
    }
}

/// Builds [`PodcastLayout`]s that all share one font database, loaded once up front.
pub struct PodcastLayoutFactory {
    spec: PodcastLayoutSpec,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl PodcastLayoutFactory {
    pub fn new(spec: PodcastLayoutSpec) -> ReelResult<Self> {
        spec.validate()?;
        let fontdb = build_fontdb(&spec.font_dirs);
        Ok(Self { spec, fontdb })
    }

    pub fn spec(&self) -> &PodcastLayoutSpec {
        &self.spec
    }

    pub fn fontdb(&self) -> &Arc<usvg::fontdb::Database> {
        &self.fontdb
    }
}

impl LayoutFactory for PodcastLayoutFactory {
    fn build(&self) -> ReelResult<Box<dyn Layout>> {
        Ok(Box::new(PodcastLayout::with_fontdb(
            self.spec.clone(),
            Arc::clone(&self.fontdb),
        )?))
    }
}

struct Speaker {
    name: String,
    picture: tiny_skia::Pixmap,
    position: (i32, i32),
}

/// Header with title and optional logo, speaker pictures down the left edge, and the active
/// line word-wrapped next to its speaker.
pub struct PodcastLayout {
    spec: PodcastLayoutSpec,
    fontdb: Arc<usvg::fontdb::Database>,
    speakers: Vec<Speaker>,
    logo: Option<tiny_skia::Pixmap>,
    title: String,
}

impl PodcastLayout {
    /// Standalone layout with its own font database.
    pub fn new(spec: PodcastLayoutSpec) -> ReelResult<Self> {
        spec.validate()?;
        let fontdb = build_fontdb(&spec.font_dirs);
        Self::with_fontdb(spec, fontdb)
    }

    pub fn with_fontdb(
        spec: PodcastLayoutSpec,
        fontdb: Arc<usvg::fontdb::Database>,
    ) -> ReelResult<Self> {
        spec.validate()?;
        let title = spec.default_title.clone();
        Ok(Self {
            spec,
            fontdb,
            speakers: Vec::new(),
            logo: None,
            title,
        })
    }

    pub fn spec(&self) -> &PodcastLayoutSpec {
        &self.spec
    }

    /// Registered speaker names in display order.
    pub fn speaker_names(&self) -> impl Iterator<Item = &str> {
        self.speakers.iter().map(|s| s.name.as_str())
    }

    fn relayout(&mut self) {
        let positions = self.spec.picture_positions(self.speakers.len());
        for (speaker, pos) in self.speakers.iter_mut().zip(positions) {
            speaker.position = pos;
        }
    }

    fn build_svg(&self, subtitle: Option<&SubtitleEntry>, opacity: u8) -> String {
        let Canvas { width, height } = self.spec.canvas;
        let dp = self.spec.picture_size as f32;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        svg.push_str(&rect(0, 0, width, height, self.spec.background));
        svg.push_str(&rect(0, 0, width, self.spec.header_height, self.spec.header_background));

        text::push_text(
            &mut svg,
            width as f32 / 2.0,
            (self.spec.header_height / 2) as f32,
            &self.title,
            TextStyle {
                font_size: TITLE_FONT_SIZE,
                rgb: [255, 255, 255],
                alpha: opacity,
                anchor: HAnchor::Middle,
            },
        );

        if self.spec.show_speaker_names {
            for s in &self.speakers {
                let (x, y) = s.position;
                text::push_text(
                    &mut svg,
                    x as f32 + dp / 2.0,
                    y as f32 + dp + NAME_MARGIN as f32,
                    &s.name,
                    TextStyle {
                        font_size: NAME_FONT_SIZE,
                        rgb: [200, 200, 200],
                        alpha: opacity,
                        anchor: HAnchor::Middle,
                    },
                );
            }
        }

        if let Some(sub) = subtitle {
            let active = self.speakers.iter().find(|s| s.name == sub.speaker());
            let text_x = DP_MARGIN_LEFT + self.spec.picture_size as i32 + TEXT_MARGIN;
            let text_y = match active {
                Some(s) => {
                    let (x, y) = s.position;
                    let [r, g, b] = self.spec.highlight;
                    svg.push_str(&format!(
                        r#"<circle cx="{cx}" cy="{cy}" r="{radius}" fill="none" stroke="rgb({r},{g},{b})" stroke-width="{RING_WIDTH}" stroke-opacity="{alpha:.4}"/>"#,
                        cx = x as f32 + dp / 2.0,
                        cy = y as f32 + dp / 2.0,
                        radius = dp / 2.0 + RING_GAP,
                        alpha = f32::from(opacity) / 255.0,
                    ));
                    y as f32 + dp / 2.0
                }
                // Unregistered speakers still get their line, centered below the header.
                None => (self.spec.header_height + (height - self.spec.header_height) / 2) as f32,
            };
            let max_width = (width as i32 - text_x - TEXT_MARGIN).max(1) as f32;
            text::push_wrapped_text(
                &mut svg,
                text_x as f32,
                text_y,
                max_width,
                sub.text(),
                TextStyle {
                    font_size: SUBTITLE_FONT_SIZE,
                    rgb: [255, 255, 255],
                    alpha: opacity,
                    anchor: HAnchor::Start,
                },
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Layout for PodcastLayout {
    fn slots(&self) -> LayoutSlots {
        LayoutSlots {
            logo: true,
            title: true,
        }
    }

    fn canvas(&self) -> Canvas {
        self.spec.canvas
    }

    fn add_speaker(&mut self, name: &str, image_path: &Path) -> ReelResult<()> {
        let size = self.spec.picture_size;
        let img = load_rgba(image_path)?;
        let img = image::imageops::resize(&img, size, size, image::imageops::FilterType::Lanczos3);
        let picture = pixmap_from_straight(circle_mask(img))?;

        if let Some(existing) = self.speakers.iter_mut().find(|s| s.name == name) {
            existing.picture = picture;
        } else {
            self.speakers.push(Speaker {
                name: name.to_owned(),
                picture,
                position: (0, 0),
            });
        }
        self.relayout();
        Ok(())
    }

    fn set_logo(&mut self, path: &Path) -> ReelResult<()> {
        let img = load_rgba(path)?;
        let img = image::imageops::resize(
            &img,
            LOGO_SIZE,
            LOGO_SIZE,
            image::imageops::FilterType::Lanczos3,
        );
        self.logo = Some(pixmap_from_straight(img)?);
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> ReelResult<()> {
        self.title = title.to_owned();
        Ok(())
    }

    fn create_frame(
        &mut self,
        subtitle: Option<&SubtitleEntry>,
        opacity: u8,
    ) -> ReelResult<FrameRGBA> {
        let Canvas { width, height } = self.spec.canvas;
        let svg = self.build_svg(subtitle, opacity);
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| ReelError::layout(format!("failed to build frame scene: {e}")))?;

        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| ReelError::layout("failed to allocate frame pixmap"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let paint = tiny_skia::PixmapPaint::default();
        if let Some(logo) = &self.logo {
            let x = width as i32 - LOGO_SIZE as i32 - LOGO_MARGIN_RIGHT;
            let y = (self.spec.header_height as i32 - LOGO_SIZE as i32) / 2;
            pixmap.draw_pixmap(x, y, logo.as_ref(), &paint, tiny_skia::Transform::identity(), None);
        }
        for s in &self.speakers {
            let (x, y) = s.position;
            pixmap.draw_pixmap(
                x,
                y,
                s.picture.as_ref(),
                &paint,
                tiny_skia::Transform::identity(),
                None,
            );
        }

        Ok(FrameRGBA {
            width,
            height,
            data: pixmap.take(),
            premultiplied: true,
        })
    }
}

fn rect(x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) -> String {
    let [r, g, b] = rgb;
    format!(r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="rgb({r},{g},{b})"/>"#)
}

fn load_rgba(path: &Path) -> ReelResult<image::RgbaImage> {
    let img = image::open(path).map_err(|e| {
        ReelError::layout(format!("failed to load image '{}': {e}", path.display()))
    })?;
    Ok(img.to_rgba8())
}

/// Fade alpha to zero outside the inscribed circle, with a one pixel soft edge.
fn circle_mask(mut img: image::RgbaImage) -> image::RgbaImage {
    let (w, h) = img.dimensions();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let radius = cx.min(cy);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let coverage = (radius - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
        px.0[3] = (f32::from(px.0[3]) * coverage).round() as u8;
    }
    img
}

fn pixmap_from_straight(img: image::RgbaImage) -> ReelResult<tiny_skia::Pixmap> {
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
    let size = tiny_skia::IntSize::from_wh(w, h)
        .ok_or_else(|| ReelError::layout("image has zero width or height"))?;
    tiny_skia::Pixmap::from_vec(data, size)
        .ok_or_else(|| ReelError::layout("image buffer does not match its dimensions"))
}

const PREFERRED_SANS: [&str; 6] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
    "FreeSans",
];

fn build_fontdb(extra_dirs: &[PathBuf]) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    for dir in extra_dirs {
        db.load_fonts_dir(dir);
    }

    let has_family = |db: &usvg::fontdb::Database, name: &str| {
        db.faces()
            .any(|f| f.families.iter().any(|(fam, _)| fam == name))
    };
    let sans = PREFERRED_SANS
        .iter()
        .find(|name| has_family(&db, **name))
        .map(|s| (*s).to_owned())
        .or_else(|| {
            db.faces()
                .next()
                .and_then(|f| f.families.first().map(|(fam, _)| fam.clone()))
        });
    match sans {
        Some(family) => db.set_sans_serif_family(family),
        None => tracing::warn!("no fonts found; frames will render without text"),
    }
    Arc::new(db)
}

#[cfg(test)]
#[path = "../../tests/unit/layout/podcast.rs"]
mod tests;
