use std::path::{Path, PathBuf};

use crate::encode::assembler::{Assembler, ExportReport, ExportRequest};
use crate::encode::ffmpeg::FfmpegEncoder;
use crate::encode::libav::LibavEncoder;
use crate::encode::VideoEncoder;
use crate::foundation::config::PipelineConfig;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::layout::{ConfiguredFactory, LayoutFactory, LayoutSetup};
use crate::render::scheduler::{RenderProgress, RenderReport, RenderScheduler};
use crate::session::state::PipelineState;
use crate::store::frame_store::save_png;
use crate::subtitle::entry::SubtitleEntry;
use crate::timeline::batch::Batcher;
use crate::timeline::planner::plan_timeline;

/// Scratch directory for encoder-private files, inside the run directory.
const ENCODE_DIR: &str = "encode";
/// Gap reports list at most this many frame indices.
const GAP_SAMPLE: usize = 10;

/// Media that accompanies the subtitles.
#[derive(Clone, Debug, Default)]
pub struct MediaInputs {
    /// `(name, picture)` for every speaker tag used in the subtitles.
    pub speakers: Vec<(String, PathBuf)>,
    pub audio: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub title: Option<String>,
}

impl MediaInputs {
    fn layout_setup(&self) -> LayoutSetup {
        LayoutSetup {
            speakers: self.speakers.clone(),
            logo: self.logo.clone(),
            title: self.title.clone(),
        }
    }
}

/// Entry point: subtitles in, rendered frames out, then [`GeneratedVideo::export`].
pub struct VideoGenerator {
    config: PipelineConfig,
    factory: Box<dyn LayoutFactory>,
    scheduler: RenderScheduler,
}

impl VideoGenerator {
    pub fn new(config: PipelineConfig, factory: impl LayoutFactory + 'static) -> ReelResult<Self> {
        config.validate()?;
        let scheduler = RenderScheduler::from_config(&config)?;
        Ok(Self {
            config,
            factory: Box::new(factory),
            scheduler,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn generate(
        &self,
        subtitles: &[SubtitleEntry],
        media: MediaInputs,
    ) -> ReelResult<GeneratedVideo> {
        self.generate_with_progress(subtitles, media, &mut |_| {})
    }

    /// Plan, batch and render every frame. `on_progress` sees each frame completion.
    #[tracing::instrument(skip_all, fields(subtitles = subtitles.len()))]
    pub fn generate_with_progress(
        &self,
        subtitles: &[SubtitleEntry],
        media: MediaInputs,
        on_progress: &mut dyn FnMut(&RenderProgress),
    ) -> ReelResult<GeneratedVideo> {
        let plan = plan_timeline(subtitles, self.config.fps)?;
        if plan.is_empty() {
            return Err(ReelError::validation(
                "subtitles produce no frames (every entry is shorter than one frame)",
            ));
        }
        let total_frames = plan.total_frames;
        tracing::info!(
            frames = total_frames,
            secs = plan.video_duration_secs(self.config.fps),
            "timeline planned"
        );

        let setup = media.layout_setup();
        let mut state = PipelineState::create(self.config.temp_root.as_deref())?.with_media(
            media.audio,
            media.logo,
            media.title,
        );
        state.set_total_frames(total_frames);

        let batches = Batcher::new(self.config.batch_size)?.partition(plan.tasks);
        tracing::info!(
            batches = batches.len(),
            batch_size = self.config.batch_size,
            workers = self.scheduler.workers(),
            "rendering"
        );

        let factory = ConfiguredFactory::new(self.factory.as_ref(), &setup);
        let report = self
            .scheduler
            .run(&batches, state.store_mut(), &factory, on_progress)?;

        let missing = state.store().missing_frames(total_frames);
        if !missing.is_empty() {
            tracing::warn!(
                missing = missing.len(),
                first = ?sample(&missing),
                "frame sequence has gaps; the video will skip those frames"
            );
        }

        Ok(GeneratedVideo {
            config: self.config.clone(),
            state,
            report,
            missing,
        })
    }

    /// Render one frame to `path` as PNG through the configured layout.
    pub fn render_preview(
        &self,
        subtitle: Option<&SubtitleEntry>,
        opacity: u8,
        media: &MediaInputs,
        path: &Path,
    ) -> ReelResult<()> {
        let setup = media.layout_setup();
        let mut layout = ConfiguredFactory::new(self.factory.as_ref(), &setup).build()?;
        let frame = layout.create_frame(subtitle, opacity)?;
        save_png(path, &frame, [0, 0, 0, 255])
    }
}

fn sample(missing: &[FrameIndex]) -> Vec<u64> {
    missing.iter().take(GAP_SAMPLE).map(|f| f.0).collect()
}

/// Rendered frames waiting for export.
#[derive(Debug)]
pub struct GeneratedVideo {
    config: PipelineConfig,
    state: PipelineState,
    report: RenderReport,
    missing: Vec<FrameIndex>,
}

impl GeneratedVideo {
    pub fn render_report(&self) -> &RenderReport {
        &self.report
    }

    pub fn total_frames(&self) -> u64 {
        self.state.total_frames()
    }

    /// Frame indices that failed to render.
    pub fn missing_frames(&self) -> &[FrameIndex] {
        &self.missing
    }

    pub fn frames_dir(&self) -> Option<&Path> {
        (!self.state.is_released()).then(|| self.state.root())
    }

    /// Finalized frame paths in frame-index order.
    pub fn frames(&self) -> ReelResult<Vec<PathBuf>> {
        self.ensure_live()?;
        self.state.store().finalize()
    }

    /// Encode to `output` with the `ffmpeg` binary, falling back to libav.
    pub fn export(&mut self, output: &Path) -> ReelResult<ExportReport> {
        let primary = FfmpegEncoder::new();
        let fallback = LibavEncoder::new();
        self.export_with(output, &primary, &fallback)
    }

    /// Encode with explicit encoders.
    ///
    /// Unless `retain_frames` is set the run directory is removed afterwards, successful or
    /// not, and later exports fail.
    pub fn export_with(
        &mut self,
        output: &Path,
        primary: &dyn VideoEncoder,
        fallback: &dyn VideoEncoder,
    ) -> ReelResult<ExportReport> {
        self.ensure_live()?;
        let frames = self.state.store().finalize()?;
        let scratch = self.state.root().join(ENCODE_DIR);
        let audio = self.state.audio().map(Path::to_path_buf);
        let retain = self.config.retain_frames;

        let req = ExportRequest {
            frames: &frames,
            fps: self.config.fps,
            audio: audio.as_deref(),
            output,
            scratch_dir: &scratch,
            opts: &self.config.encoder_opts,
        };
        let state = &mut self.state;
        Assembler::new(primary, fallback, self.config.encoder).run(&req, || {
            if !retain {
                state.teardown();
            }
        })
    }

    fn ensure_live(&self) -> ReelResult<()> {
        if self.state.is_released() {
            return Err(ReelError::validation("frames already released"));
        }
        Ok(())
    }
}
