use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use podreel::render::scheduler::RenderProgress;
use podreel::subtitle::srt::read_srt;
use podreel::{
    EncoderChoice, FailurePolicy, Fps, MediaInputs, PipelineConfig, PodcastLayoutFactory,
    PodcastLayoutSpec, VideoGenerator, WorkerPolicy,
};

/// Frames between progress lines (batch ends always report).
const PROGRESS_STRIDE: u64 = 100;

#[derive(Parser, Debug)]
#[command(name = "podreel", version)]
struct Cli {
    /// More logging (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an SRT file into an MP4 video.
    Render(RenderArgs),
    /// Render one subtitle entry as a PNG.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Speaker picture, as NAME=IMAGE (repeatable).
    #[arg(long = "speaker", value_parser = parse_speaker)]
    speakers: Vec<(String, PathBuf)>,

    /// Logo image shown in the header.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Header title.
    #[arg(long)]
    title: Option<String>,

    /// Pipeline configuration JSON; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Speaker-tagged subtitles (`[Name] text`).
    #[arg(long)]
    srt: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Audio track muxed into the video.
    #[arg(long)]
    audio: Option<PathBuf>,

    #[command(flatten)]
    layout: LayoutArgs,

    #[arg(long)]
    fps: Option<u32>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// single, half, most, max or a count.
    #[arg(long)]
    workers: Option<WorkerPolicy>,

    #[arg(long)]
    batches_in_flight: Option<usize>,

    /// auto, primary or fallback.
    #[arg(long)]
    encoder: Option<EncoderChoice>,

    /// libx264 preset.
    #[arg(long)]
    preset: Option<String>,

    /// Abort on the first frame that fails to render.
    #[arg(long)]
    fail_on_frame_error: bool,

    /// Keep rendered frames after export.
    #[arg(long)]
    keep_frames: bool,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[arg(long)]
    srt: PathBuf,

    /// 1-based subtitle entry to draw.
    #[arg(long)]
    entry: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 255)]
    opacity: u8,

    #[command(flatten)]
    layout: LayoutArgs,
}

fn parse_speaker(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=IMAGE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() || path.trim().is_empty() {
        return Err(format!("expected NAME=IMAGE, got '{s}'"));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "podreel=info",
        (false, 1) => "podreel=debug",
        (false, _) => "podreel=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::from_path(p)?,
        None => PipelineConfig::default(),
    })
}

fn media(layout: LayoutArgs, audio: Option<PathBuf>) -> MediaInputs {
    MediaInputs {
        speakers: layout.speakers,
        audio,
        logo: layout.logo,
        title: layout.title,
    }
}

fn layout_spec(cfg: &PipelineConfig) -> PodcastLayoutSpec {
    PodcastLayoutSpec {
        canvas: cfg.canvas,
        ..PodcastLayoutSpec::default()
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.layout.config.as_deref())?;
    if let Some(fps) = args.fps {
        cfg.fps = Fps::integer(fps)?;
    }
    if let Some(n) = args.batch_size {
        cfg.batch_size = n;
    }
    if let Some(w) = args.workers {
        cfg.workers = w;
    }
    if let Some(n) = args.batches_in_flight {
        cfg.batches_in_flight = n;
    }
    if let Some(e) = args.encoder {
        cfg.encoder = e;
    }
    if let Some(p) = args.preset {
        cfg.encoder_opts.x264_preset = p;
    }
    if args.fail_on_frame_error {
        cfg.failure_policy = FailurePolicy::FailBatch;
    }
    if args.keep_frames {
        cfg.retain_frames = true;
    }

    let subtitles = read_srt(&args.srt)?;
    let layouts = PodcastLayoutFactory::new(layout_spec(&cfg))?;
    let generator = VideoGenerator::new(cfg.clone(), layouts)?;
    let mut report_progress = |p: &RenderProgress| {
        if p.is_report_point(PROGRESS_STRIDE) {
            tracing::info!(
                "rendered {}/{} frames ({:.1}%)",
                p.frames_done,
                p.frames_total,
                p.percent()
            );
        }
    };
    let mut video = generator.generate_with_progress(
        &subtitles,
        media(args.layout, args.audio),
        &mut report_progress,
    )?;
    let report = video.export(&args.out)?;

    if let Some(dir) = video.frames_dir() {
        eprintln!("frames kept in {}", dir.display());
    }
    println!("{}", report.output.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.layout.config.as_deref())?;
    let subtitles = read_srt(&args.srt)?;
    let entry = args
        .entry
        .checked_sub(1)
        .and_then(|i| subtitles.get(i))
        .with_context(|| {
            format!(
                "entry {} out of range ({} entries in '{}')",
                args.entry,
                subtitles.len(),
                args.srt.display()
            )
        })?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let layouts = PodcastLayoutFactory::new(layout_spec(&cfg))?;
    let generator = VideoGenerator::new(cfg.clone(), layouts)?;
    generator.render_preview(
        Some(entry),
        args.opacity,
        &media(args.layout, None),
        &args.out,
    )?;
    println!("{}", args.out.display());
    Ok(())
}
