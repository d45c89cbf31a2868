//! Pipeline configuration.
//!
//! Every field has a default, so a JSON config file only needs the keys it overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};

/// Default number of frame tasks per batch.
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Top-level configuration for one generate/export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output frame rate.
    pub fps: Fps,
    /// Maximum frame tasks per batch.
    pub batch_size: usize,
    /// Render worker count policy.
    pub workers: WorkerPolicy,
    /// Consecutive batches submitted together; `1` keeps batches strictly sequential.
    pub batches_in_flight: usize,
    /// What a single frame failure does to the run.
    pub failure_policy: FailurePolicy,
    /// Encoder path selection.
    pub encoder: EncoderChoice,
    /// Encoder tuning.
    pub encoder_opts: EncoderOpts,
    /// Output canvas; passed to layouts that take their size from configuration.
    pub canvas: Canvas,
    /// Keep rendered frames after export so it can be repeated.
    pub retain_frames: bool,
    /// Parent directory for the run's scratch space (system temp dir when unset).
    pub temp_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: WorkerPolicy::Most,
            batches_in_flight: 1,
            failure_policy: FailurePolicy::BestEffort,
            encoder: EncoderChoice::Auto,
            encoder_opts: EncoderOpts::default(),
            canvas: Canvas::default(),
            retain_frames: false,
            temp_root: None,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ReelResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.batch_size == 0 {
            return Err(ReelError::validation("batch_size must be >= 1"));
        }
        if self.batches_in_flight == 0 {
            return Err(ReelError::validation("batches_in_flight must be >= 1"));
        }
        if let WorkerPolicy::Count(0) = self.workers {
            return Err(ReelError::validation("explicit worker count must be >= 1"));
        }
        if self.encoder_opts.crf > 51 {
            return Err(ReelError::validation("crf must be within 0..=51"));
        }
        self.canvas.validate()
    }
}

/// How many render workers to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkerPolicy {
    /// One worker.
    Single,
    /// Half the cores.
    Half,
    /// All cores but one.
    Most,
    /// All cores.
    Max,
    /// Explicit count.
    Count(usize),
}

impl WorkerPolicy {
    /// Resolve to a concrete worker count for a machine with `cores` logical CPUs.
    pub fn resolve(self, cores: usize) -> usize {
        match self {
            Self::Single => 1,
            Self::Half => (cores / 2).max(1),
            Self::Most => cores.saturating_sub(1).max(1),
            Self::Max => cores.max(1),
            Self::Count(n) => n.max(1),
        }
    }

    /// Resolve against the current machine.
    pub fn resolve_local(self) -> usize {
        self.resolve(num_cpus::get())
    }
}

impl FromStr for WorkerPolicy {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "half" => Ok(Self::Half),
            "most" => Ok(Self::Most),
            "max" => Ok(Self::Max),
            other => match other.parse::<usize>() {
                Ok(0) => Err(ReelError::validation("explicit worker count must be >= 1")),
                Ok(n) => Ok(Self::Count(n)),
                Err(_) => Err(ReelError::validation(format!(
                    "invalid worker policy '{s}' (expected single, half, most, max or a count)"
                ))),
            },
        }
    }
}

impl TryFrom<String> for WorkerPolicy {
    type Error = ReelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkerPolicy> for String {
    fn from(value: WorkerPolicy) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for WorkerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Half => f.write_str("half"),
            Self::Most => f.write_str("most"),
            Self::Max => f.write_str("max"),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Reaction to a frame that fails to render or persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the frame, leave a gap, keep going. Gaps are reported after rendering.
    #[default]
    BestEffort,
    /// Abort the batch (and the run) on the first failed frame.
    FailBatch,
}

/// Which encoder path export may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderChoice {
    /// Primary when available, fallback when it is missing or fails.
    #[default]
    Auto,
    /// Primary only; unavailability or failure is fatal.
    Primary,
    /// Fallback only.
    Fallback,
}

impl FromStr for EncoderChoice {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "primary" | "ffmpeg" => Ok(Self::Primary),
            "fallback" | "libav" => Ok(Self::Fallback),
            _ => Err(ReelError::validation(format!(
                "invalid encoder choice '{s}' (expected auto, primary or fallback)"
            ))),
        }
    }
}

/// Encoder tuning shared by both encoder paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOpts {
    /// libx264 preset for CPU encoding.
    pub x264_preset: String,
    /// libx264 constant rate factor.
    pub crf: u8,
    /// NVENC preset for GPU encoding.
    pub nvenc_preset: String,
    /// GPU target bitrate.
    pub video_bitrate: String,
    /// GPU bitrate ceiling.
    pub max_bitrate: String,
    /// AAC bitrate when audio is present.
    pub audio_bitrate: String,
    /// Allow the GPU encoder when the toolchain is detected.
    pub hardware_accel: bool,
    /// Halve the last frame's manifest duration.
    pub shorten_last_frame: bool,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            x264_preset: "faster".to_string(),
            crf: 23,
            nvenc_preset: "p7".to_string(),
            video_bitrate: "8M".to_string(),
            max_bitrate: "10M".to_string(),
            audio_bitrate: "192k".to_string(),
            hardware_accel: true,
            shorten_last_frame: false,
        }
    }
}

/// Parse a bitrate string such as `192k` or `8M` into bits per second.
pub fn parse_bitrate(s: &str) -> ReelResult<usize> {
    let s = s.trim();
    let (digits, mult) = match s.chars().last() {
        Some('k' | 'K') => (&s[..s.len() - 1], 1_000),
        Some('m' | 'M') => (&s[..s.len() - 1], 1_000_000),
        _ => (s, 1),
    };
    digits
        .parse::<usize>()
        .map(|v| v * mult)
        .map_err(|_| ReelError::validation(format!("invalid bitrate '{s}'")))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
