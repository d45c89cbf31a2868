use std::fmt;
use std::path::{Path, PathBuf};

use crate::encode::probe::{ensure_parent_dir, probe_audio_duration};
use crate::encode::{EncodeJob, VideoEncoder, reconcile_durations};
use crate::foundation::config::{EncoderChoice, EncoderOpts};
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

/// Stages of one export, in the order they can be visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportStage {
    Idle,
    ComputeDurations,
    SelectEncoder,
    PrimaryEncode,
    PrimaryFailed,
    FallbackEncode,
    Cleanup,
    Done,
}

impl ExportStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ComputeDurations => "compute_durations",
            Self::SelectEncoder => "select_encoder",
            Self::PrimaryEncode => "primary_encode",
            Self::PrimaryFailed => "primary_failed",
            Self::FallbackEncode => "fallback_encode",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of one export.
#[derive(Clone, Copy, Debug)]
pub struct ExportRequest<'a> {
    /// Finalized frame paths in frame-index order.
    pub frames: &'a [PathBuf],
    pub fps: Fps,
    pub audio: Option<&'a Path>,
    pub output: &'a Path,
    /// Created before encoding and removed during cleanup.
    pub scratch_dir: &'a Path,
    pub opts: &'a EncoderOpts,
}

/// What an export did.
#[derive(Clone, Debug)]
pub struct ExportReport {
    pub output: PathBuf,
    /// Every stage visited, in order.
    pub stages: Vec<ExportStage>,
    pub encoder_used: &'static str,
    pub final_duration_secs: f64,
    /// Why the primary encoder was skipped or failed, when the fallback ran.
    pub primary_error: Option<String>,
}

pub type AudioProbe = fn(&Path) -> ReelResult<f64>;

/// Drives the export state machine over a primary and a fallback encoder.
pub struct Assembler<'a> {
    primary: &'a dyn VideoEncoder,
    fallback: &'a dyn VideoEncoder,
    choice: EncoderChoice,
    audio_probe: AudioProbe,
}

enum Plan {
    Primary { fallback_allowed: bool },
    FallbackOnly { reason: Option<String> },
}

struct StageLog {
    stages: Vec<ExportStage>,
}

impl StageLog {
    fn enter(&mut self, stage: ExportStage) {
        tracing::info!(stage = %stage, "export stage");
        self.stages.push(stage);
    }
}

impl<'a> Assembler<'a> {
    pub fn new(
        primary: &'a dyn VideoEncoder,
        fallback: &'a dyn VideoEncoder,
        choice: EncoderChoice,
    ) -> Self {
        Self {
            primary,
            fallback,
            choice,
            audio_probe: probe_audio_duration,
        }
    }

    /// Replace the audio duration probe (`ffprobe` by default).
    pub fn with_audio_probe(mut self, probe: AudioProbe) -> Self {
        self.audio_probe = probe;
        self
    }

    /// Run the export. `on_cleanup` runs during the cleanup stage whether or not encoding
    /// succeeded; the scratch directory is removed at the same point.
    #[tracing::instrument(skip_all, fields(output = %req.output.display(), frames = req.frames.len()))]
    pub fn run(
        &self,
        req: &ExportRequest<'_>,
        on_cleanup: impl FnOnce(),
    ) -> ReelResult<ExportReport> {
        let mut log = StageLog {
            stages: vec![ExportStage::Idle],
        };
        let result = self.encode_stages(req, &mut log);

        log.enter(ExportStage::Cleanup);
        on_cleanup();
        remove_scratch(req.scratch_dir);

        let (final_duration_secs, encoder_used, primary_error) = result?;
        log.enter(ExportStage::Done);
        tracing::info!(encoder = encoder_used, output = %req.output.display(), "export complete");
        Ok(ExportReport {
            output: req.output.to_path_buf(),
            stages: log.stages,
            encoder_used,
            final_duration_secs,
            primary_error,
        })
    }

    fn encode_stages(
        &self,
        req: &ExportRequest<'_>,
        log: &mut StageLog,
    ) -> ReelResult<(f64, &'static str, Option<String>)> {
        log.enter(ExportStage::ComputeDurations);
        if req.frames.is_empty() {
            return Err(ReelError::validation("no frames to export"));
        }
        let final_duration_secs = self.final_duration(req);

        log.enter(ExportStage::SelectEncoder);
        let plan = self.select()?;

        std::fs::create_dir_all(req.scratch_dir)
            .map_err(|e| ReelError::io(req.scratch_dir, e))?;
        ensure_parent_dir(req.output)?;

        let job = EncodeJob {
            frames: req.frames,
            fps: req.fps,
            final_duration_secs,
            audio: req.audio,
            output: req.output,
            scratch_dir: req.scratch_dir,
            opts: req.opts,
        };

        let primary_error = match plan {
            Plan::Primary { fallback_allowed } => {
                log.enter(ExportStage::PrimaryEncode);
                tracing::info!(encoder = self.primary.name(), "encoding");
                match self.primary.encode(&job) {
                    Ok(()) => return Ok((final_duration_secs, self.primary.name(), None)),
                    Err(e) if fallback_allowed && self.fallback.is_available() => {
                        log.enter(ExportStage::PrimaryFailed);
                        tracing::warn!(
                            encoder = self.primary.name(),
                            error = %e,
                            "primary encoder failed; trying fallback"
                        );
                        Some(e.to_string())
                    }
                    Err(e) => {
                        log.enter(ExportStage::PrimaryFailed);
                        return Err(e);
                    }
                }
            }
            Plan::FallbackOnly { reason } => reason,
        };

        log.enter(ExportStage::FallbackEncode);
        tracing::info!(encoder = self.fallback.name(), "encoding");
        self.fallback.encode(&job)?;
        Ok((final_duration_secs, self.fallback.name(), primary_error))
    }

    fn final_duration(&self, req: &ExportRequest<'_>) -> f64 {
        let video = req.fps.frames_to_secs(req.frames.len() as u64);
        let audio = req.audio.and_then(|path| match (self.audio_probe)(path) {
            Ok(secs) => Some(secs),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "could not probe audio duration; using video duration"
                );
                None
            }
        });
        let final_secs = reconcile_durations(video, audio);
        tracing::info!(video_secs = video, audio_secs = ?audio, final_secs, "durations");
        final_secs
    }

    fn select(&self) -> ReelResult<Plan> {
        let primary = self.primary.is_available();
        match self.choice {
            EncoderChoice::Primary if primary => Ok(Plan::Primary {
                fallback_allowed: false,
            }),
            EncoderChoice::Primary => Err(ReelError::encoder_unavailable(format!(
                "{} was required but is unavailable: {}",
                self.primary.name(),
                self.primary.unavailable_reason()
            ))),
            EncoderChoice::Fallback => self.fallback_only(None),
            EncoderChoice::Auto if primary => Ok(Plan::Primary {
                fallback_allowed: true,
            }),
            EncoderChoice::Auto => {
                let reason = self.primary.unavailable_reason();
                tracing::warn!(encoder = self.fallback.name(), "{reason}; using fallback");
                self.fallback_only(Some(reason))
            }
        }
    }

    fn fallback_only(&self, reason: Option<String>) -> ReelResult<Plan> {
        if self.fallback.is_available() {
            return Ok(Plan::FallbackOnly { reason });
        }
        let fallback = self.fallback.unavailable_reason();
        let msg = match reason {
            Some(primary) => format!("no encoder can run: {primary}; {fallback}"),
            None => fallback,
        };
        Err(ReelError::encoder_unavailable(msg))
    }
}

fn remove_scratch(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to remove scratch directory");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/assembler.rs"]
mod tests;
