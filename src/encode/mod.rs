//! Frame sequence plus audio to an encoded H.264/AAC MP4.
//!
//! [`assembler::Assembler`] drives the export state machine over two [`VideoEncoder`]s: the
//! `ffmpeg` binary as primary and the in-process libav path as fallback.

use std::path::{Path, PathBuf};

use crate::foundation::config::EncoderOpts;
use crate::foundation::core::Fps;
use crate::foundation::error::ReelResult;

pub mod assembler;
pub mod ffmpeg;
pub mod libav;
pub mod manifest;
pub mod probe;

/// Everything an encoder needs for one export.
#[derive(Clone, Copy, Debug)]
pub struct EncodeJob<'a> {
    /// Frame files in frame-index order.
    pub frames: &'a [PathBuf],
    pub fps: Fps,
    /// Output is truncated to this many seconds.
    pub final_duration_secs: f64,
    pub audio: Option<&'a Path>,
    pub output: &'a Path,
    /// Encoder-private scratch space, removed after the export.
    pub scratch_dir: &'a Path,
    pub opts: &'a EncoderOpts,
}

impl EncodeJob<'_> {
    /// Number of leading frames that fit in `final_duration_secs`.
    pub fn frame_budget(&self) -> usize {
        let frames = (self.final_duration_secs * self.fps.as_f64()).round();
        if frames <= 0.0 {
            return 0;
        }
        (frames as usize).min(self.frames.len())
    }
}

pub trait VideoEncoder {
    fn name(&self) -> &'static str;

    /// Whether this encoder can run in the current environment.
    fn is_available(&self) -> bool;

    /// Why [`is_available`](Self::is_available) is false, phrased as what to do about it.
    fn unavailable_reason(&self) -> String {
        format!("{} is not available", self.name())
    }

    fn encode(&self, job: &EncodeJob<'_>) -> ReelResult<()>;
}

/// Final output duration: the shorter track wins, nothing is stretched.
pub fn reconcile_durations(video_secs: f64, audio_secs: Option<f64>) -> f64 {
    match audio_secs {
        Some(a) if a.is_finite() && a > 0.0 => video_secs.min(a),
        _ => video_secs,
    }
}
