use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::encode::manifest::ConcatManifest;
use crate::encode::probe::{is_tool_on_path, nvenc_available};
use crate::encode::{EncodeJob, VideoEncoder};
use crate::foundation::config::EncoderOpts;
use crate::foundation::error::{ReelError, ReelResult};

const VIDEO_ONLY_FILE_NAME: &str = "video_only.mp4";

/// Video codec path for the `ffmpeg` encode pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acceleration {
    Nvenc,
    Cpu { threads: usize },
}

/// libx264 thread count: at least 4, otherwise one less than the core count.
pub fn cpu_threads(cores: usize) -> usize {
    cores.saturating_sub(1).max(4)
}

/// Primary encoder: the system `ffmpeg` binary fed through the concat demuxer.
///
/// Encodes a video-only stream first, then muxes audio in a second pass with the video
/// stream copied.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `ffmpeg` executable instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Write the concat manifest for `job` into its scratch directory.
    pub fn write_manifest(&self, job: &EncodeJob<'_>) -> ReelResult<PathBuf> {
        ConcatManifest::new(job.frames, job.fps, job.opts.shorten_last_frame)?
            .write_to_dir(job.scratch_dir)
    }

    fn acceleration(&self, opts: &EncoderOpts) -> Acceleration {
        if opts.hardware_accel && nvenc_available(&self.program) {
            Acceleration::Nvenc
        } else {
            Acceleration::Cpu {
                threads: cpu_threads(num_cpus::get()),
            }
        }
    }

    fn run(&self, args: &[OsString]) -> ReelResult<()> {
        let out = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ReelError::encode(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ReelError::encode(format!(
                "ffmpeg exited with status {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        is_tool_on_path(&self.program)
    }

    fn unavailable_reason(&self) -> String {
        format!(
            "'{}' could not be run; install ffmpeg and make sure it is on PATH",
            self.program.display()
        )
    }

    fn encode(&self, job: &EncodeJob<'_>) -> ReelResult<()> {
        let manifest = self.write_manifest(job)?;
        let video_out = match job.audio {
            Some(_) => job.scratch_dir.join(VIDEO_ONLY_FILE_NAME),
            None => job.output.to_path_buf(),
        };

        let accel = self.acceleration(job.opts);
        match accel {
            Acceleration::Nvenc => tracing::info!("using NVIDIA GPU acceleration for video encoding"),
            Acceleration::Cpu { threads } => {
                tracing::info!(threads, "using CPU encoding")
            }
        }

        let first = self.run(&video_pass_args(job, accel, &manifest, &video_out));
        match (first, accel) {
            (Ok(()), _) => {}
            (Err(e), Acceleration::Nvenc) => {
                tracing::warn!(error = %e, "GPU encode failed; retrying on CPU");
                let cpu = Acceleration::Cpu {
                    threads: cpu_threads(num_cpus::get()),
                };
                self.run(&video_pass_args(job, cpu, &manifest, &video_out))?;
            }
            (Err(e), Acceleration::Cpu { .. }) => return Err(e),
        }

        if let Some(audio) = job.audio {
            tracing::info!(audio = %audio.display(), "muxing audio");
            self.run(&mux_pass_args(job, &video_out, audio))?;
        }
        Ok(())
    }
}

fn secs_arg(secs: f64) -> String {
    format!("{secs:.3}")
}

/// Arguments for the video-only pass over the concat manifest.
pub fn video_pass_args(
    job: &EncodeJob<'_>,
    accel: Acceleration,
    manifest: &Path,
    out: &Path,
) -> Vec<OsString> {
    let opts = job.opts;
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
    args.push(manifest.as_os_str().to_owned());
    args.extend([
        OsString::from("-t"),
        OsString::from(secs_arg(job.final_duration_secs)),
        OsString::from("-an"),
    ]);

    let codec: Vec<String> = match accel {
        Acceleration::Nvenc => vec![
            "-c:v".into(),
            "h264_nvenc".into(),
            "-preset".into(),
            opts.nvenc_preset.clone(),
            "-tune".into(),
            "hq".into(),
            "-rc".into(),
            "vbr".into(),
            "-b:v".into(),
            opts.video_bitrate.clone(),
            "-maxrate".into(),
            opts.max_bitrate.clone(),
        ],
        Acceleration::Cpu { threads } => vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            opts.x264_preset.clone(),
            "-crf".into(),
            opts.crf.to_string(),
            "-threads".into(),
            threads.to_string(),
        ],
    };
    args.extend(codec.into_iter().map(OsString::from));

    args.extend(
        [
            "-r".to_string(),
            format!("{}/{}", job.fps.num, job.fps.den),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
        ]
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_owned());
    args
}

/// Arguments for the audio mux pass: video copied, audio re-encoded to AAC.
pub fn mux_pass_args(job: &EncodeJob<'_>, video: &Path, audio: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(video.as_os_str().to_owned());
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());
    args.extend(
        [
            "-map".to_string(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            job.opts.audio_bitrate.clone(),
            "-t".into(),
            secs_arg(job.final_duration_secs),
            "-shortest".into(),
            "-movflags".into(),
            "+faststart".into(),
        ]
        .map(OsString::from),
    );
    args.push(job.output.as_os_str().to_owned());
    args
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
