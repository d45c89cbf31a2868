use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Return `true` when `program -version` runs successfully.
pub fn is_tool_on_path(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    is_tool_on_path(Path::new("ffmpeg"))
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    is_tool_on_path(Path::new("ffprobe"))
}

/// NVIDIA hardware encoding is usable: the driver answers and `ffmpeg` lists `h264_nvenc`.
pub fn nvenc_available(ffmpeg: &Path) -> bool {
    let driver = Command::new("nvidia-smi")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !driver {
        return false;
    }
    Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output()
        .map(|out| out.status.success() && lists_encoder(&out.stdout, "h264_nvenc"))
        .unwrap_or(false)
}

fn lists_encoder(encoders_output: &[u8], name: &str) -> bool {
    String::from_utf8_lossy(encoders_output)
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(name))
}

/// Duration of a media file in seconds.
///
/// Asks `ffprobe` from `PATH`; when that cannot answer and the `libav` feature is built,
/// reads the container duration in-process instead.
pub fn probe_audio_duration(path: &Path) -> ReelResult<f64> {
    probe_audio_duration_with(Path::new("ffprobe"), path)
}

/// [`probe_audio_duration`] with an explicit `ffprobe` executable.
pub fn probe_audio_duration_with(ffprobe: &Path, path: &Path) -> ReelResult<f64> {
    run_ffprobe(ffprobe, path).or_else(|e| in_process_duration(path, e))
}

#[cfg(feature = "libav")]
fn in_process_duration(path: &Path, ffprobe_error: ReelError) -> ReelResult<f64> {
    tracing::debug!(error = %ffprobe_error, "ffprobe could not answer; probing with libav");
    crate::encode::libav::container_duration(path)
}

#[cfg(not(feature = "libav"))]
fn in_process_duration(_path: &Path, ffprobe_error: ReelError) -> ReelResult<f64> {
    Err(ffprobe_error)
}

fn run_ffprobe(ffprobe: &Path, path: &Path) -> ReelResult<f64> {
    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("failed to run '{}'", ffprobe.display()))?;
    if !out.status.success() {
        return Err(ReelError::encode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_ffprobe_duration(&out.stdout)
}

/// Parse the `format.duration` field out of `ffprobe -of json` output.
pub fn parse_ffprobe_duration(json: &[u8]) -> ReelResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ReelError::encode(format!("ffprobe json parse failed: {e}")))?;
    let raw = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| ReelError::encode("ffprobe reported no duration"))?;
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ReelError::encode(format!("ffprobe duration '{raw}' is not a number")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ReelError::encode(format!(
            "ffprobe duration {secs} is not positive"
        )));
    }
    Ok(secs)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Write `secs` of 8 kHz mono 16-bit silence as a WAV file.
#[cfg(test)]
pub(crate) fn write_silent_wav(path: &Path, secs: u32) {
    const RATE: u32 = 8_000;
    let data_len = RATE * 2 * secs;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&RATE.to_le_bytes());
    wav.extend_from_slice(&(RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    std::fs::write(path, wav).unwrap();
}
