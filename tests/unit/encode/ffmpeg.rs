use super::*;
use crate::foundation::core::Fps;

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
}

fn after<'a>(args: &'a [String], flag: &str) -> &'a str {
    let i = args.iter().position(|a| a == flag).unwrap();
    &args[i + 1]
}

fn with_job<R>(audio: Option<&Path>, f: impl FnOnce(&EncodeJob<'_>) -> R) -> R {
    let frames = vec![PathBuf::from("/run/batch_0/frame_00000000.png")];
    let opts = EncoderOpts::default();
    let job = EncodeJob {
        frames: &frames,
        fps: Fps::integer(30).unwrap(),
        final_duration_secs: 10.0,
        audio,
        output: Path::new("/out/podcast.mp4"),
        scratch_dir: Path::new("/run/encode"),
        opts: &opts,
    };
    f(&job)
}

#[test]
fn cpu_threads_floor_is_four() {
    assert_eq!(cpu_threads(1), 4);
    assert_eq!(cpu_threads(4), 4);
    assert_eq!(cpu_threads(16), 15);
}

#[test]
fn cpu_video_pass_uses_x264_settings() {
    let args = with_job(None, |job| {
        strings(&video_pass_args(
            job,
            Acceleration::Cpu { threads: 7 },
            Path::new("/run/encode/frames_list.txt"),
            job.output,
        ))
    });
    assert_eq!(after(&args, "-f"), "concat");
    assert_eq!(after(&args, "-safe"), "0");
    assert_eq!(after(&args, "-i"), "/run/encode/frames_list.txt");
    assert_eq!(after(&args, "-t"), "10.000");
    assert_eq!(after(&args, "-c:v"), "libx264");
    assert_eq!(after(&args, "-preset"), "faster");
    assert_eq!(after(&args, "-crf"), "23");
    assert_eq!(after(&args, "-threads"), "7");
    assert_eq!(after(&args, "-pix_fmt"), "yuv420p");
    assert_eq!(after(&args, "-movflags"), "+faststart");
    assert!(args.contains(&"-an".to_string()));
    assert_eq!(args.last().unwrap(), "/out/podcast.mp4");
}

#[test]
fn gpu_video_pass_uses_nvenc_settings() {
    let args = with_job(None, |job| {
        strings(&video_pass_args(
            job,
            Acceleration::Nvenc,
            Path::new("m.txt"),
            Path::new("v.mp4"),
        ))
    });
    assert_eq!(after(&args, "-c:v"), "h264_nvenc");
    assert_eq!(after(&args, "-preset"), "p7");
    assert_eq!(after(&args, "-tune"), "hq");
    assert_eq!(after(&args, "-rc"), "vbr");
    assert_eq!(after(&args, "-b:v"), "8M");
    assert_eq!(after(&args, "-maxrate"), "10M");
    assert!(!args.contains(&"-crf".to_string()));
}

#[test]
fn mux_pass_copies_video_and_encodes_aac() {
    let audio = Path::new("/in/voice.wav");
    let args = with_job(Some(audio), |job| {
        strings(&mux_pass_args(job, Path::new("/run/encode/video_only.mp4"), audio))
    });
    assert_eq!(after(&args, "-c:v"), "copy");
    assert_eq!(after(&args, "-c:a"), "aac");
    assert_eq!(after(&args, "-b:a"), "192k");
    assert_eq!(after(&args, "-t"), "10.000");
    assert!(args.contains(&"-shortest".to_string()));
    assert_eq!(
        args.iter().filter(|a| *a == "-map").count(),
        2
    );
    assert_eq!(args.last().unwrap(), "/out/podcast.mp4");
}

#[test]
fn manifest_is_written_into_scratch_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let frames = vec![PathBuf::from("/a/frame_00000000.png")];
    let opts = EncoderOpts::default();
    let job = EncodeJob {
        frames: &frames,
        fps: Fps::integer(30).unwrap(),
        final_duration_secs: 1.0,
        audio: None,
        output: Path::new("out.mp4"),
        scratch_dir: tmp.path(),
        opts: &opts,
    };
    let enc = FfmpegEncoder::new();
    let path = enc.write_manifest(&job).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("file '/a/frame_00000000.png'"));
}

#[test]
fn missing_binary_is_unavailable() {
    let enc = FfmpegEncoder::with_program("/nonexistent/ffmpeg-binary");
    assert!(!enc.is_available());
    assert_eq!(enc.name(), "ffmpeg");
}
