//! In-process fallback encoder over libav (cargo feature `libav`).
//!
//! Decodes the PNG frame sequence, converts RGBA to YUV420P with the software scaler and
//! encodes H.264. Audio, when present, is decoded, resampled to 44.1 kHz planar-float stereo
//! and encoded to AAC, interleaved with the video by presentation time. Both streams stop at
//! the job's final duration.

use crate::encode::{EncodeJob, VideoEncoder};
use crate::foundation::error::ReelResult;

/// Library-based fallback encoder. Slower than the `ffmpeg` binary path, but needs no
/// external executable.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibavEncoder;

impl LibavEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl VideoEncoder for LibavEncoder {
    fn name(&self) -> &'static str {
        "libav"
    }

    fn is_available(&self) -> bool {
        backend::available()
    }

    fn unavailable_reason(&self) -> String {
        backend::unavailable_reason().to_owned()
    }

    fn encode(&self, job: &EncodeJob<'_>) -> ReelResult<()> {
        backend::encode(job)
    }
}

/// Container duration in seconds, read in-process.
#[cfg(feature = "libav")]
pub use backend::container_duration;

#[cfg(not(feature = "libav"))]
mod backend {
    use crate::encode::EncodeJob;
    use crate::foundation::error::{ReelError, ReelResult};

    const NOT_BUILT: &str = "the libav fallback encoder was not compiled in; rebuild with \
                             `--features libav` (needs the FFmpeg development libraries)";

    pub(super) fn available() -> bool {
        false
    }

    pub(super) fn unavailable_reason() -> &'static str {
        NOT_BUILT
    }

    pub(super) fn encode(_job: &EncodeJob<'_>) -> ReelResult<()> {
        Err(ReelError::encoder_unavailable(NOT_BUILT))
    }
}

#[cfg(feature = "libav")]
mod backend {
    use std::path::Path;

    use ffmpeg_next as ffmpeg;

    use ffmpeg::codec;
    use ffmpeg::format::{self, Pixel, Sample};
    use ffmpeg::software::scaling::{Context as Scaler, Flags as ScaleFlags};
    use ffmpeg::util::channel_layout::ChannelLayout;
    use ffmpeg::util::frame::{audio::Audio as AudioFrame, video::Video as VideoFrame};
    use ffmpeg::{Dictionary, Packet, Rational};

    use crate::encode::EncodeJob;
    use crate::foundation::config::parse_bitrate;
    use crate::foundation::error::{ReelError, ReelResult};

    const AUDIO_RATE: i32 = 44_100;
    /// Units of `AVFormatContext::duration`.
    const AV_TIME_BASE: f64 = 1_000_000.0;
    const VIDEO_STREAM: usize = 0;
    const AUDIO_STREAM: usize = 1;

    fn av(what: &'static str) -> impl Fn(ffmpeg::Error) -> ReelError {
        move |e| ReelError::encode(format!("{what}: {e}"))
    }

    pub(super) fn available() -> bool {
        ffmpeg::init().is_ok()
            && ffmpeg::encoder::find(codec::Id::H264).is_some()
            && ffmpeg::encoder::find(codec::Id::AAC).is_some()
    }

    pub(super) fn unavailable_reason() -> &'static str {
        "the linked libav has no H.264 or AAC encoder; link against an FFmpeg built with \
         libx264 and the native AAC encoder"
    }

    pub fn container_duration(path: &Path) -> ReelResult<f64> {
        ffmpeg::init().map_err(av("initialize libav"))?;
        let ictx = format::input(&path)
            .map_err(|e| ReelError::encode(format!("open '{}': {e}", path.display())))?;
        // AV_NOPTS_VALUE (unknown) is negative.
        let raw = ictx.duration();
        if raw <= 0 {
            return Err(ReelError::encode(format!(
                "'{}' does not report a duration",
                path.display()
            )));
        }
        Ok(raw as f64 / AV_TIME_BASE)
    }

    pub(super) fn encode(job: &EncodeJob<'_>) -> ReelResult<()> {
        ffmpeg::init().map_err(av("initialize libav"))?;

        let budget = job.frame_budget();
        let first = job
            .frames
            .first()
            .ok_or_else(|| ReelError::encode("no frames to encode"))?;
        let (width, height) = image::image_dimensions(first).map_err(|e| {
            ReelError::encode(format!("read frame size from '{}': {e}", first.display()))
        })?;

        let mut octx = format::output(&job.output).map_err(av("open output"))?;
        let global_header = octx
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        // H.264 stream. Encoder time base is one tick per frame.
        let frame_tb = Rational::new(job.fps.den as i32, job.fps.num as i32);
        let h264 = ffmpeg::encoder::find(codec::Id::H264)
            .ok_or_else(|| ReelError::encoder_unavailable("libav has no H.264 encoder"))?;
        let mut ost = octx.add_stream(h264).map_err(av("add video stream"))?;
        let mut venc = codec::context::Context::new_with_codec(h264)
            .encoder()
            .video()
            .map_err(av("create video encoder"))?;
        venc.set_width(width);
        venc.set_height(height);
        venc.set_format(Pixel::YUV420P);
        venc.set_time_base(frame_tb);
        venc.set_frame_rate(Some(Rational::new(
            job.fps.num as i32,
            job.fps.den as i32,
        )));
        if global_header {
            venc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let mut vopts = Dictionary::new();
        if h264.name() == "libx264" {
            vopts.set("preset", &job.opts.x264_preset);
            vopts.set("crf", &job.opts.crf.to_string());
        } else {
            venc.set_bit_rate(parse_bitrate(&job.opts.video_bitrate)?);
        }
        let mut venc = venc.open_with(vopts).map_err(av("open video encoder"))?;
        ost.set_parameters(&venc);
        ost.set_time_base(frame_tb);

        let mut audio = match job.audio {
            Some(path) => Some(AudioTrack::open(
                path,
                &mut octx,
                global_header,
                parse_bitrate(&job.opts.audio_bitrate)?,
                (job.final_duration_secs * f64::from(AUDIO_RATE)).round() as i64,
            )?),
            None => None,
        };

        let mut header_opts = Dictionary::new();
        header_opts.set("movflags", "+faststart");
        octx.write_header_with(header_opts)
            .map_err(av("write output header"))?;
        let video_ost_tb = stream_time_base(&octx, VIDEO_STREAM)?;
        if let Some(a) = audio.as_mut() {
            a.ost_tb = stream_time_base(&octx, AUDIO_STREAM)?;
        }

        let mut scaler = Scaler::get(
            Pixel::RGBA,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScaleFlags::BILINEAR,
        )
        .map_err(av("create scaler"))?;
        let mut rgba = VideoFrame::new(Pixel::RGBA, width, height);
        let mut yuv = VideoFrame::empty();

        for (i, path) in job.frames[..budget].iter().enumerate() {
            load_rgba_into(path, width, height, &mut rgba)?;
            scaler.run(&rgba, &mut yuv).map_err(av("convert frame"))?;
            yuv.set_pts(Some(i as i64));
            venc.send_frame(&yuv).map_err(av("send video frame"))?;
            drain_video(&mut venc, &mut octx, frame_tb, video_ost_tb)?;

            if let Some(a) = audio.as_mut() {
                let until = ((i as f64 + 1.0) * job.fps.frame_duration_secs()
                    * f64::from(AUDIO_RATE)) as i64;
                a.advance_to(until, &mut octx)?;
            }
        }

        venc.send_eof().map_err(av("flush video encoder"))?;
        drain_video(&mut venc, &mut octx, frame_tb, video_ost_tb)?;
        if let Some(a) = audio.as_mut() {
            a.finish(&mut octx)?;
        }

        octx.write_trailer().map_err(av("write trailer"))?;
        Ok(())
    }

    fn stream_time_base(octx: &format::context::Output, index: usize) -> ReelResult<Rational> {
        octx.stream(index)
            .map(|s| s.time_base())
            .ok_or_else(|| ReelError::encode(format!("output stream {index} missing")))
    }

    fn load_rgba_into(path: &Path, width: u32, height: u32, dst: &mut VideoFrame) -> ReelResult<()> {
        let img = image::open(path)
            .map_err(|e| ReelError::encode(format!("read frame '{}': {e}", path.display())))?
            .to_rgba8();
        if img.dimensions() != (width, height) {
            return Err(ReelError::encode(format!(
                "frame '{}' is {}x{}, expected {width}x{height}",
                path.display(),
                img.width(),
                img.height()
            )));
        }
        let row = width as usize * 4;
        let stride = dst.stride(0);
        let plane = dst.data_mut(0);
        for (y, src) in img.as_raw().chunks_exact(row).enumerate() {
            plane[y * stride..y * stride + row].copy_from_slice(src);
        }
        Ok(())
    }

    fn drain_video(
        venc: &mut ffmpeg::encoder::Video,
        octx: &mut format::context::Output,
        enc_tb: Rational,
        ost_tb: Rational,
    ) -> ReelResult<()> {
        let mut pkt = Packet::empty();
        while venc.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(VIDEO_STREAM);
            pkt.rescale_ts(enc_tb, ost_tb);
            pkt.write_interleaved(octx)
                .map_err(av("write video packet"))?;
        }
        Ok(())
    }

    /// Decoder, resampler and AAC encoder for the audio input, pulled on demand.
    struct AudioTrack {
        ictx: format::context::Input,
        stream_index: usize,
        decoder: ffmpeg::decoder::Audio,
        resampler: ffmpeg::software::resampling::Context,
        encoder: ffmpeg::encoder::Audio,
        left: Vec<f32>,
        right: Vec<f32>,
        frame_size: usize,
        next_pts: i64,
        sample_limit: i64,
        input_done: bool,
        enc_tb: Rational,
        ost_tb: Rational,
    }

    impl AudioTrack {
        fn open(
            path: &Path,
            octx: &mut format::context::Output,
            global_header: bool,
            bit_rate: usize,
            sample_limit: i64,
        ) -> ReelResult<Self> {
            let ictx = format::input(&path).map_err(|e| {
                ReelError::encode(format!("open audio '{}': {e}", path.display()))
            })?;
            let ist = ictx
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| {
                    ReelError::encode(format!("'{}' has no audio stream", path.display()))
                })?;
            let stream_index = ist.index();
            let decoder = codec::context::Context::from_parameters(ist.parameters())
                .map_err(av("create audio decoder"))?
                .decoder()
                .audio()
                .map_err(av("open audio decoder"))?;

            let target = Sample::F32(format::sample::Type::Planar);
            let resampler = decoder
                .resampler(target, ChannelLayout::STEREO, AUDIO_RATE as u32)
                .map_err(av("create resampler"))?;

            let aac = ffmpeg::encoder::find(codec::Id::AAC)
                .ok_or_else(|| ReelError::encoder_unavailable("libav has no AAC encoder"))?;
            let mut ost = octx.add_stream(aac).map_err(av("add audio stream"))?;
            let enc_tb = Rational::new(1, AUDIO_RATE);
            let mut enc = codec::context::Context::new_with_codec(aac)
                .encoder()
                .audio()
                .map_err(av("create audio encoder"))?;
            enc.set_rate(AUDIO_RATE);
            enc.set_channel_layout(ChannelLayout::STEREO);
            enc.set_format(target);
            enc.set_bit_rate(bit_rate);
            enc.set_time_base(enc_tb);
            if global_header {
                enc.set_flags(codec::Flags::GLOBAL_HEADER);
            }
            let encoder = enc
                .open_as_with(aac, Dictionary::new())
                .map_err(av("open audio encoder"))?;
            ost.set_parameters(&encoder);
            ost.set_time_base(enc_tb);
            let frame_size = match encoder.frame_size() {
                0 => 1024,
                n => n as usize,
            };

            Ok(Self {
                ictx,
                stream_index,
                decoder,
                resampler,
                encoder,
                left: Vec::new(),
                right: Vec::new(),
                frame_size,
                next_pts: 0,
                sample_limit,
                input_done: false,
                enc_tb,
                ost_tb: enc_tb,
            })
        }

        /// Encode audio up to `until` samples (capped at the sample limit).
        fn advance_to(&mut self, until: i64, octx: &mut format::context::Output) -> ReelResult<()> {
            let until = until.min(self.sample_limit);
            while self.next_pts + self.frame_size as i64 <= until {
                while self.left.len() < self.frame_size && !self.input_done {
                    self.pull()?;
                }
                if self.left.is_empty() {
                    return Ok(());
                }
                self.encode_frame(self.frame_size, octx)?;
            }
            Ok(())
        }

        fn finish(&mut self, octx: &mut format::context::Output) -> ReelResult<()> {
            loop {
                let remaining = self.sample_limit - self.next_pts;
                if remaining <= 0 {
                    break;
                }
                while self.left.len() < self.frame_size && !self.input_done {
                    self.pull()?;
                }
                if self.left.is_empty() {
                    break;
                }
                let n = self.frame_size.min(remaining as usize);
                self.encode_frame(n, octx)?;
            }
            self.encoder.send_eof().map_err(av("flush audio encoder"))?;
            self.drain(octx)
        }

        /// Read one packet (or hit end of input) and buffer whatever it decodes to.
        fn pull(&mut self) -> ReelResult<()> {
            let next = self.ictx.packets().next();
            match next {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        return Ok(());
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(av("decode audio packet"))?;
                }
                None => {
                    self.decoder.send_eof().map_err(av("flush audio decoder"))?;
                    self.input_done = true;
                }
            }
            let mut decoded = AudioFrame::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut resampled = AudioFrame::empty();
                self.resampler
                    .run(&decoded, &mut resampled)
                    .map_err(av("resample audio"))?;
                self.push(&resampled);
            }
            Ok(())
        }

        fn push(&mut self, frame: &AudioFrame) {
            if frame.samples() == 0 {
                return;
            }
            self.left.extend_from_slice(frame.plane::<f32>(0));
            self.right.extend_from_slice(frame.plane::<f32>(1));
        }

        /// Encode `n` samples from the front of the buffer, zero-padding when short.
        fn encode_frame(&mut self, n: usize, octx: &mut format::context::Output) -> ReelResult<()> {
            let take = n.min(self.left.len());
            let mut frame = AudioFrame::new(
                Sample::F32(format::sample::Type::Planar),
                n,
                ChannelLayout::STEREO,
            );
            frame.set_rate(AUDIO_RATE as u32);
            frame.set_pts(Some(self.next_pts));
            for (plane, src) in [(0, &self.left), (1, &self.right)] {
                let dst = frame.plane_mut::<f32>(plane);
                dst[..take].copy_from_slice(&src[..take]);
                dst[take..].fill(0.0);
            }
            self.left.drain(..take);
            self.right.drain(..take);
            self.next_pts += n as i64;

            self.encoder
                .send_frame(&frame)
                .map_err(av("send audio frame"))?;
            self.drain(octx)
        }

        fn drain(&mut self, octx: &mut format::context::Output) -> ReelResult<()> {
            let mut pkt = Packet::empty();
            while self.encoder.receive_packet(&mut pkt).is_ok() {
                pkt.set_stream(AUDIO_STREAM);
                pkt.rescale_ts(self.enc_tb, self.ost_tb);
                pkt.write_interleaved(octx)
                    .map_err(av("write audio packet"))?;
            }
            Ok(())
        }
    }
}
