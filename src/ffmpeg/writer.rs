//! FFmpeg encode and mux engine.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    ChannelLayout, Dictionary, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    encoder::{Audio as AudioEncoder, Encoder, Video as VideoEncoder},
    format::{Flags as FormatFlags, Pixel, Sample, context::Output, sample::Type as SampleType},
    frame::{Audio as AudioFrame, Video as VideoFrame},
    software::{
        resampling::Context as ResamplingContext,
        scaling::{Context as ScalingContext, Flags as ScalingFlags},
    },
};

use crate::{
    error::TranscodeError,
    ffmpeg::{DecodedFrame, MICROSECONDS},
    hardware_acceleration::{self, HardwareAccelerationMode},
    media_type::MediaType,
    profile::{AudioEncoderSettings, EncoderSettings, VideoCodec, VideoEncoderSettings},
    sink::MediaWriter,
};

/// Sample format of decoded audio handed to the writer.
const PCM_S16: Sample = Sample::I16(SampleType::Packed);

/// Frame size used for encoders that accept any number of samples.
const DEFAULT_AUDIO_FRAME_SIZE: usize = 1024;

struct VideoOutput {
    encoder: VideoEncoder,
    stream_index: usize,
    format: Pixel,
    width: u32,
    height: u32,
    scaler: Option<((Pixel, u32, u32), ScalingContext)>,
}

struct AudioOutput {
    encoder: AudioEncoder,
    stream_index: usize,
    layout: ChannelLayout,
    rate: u32,
    frame_size: usize,
    fifo: SampleFifo,
    resampler: ResamplingContext,
    next_pts: Option<i64>,
}

/// Interleaved 16-bit samples waiting to be cut into encoder frames.
struct SampleFifo {
    bytes: Vec<u8>,
    block_alignment: usize,
    chunk_bytes: usize,
}

impl SampleFifo {
    fn new(frame_size: usize, channels: usize) -> Self {
        let block_alignment = channels * 2;
        Self {
            bytes: Vec::new(),
            block_alignment,
            chunk_bytes: frame_size * block_alignment,
        }
    }

    /// Size in bytes of `samples` interleaved samples.
    fn bytes_for(&self, samples: usize) -> usize {
        samples * self.block_alignment
    }

    fn push(&mut self, samples: &[u8]) {
        self.bytes.extend_from_slice(samples);
    }

    /// Take one full encoder frame from the front.
    fn pop_chunk(&mut self) -> Option<Vec<u8>> {
        if self.chunk_bytes == 0 || self.bytes.len() < self.chunk_bytes {
            return None;
        }
        Some(self.bytes.drain(..self.chunk_bytes).collect())
    }

    /// Take whatever is left, padded with silence to a full frame.
    fn pop_padded(&mut self) -> Option<Vec<u8>> {
        if self.bytes.is_empty() {
            return None;
        }
        let mut chunk = std::mem::take(&mut self.bytes);
        chunk.resize(self.chunk_bytes.max(chunk.len()), 0);
        Some(chunk)
    }
}

/// Encoder pts, in samples, of audio starting at `timestamp` microseconds.
fn audio_pts(timestamp: i64, sample_rate: u32) -> i64 {
    timestamp.max(0) * i64::from(sample_rate) / 1_000_000
}

enum OutputStream {
    Video(VideoOutput),
    Audio(AudioOutput),
}

/// [`MediaWriter`] backed by FFmpeg.
///
/// Video streams are encoded with the configured codec, trying hardware
/// encoders first according to the [`HardwareAccelerationMode`]; audio
/// streams are encoded to AAC. The container is inferred from the output
/// path's extension.
pub struct FfmpegWriter {
    output: Output,
    path: PathBuf,
    hardware_acceleration: HardwareAccelerationMode,
    needs_global_header: bool,
    streams: Vec<OutputStream>,
    header_written: bool,
    finalized: bool,
    hardware_accelerated: bool,
}

impl FfmpegWriter {
    /// Create the output file.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::FileOpen`] if no container matches the path
    /// or the file cannot be created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        hardware_acceleration: HardwareAccelerationMode,
    ) -> Result<Self, TranscodeError> {
        let path = path.as_ref().to_path_buf();
        ffmpeg_next::init().map_err(|error| TranscodeError::FileOpen {
            path: path.clone(),
            reason: format!("Failed to initialize FFmpeg: {error}"),
        })?;

        let output = ffmpeg_next::format::output(&path).map_err(|error| {
            TranscodeError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            }
        })?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        log::debug!(
            "Created output {} (container: {})",
            path.display(),
            output.format().name()
        );

        Ok(Self {
            output,
            path,
            hardware_acceleration,
            needs_global_header,
            streams: Vec::new(),
            header_written: false,
            finalized: false,
            hardware_accelerated: false,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn add_video_stream(
        &mut self,
        settings: &VideoEncoderSettings,
    ) -> Result<OutputStream, TranscodeError> {
        let (encoder, name) = open_video_encoder(
            settings,
            self.hardware_acceleration,
            self.needs_global_header,
        )?;
        let codec = ffmpeg_next::encoder::find_by_name(&name)
            .ok_or_else(|| TranscodeError::EncoderUnavailable(name.clone()))?;

        if hardware_acceleration::is_hardware_encoder(&name) {
            self.hardware_accelerated = true;
        }
        log::info!(
            "Encoding {}x{} video with {name} at {} bit/s",
            settings.width,
            settings.height,
            settings.average_bit_rate
        );

        let mut stream = self.output.add_stream(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(MICROSECONDS);

        Ok(OutputStream::Video(VideoOutput {
            stream_index: stream.index(),
            format: encoder.format(),
            width: settings.width,
            height: settings.height,
            encoder,
            scaler: None,
        }))
    }

    fn add_audio_stream(
        &mut self,
        settings: &AudioEncoderSettings,
    ) -> Result<OutputStream, TranscodeError> {
        let codec = ffmpeg_next::encoder::find(Id::AAC)
            .ok_or_else(|| TranscodeError::EncoderUnavailable("aac".to_string()))?;

        let sample_format = codec
            .audio()
            .ok()
            .and_then(|audio_codec| audio_codec.formats())
            .and_then(|mut formats| formats.next())
            .unwrap_or(Sample::F32(SampleType::Planar));
        let layout = ChannelLayout::default(i32::from(settings.channels));
        let time_base = Rational(1, settings.sample_rate as i32);

        let mut encoder_context = CodecContext::new().encoder().audio()?;
        encoder_context.set_rate(settings.sample_rate as i32);
        encoder_context.set_channel_layout(layout);
        encoder_context.set_format(sample_format);
        encoder_context.set_time_base(time_base);
        encoder_context.set_bit_rate(settings.average_bytes_per_second as usize * 8);
        if self.needs_global_header {
            unsafe {
                (*encoder_context.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder_context
            .open_as(codec)
            .map_err(|error| TranscodeError::engine("open audio encoder", error))?;

        let frame_size = match encoder.frame_size() {
            0 => DEFAULT_AUDIO_FRAME_SIZE,
            size => size as usize,
        };
        let resampler = ResamplingContext::get(
            PCM_S16,
            layout,
            settings.sample_rate,
            sample_format,
            layout,
            settings.sample_rate,
        )?;

        log::info!(
            "Encoding {} Hz {}-channel audio with aac at {} B/s",
            settings.sample_rate,
            settings.channels,
            settings.average_bytes_per_second
        );

        let mut stream = self.output.add_stream(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);

        Ok(OutputStream::Audio(AudioOutput {
            stream_index: stream.index(),
            encoder,
            layout,
            rate: settings.sample_rate,
            frame_size,
            fifo: SampleFifo::new(frame_size, usize::from(settings.channels)),
            resampler,
            next_pts: None,
        }))
    }

    fn ensure_header(&mut self) -> Result<(), TranscodeError> {
        if !self.header_written {
            self.output
                .write_header()
                .map_err(|error| TranscodeError::engine("write header", error))?;
            self.header_written = true;
        }
        Ok(())
    }

    fn stream_and_output(
        &mut self,
        sink_index: u16,
    ) -> Result<(&mut OutputStream, &mut Output), TranscodeError> {
        let stream = self.streams.get_mut(usize::from(sink_index)).ok_or_else(|| {
            TranscodeError::engine("write sample", format!("no output stream {sink_index}"))
        })?;
        Ok((stream, &mut self.output))
    }
}

impl MediaWriter for FfmpegWriter {
    type Sample = DecodedFrame;

    fn add_stream(
        &mut self,
        settings: &EncoderSettings,
        input_type: &MediaType,
    ) -> Result<u16, TranscodeError> {
        if self.header_written {
            return Err(TranscodeError::engine(
                "add stream",
                "the output header is already written and the container cannot gain streams",
            ));
        }

        let sink_index = u16::try_from(self.streams.len())
            .map_err(|_| TranscodeError::engine("add stream", "too many output streams"))?;

        log::debug!("Adding output stream {sink_index} for {} input", input_type.subtype);
        let stream = match settings {
            EncoderSettings::Video(video) => self.add_video_stream(video)?,
            EncoderSettings::Audio(audio) => self.add_audio_stream(audio)?,
        };
        self.streams.push(stream);
        Ok(sink_index)
    }

    fn write_sample(&mut self, sink_index: u16, sample: DecodedFrame) -> Result<(), TranscodeError> {
        self.ensure_header()?;
        let (stream, output) = self.stream_and_output(sink_index)?;

        match (stream, sample) {
            (OutputStream::Video(video), DecodedFrame::Video(frame)) => {
                let mut converted = convert_video(video, &frame)?;
                converted.set_pts(frame.pts());
                video
                    .encoder
                    .send_frame(&converted)
                    .map_err(|error| TranscodeError::engine("encode video", error))?;
                let stream_index = video.stream_index;
                drain_packets(&mut video.encoder, stream_index, MICROSECONDS, output)
            }
            (OutputStream::Audio(audio), DecodedFrame::Audio(frame)) => {
                if audio.next_pts.is_none() {
                    audio.next_pts = Some(audio_pts(frame.pts().unwrap_or(0), audio.rate));
                }
                let bytes = audio.fifo.bytes_for(frame.samples()).min(frame.data(0).len());
                audio.fifo.push(&frame.data(0)[..bytes]);

                while let Some(chunk) = audio.fifo.pop_chunk() {
                    encode_audio_chunk(audio, &chunk, output)?;
                }
                Ok(())
            }
            _ => Err(TranscodeError::engine(
                "write sample",
                format!("sample kind does not match output stream {sink_index}"),
            )),
        }
    }

    fn write_gap(&mut self, sink_index: u16, timestamp: i64) -> Result<(), TranscodeError> {
        self.ensure_header()?;
        let (stream, output) = self.stream_and_output(sink_index)?;
        match stream {
            OutputStream::Video(_) => {
                log::debug!("Gap on video output {sink_index} at {timestamp}us");
                Ok(())
            }
            OutputStream::Audio(audio) => {
                log::debug!(
                    "Gap on audio output {sink_index} at {timestamp}us; flushing buffered samples"
                );
                if let Some(chunk) = audio.fifo.pop_padded() {
                    encode_audio_chunk(audio, &chunk, output)?;
                }
                audio.next_pts = None;
                Ok(())
            }
        }
    }

    fn finalize(&mut self) -> Result<(), TranscodeError> {
        if self.finalized {
            return Ok(());
        }
        self.ensure_header()?;

        let Self {
            output, streams, ..
        } = &mut *self;
        for stream in streams.iter_mut() {
            match stream {
                OutputStream::Video(video) => {
                    video
                        .encoder
                        .send_eof()
                        .map_err(|error| TranscodeError::engine("flush video encoder", error))?;
                    let stream_index = video.stream_index;
                    drain_packets(&mut video.encoder, stream_index, MICROSECONDS, output)?;
                }
                OutputStream::Audio(audio) => {
                    if let Some(chunk) = audio.fifo.pop_padded() {
                        encode_audio_chunk(audio, &chunk, output)?;
                    }
                    audio
                        .encoder
                        .send_eof()
                        .map_err(|error| TranscodeError::engine("flush audio encoder", error))?;
                    let time_base = Rational(1, audio.rate as i32);
                    let stream_index = audio.stream_index;
                    drain_packets(&mut audio.encoder, stream_index, time_base, output)?;
                }
            }
        }

        self.output
            .write_trailer()
            .map_err(|error| TranscodeError::engine("write trailer", error))?;
        self.finalized = true;
        log::debug!("Finalized {}", self.path.display());
        Ok(())
    }

    fn hardware_accelerated(&self) -> bool {
        self.hardware_accelerated
    }
}

/// Try the candidate encoders for the codec in order and return the first
/// that opens, with its name.
fn open_video_encoder(
    settings: &VideoEncoderSettings,
    mode: HardwareAccelerationMode,
    needs_global_header: bool,
) -> Result<(VideoEncoder, String), TranscodeError> {
    let mut candidates: Vec<String> =
        hardware_acceleration::encoder_candidates(mode, settings.codec)
            .into_iter()
            .map(str::to_string)
            .collect();
    if let Some(generic) = ffmpeg_next::encoder::find(codec_id(settings.codec)) {
        candidates.push(generic.name().to_string());
    }

    for name in candidates {
        match try_open_video_encoder(settings, &name, needs_global_header) {
            Ok(encoder) => return Ok((encoder, name)),
            Err(error) => log::debug!("Encoder {name} unavailable: {error}"),
        }
    }

    Err(TranscodeError::EncoderUnavailable(format!(
        "no {} encoder could be opened",
        settings.codec.name()
    )))
}

fn try_open_video_encoder(
    settings: &VideoEncoderSettings,
    name: &str,
    needs_global_header: bool,
) -> Result<VideoEncoder, TranscodeError> {
    let codec = ffmpeg_next::encoder::find_by_name(name)
        .ok_or_else(|| TranscodeError::EncoderUnavailable(format!("{name} is not in this build")))?;

    let format = codec
        .video()
        .ok()
        .and_then(|video_codec| video_codec.formats())
        .map(|formats| formats.collect::<Vec<_>>())
        .and_then(|formats| {
            if formats.contains(&Pixel::NV12) {
                Some(Pixel::NV12)
            } else {
                formats.first().copied()
            }
        })
        .unwrap_or(Pixel::YUV420P);

    let mut encoder = CodecContext::new().encoder().video()?;
    encoder.set_width(settings.width);
    encoder.set_height(settings.height);
    encoder.set_format(format);
    encoder.set_time_base(MICROSECONDS);
    encoder.set_frame_rate(Some(Rational::new(
        settings.frame_rate.numerator as i32,
        settings.frame_rate.denominator as i32,
    )));
    encoder.set_bit_rate(settings.average_bit_rate as usize);

    if needs_global_header {
        unsafe {
            (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    let mut options = Dictionary::new();
    options.set("profile", settings.codec.profile());
    if let Some(preset) = hardware_acceleration::speed_preset(name, settings.quality_vs_speed) {
        options.set("preset", preset);
    }

    Ok(encoder.open_as_with(codec, options)?)
}

fn codec_id(codec: VideoCodec) -> Id {
    match codec {
        VideoCodec::H264 => Id::H264,
        VideoCodec::Hevc => Id::HEVC,
    }
}

/// Convert a decoded frame to the encoder's pixel format and frame size.
fn convert_video(video: &mut VideoOutput, frame: &VideoFrame) -> Result<VideoFrame, TranscodeError> {
    let key = (frame.format(), frame.width(), frame.height());
    if video.scaler.as_ref().map(|(current, _)| *current) != Some(key) {
        let context = ScalingContext::get(
            key.0,
            key.1,
            key.2,
            video.format,
            video.width,
            video.height,
            ScalingFlags::BILINEAR,
        )?;
        video.scaler = Some((key, context));
    }

    let mut converted = VideoFrame::empty();
    if let Some((_, context)) = video.scaler.as_mut() {
        context.run(frame, &mut converted)?;
    }
    Ok(converted)
}

/// Encode one encoder frame of interleaved samples.
fn encode_audio_chunk(
    audio: &mut AudioOutput,
    chunk: &[u8],
    output: &mut Output,
) -> Result<(), TranscodeError> {
    let mut frame = AudioFrame::new(PCM_S16, audio.frame_size, audio.layout);
    frame.set_rate(audio.rate);
    frame.data_mut(0)[..chunk.len()].copy_from_slice(chunk);

    let mut converted = AudioFrame::empty();
    audio.resampler.run(&frame, &mut converted)?;

    let pts = audio.next_pts.unwrap_or(0);
    converted.set_pts(Some(pts));
    audio.next_pts = Some(pts + audio.frame_size as i64);

    audio
        .encoder
        .send_frame(&converted)
        .map_err(|error| TranscodeError::engine("encode audio", error))?;

    let time_base = Rational(1, audio.rate as i32);
    drain_packets(&mut audio.encoder, audio.stream_index, time_base, output)
}

/// Move every packet the encoder has ready into the container.
fn drain_packets(
    encoder: &mut Encoder,
    stream_index: usize,
    encoder_time_base: Rational,
    output: &mut Output,
) -> Result<(), TranscodeError> {
    let stream_time_base = output
        .stream(stream_index)
        .map(|stream| stream.time_base())
        .ok_or_else(|| {
            TranscodeError::engine("write packet", format!("no container stream {stream_index}"))
        })?;

    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|error| TranscodeError::engine("write packet", error))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_cuts_full_encoder_frames() {
        let mut fifo = SampleFifo::new(4, 2);
        assert_eq!(fifo.bytes_for(3), 12);

        fifo.push(&[1; 10]);
        assert_eq!(fifo.pop_chunk(), None);

        fifo.push(&[2; 14]);
        assert_eq!(fifo.pop_chunk(), Some([vec![1; 10], vec![2; 6]].concat()));
        assert_eq!(fifo.pop_chunk(), None);
        assert_eq!(fifo.bytes.len(), 8);
    }

    #[test]
    fn fifo_pads_the_remainder_with_silence() {
        let mut fifo = SampleFifo::new(4, 2);
        fifo.push(&[7; 6]);

        let chunk = fifo.pop_padded().unwrap();
        assert_eq!(chunk.len(), 16);
        assert_eq!(&chunk[..6], &[7; 6]);
        assert!(chunk[6..].iter().all(|&byte| byte == 0));

        assert_eq!(fifo.pop_padded(), None);
        assert_eq!(fifo.pop_chunk(), None);
    }

    #[test]
    fn gap_flush_then_new_samples_start_a_fresh_frame() {
        let mut fifo = SampleFifo::new(2, 1);
        fifo.push(&[1, 1, 2, 2, 3, 3]);
        assert_eq!(fifo.pop_chunk(), Some(vec![1, 1, 2, 2]));
        assert_eq!(fifo.pop_padded(), Some(vec![3, 3, 0, 0]));

        fifo.push(&[4, 4, 5, 5]);
        assert_eq!(fifo.pop_chunk(), Some(vec![4, 4, 5, 5]));
    }

    #[test]
    fn audio_pts_counts_samples_from_the_timestamp() {
        assert_eq!(audio_pts(1_500_000, 48_000), 72_000);
        assert_eq!(audio_pts(0, 44_100), 0);
        assert_eq!(audio_pts(-20_000, 48_000), 0);
    }
}

