//! FFmpeg demux and decode engine.
//!
//! The demuxer and decoders live on a dedicated engine thread. Every
//! [`MediaReader`] call is sent to that thread as a command and answered
//! over a reply channel; sample requests are answered through the
//! [`CompletionSink`] they carry.

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use ffmpeg_next::{
    ChannelLayout, Error as FfmpegError, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    decoder::{Audio as AudioDecoder, Video as VideoDecoder},
    format::{Pixel, Sample, context::Input, sample::Type as SampleType, stream::Stream},
    frame::{Audio as AudioFrame, Video as VideoFrame},
    media::Type,
    software::{
        resampling::Context as ResamplingContext,
        scaling::{Context as ScalingContext, Flags as ScalingFlags},
    },
};
use ffmpeg_sys_next::AVFieldOrder;

use crate::{
    error::TranscodeError,
    ffmpeg::{DecodedFrame, to_microseconds},
    mailbox::{CompletionSink, ReadFlags, ReadResult},
    media_type::{AudioDetails, MediaDetails, MediaKind, MediaType, Ratio, Subtype, VideoDetails},
    source::MediaReader,
};

/// A timestamp jump larger than this between two samples of one stream is
/// reported as a gap.
const GAP_THRESHOLD_MICROSECONDS: i64 = 1_000_000;

/// Sample format of decoded audio.
const PCM_S16: Sample = Sample::I16(SampleType::Packed);

type Reply<T> = Sender<Result<T, TranscodeError>>;

enum Command {
    SelectAll(Reply<()>),
    Deselect(usize, Reply<()>),
    IsSelected(usize, Reply<bool>),
    NativeType(usize, Reply<Option<MediaType>>),
    SetDecodeType(usize, MediaType, Reply<()>),
    CurrentType(usize, Reply<MediaType>),
    RequestSample(CompletionSink<DecodedFrame>),
    Shutdown,
}

/// [`MediaReader`] backed by FFmpeg.
///
/// Video is decoded to NV12 and audio to packed signed 16-bit PCM.
pub struct FfmpegReader {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    path: PathBuf,
    duration: Option<Duration>,
    file_size: Option<u64>,
}

impl FfmpegReader {
    /// Open a media file and start its engine thread.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::FileOpen`] if the file cannot be opened or
    /// its streams cannot be probed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TranscodeError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening media file for reading: {}", path.display());

        let file_size = std::fs::metadata(&path).ok().map(|metadata| metadata.len());
        let (commands, receiver) = mpsc::channel();
        let (ready_sender, ready_receiver) = mpsc::channel();
        let engine_path = path.clone();

        let worker = thread::Builder::new()
            .name("vtranscode-reader".to_string())
            .spawn(move || match Engine::open(&engine_path) {
                Ok(engine) => {
                    let _ = ready_sender.send(Ok(engine.duration()));
                    engine.run(receiver);
                }
                Err(error) => {
                    let _ = ready_sender.send(Err(error));
                }
            })?;

        let duration = ready_receiver.recv().map_err(|_| TranscodeError::FileOpen {
            path: path.clone(),
            reason: "reader thread exited during open".to_string(),
        })??;

        log::info!(
            "Opened {} (duration: {})",
            path.display(),
            duration
                .map(|duration| format!("{:.2}s", duration.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            commands,
            worker: Some(worker),
            path,
            duration,
            file_size,
        })
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call<T>(
        &self,
        operation: &str,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, TranscodeError> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| TranscodeError::engine(operation, "reader thread has stopped"))?;
        response
            .recv()
            .map_err(|_| TranscodeError::engine(operation, "reader thread has stopped"))?
    }
}

impl MediaReader for FfmpegReader {
    type Sample = DecodedFrame;

    fn select_all_streams(&mut self) -> Result<(), TranscodeError> {
        self.call("select streams", Command::SelectAll)
    }

    fn deselect_stream(&mut self, stream_index: usize) -> Result<(), TranscodeError> {
        self.call("deselect stream", |reply| {
            Command::Deselect(stream_index, reply)
        })
    }

    fn is_selected(&mut self, stream_index: usize) -> Result<bool, TranscodeError> {
        self.call("query stream selection", |reply| {
            Command::IsSelected(stream_index, reply)
        })
    }

    fn native_type(&mut self, stream_index: usize) -> Result<Option<MediaType>, TranscodeError> {
        self.call("get native type", |reply| {
            Command::NativeType(stream_index, reply)
        })
    }

    fn set_decode_type(
        &mut self,
        stream_index: usize,
        media_type: &MediaType,
    ) -> Result<(), TranscodeError> {
        let media_type = media_type.clone();
        self.call("set decode type", |reply| {
            Command::SetDecodeType(stream_index, media_type, reply)
        })
    }

    fn current_type(&mut self, stream_index: usize) -> Result<MediaType, TranscodeError> {
        self.call("get current type", |reply| {
            Command::CurrentType(stream_index, reply)
        })
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    fn request_sample(
        &mut self,
        completion: CompletionSink<DecodedFrame>,
    ) -> Result<(), TranscodeError> {
        self.commands
            .send(Command::RequestSample(completion))
            .map_err(|_| TranscodeError::engine("request sample", "reader thread has stopped"))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

enum StreamDecoder {
    Video {
        decoder: VideoDecoder,
        scaler: Option<((Pixel, u32, u32), ScalingContext)>,
    },
    Audio {
        decoder: AudioDecoder,
        resampler: Option<ResamplingContext>,
    },
}

struct StreamState {
    selected: bool,
    native: MediaType,
    time_base: Rational,
    decode_type: Option<MediaType>,
    decoder: Option<StreamDecoder>,
    next_timestamp: Option<i64>,
}

impl StreamState {
    fn from_stream(stream: &Stream<'_>) -> Result<Self, TranscodeError> {
        Ok(Self {
            selected: false,
            native: native_type_of(stream)?,
            time_base: stream.time_base(),
            decode_type: None,
            decoder: None,
            next_timestamp: None,
        })
    }
}

/// Packets waiting to be decoded.
///
/// A packet that reveals a new stream is held back until the stream has
/// been selected and configured, then served before the demuxer is read
/// again.
#[derive(Default)]
struct PacketFeed {
    held: Option<Packet>,
}

impl PacketFeed {
    fn hold(&mut self, packet: Packet) {
        self.held = Some(packet);
    }

    /// The next packet to route, or `None` once the demuxer is exhausted.
    fn next(
        &mut self,
        read: impl FnOnce(&mut Packet) -> Result<(), FfmpegError>,
    ) -> Result<Option<Packet>, TranscodeError> {
        if let Some(packet) = self.held.take() {
            return Ok(Some(packet));
        }

        let mut packet = Packet::empty();
        match read(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(FfmpegError::Eof) => Ok(None),
            Err(error) => Err(TranscodeError::engine("read packet", error)),
        }
    }
}

/// What the engine does with a demuxed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketRoute {
    /// The stream was never reported: report it and hold the packet.
    NewStream,
    /// The stream is not selected.
    Skip,
    Decode,
}

fn route_packet(stream_index: usize, streams: &[StreamState]) -> PacketRoute {
    match streams.get(stream_index) {
        None => PacketRoute::NewStream,
        Some(stream) if stream.selected => PacketRoute::Decode,
        Some(_) => PacketRoute::Skip,
    }
}

/// State owned by the engine thread.
struct Engine {
    input: Input,
    streams: Vec<StreamState>,
    feed: PacketFeed,
    pending: VecDeque<ReadResult<DecodedFrame>>,
    demuxer_exhausted: bool,
    last_timestamp: i64,
}

impl Engine {
    fn open(path: &Path) -> Result<Self, TranscodeError> {
        ffmpeg_next::init().map_err(|error| TranscodeError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("Failed to initialize FFmpeg: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| TranscodeError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let streams = input
            .streams()
            .map(|stream| StreamState::from_stream(&stream))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| TranscodeError::FileOpen {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            input,
            streams,
            feed: PacketFeed::default(),
            pending: VecDeque::new(),
            demuxer_exhausted: false,
            last_timestamp: 0,
        })
    }

    fn duration(&self) -> Option<Duration> {
        let micros = self.input.duration();
        (micros > 0).then(|| Duration::from_micros(micros as u64))
    }

    fn run(mut self, commands: Receiver<Command>) {
        for command in commands {
            match command {
                Command::SelectAll(reply) => {
                    for stream in &mut self.streams {
                        stream.selected = true;
                    }
                    let _ = reply.send(Ok(()));
                }
                Command::Deselect(stream_index, reply) => {
                    let _ = reply.send(self.stream_mut(stream_index).map(|stream| {
                        stream.selected = false;
                    }));
                }
                Command::IsSelected(stream_index, reply) => {
                    let _ = reply.send(self.stream_mut(stream_index).map(|stream| stream.selected));
                }
                Command::NativeType(stream_index, reply) => {
                    let _ = reply.send(Ok(self
                        .streams
                        .get(stream_index)
                        .map(|stream| stream.native.clone())));
                }
                Command::SetDecodeType(stream_index, media_type, reply) => {
                    let _ = reply.send(self.set_decode_type(stream_index, media_type));
                }
                Command::CurrentType(stream_index, reply) => {
                    let _ = reply.send(self.current_type(stream_index));
                }
                Command::RequestSample(completion) => {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| self.read_next()))
                        .unwrap_or_else(|_| {
                            log::error!("Reader engine panicked while reading a sample");
                            ReadResult::failure(0, "reader engine panicked")
                        });
                    completion.deliver(result);
                }
                Command::Shutdown => break,
            }
        }
    }

    fn stream_mut(&mut self, stream_index: usize) -> Result<&mut StreamState, TranscodeError> {
        self.streams.get_mut(stream_index).ok_or_else(|| {
            TranscodeError::engine("lookup stream", format!("no source stream {stream_index}"))
        })
    }

    fn set_decode_type(
        &mut self,
        stream_index: usize,
        media_type: MediaType,
    ) -> Result<(), TranscodeError> {
        let supported = match &media_type.details {
            MediaDetails::Video(_) => media_type.subtype == Subtype::Nv12,
            MediaDetails::Audio(audio) => {
                media_type.subtype == Subtype::Pcm && audio.bits_per_sample.unwrap_or(16) == 16
            }
            MediaDetails::Other => false,
        };
        if !supported {
            return Err(TranscodeError::engine(
                "set decode type",
                format!("stream {stream_index}: cannot decode to {}", media_type.subtype),
            ));
        }

        self.stream_mut(stream_index)?.decode_type = Some(media_type);
        if self.streams[stream_index].decoder.is_none() {
            self.open_decoder(stream_index)?;
        }
        Ok(())
    }

    fn current_type(&mut self, stream_index: usize) -> Result<MediaType, TranscodeError> {
        let stream = self.stream_mut(stream_index)?;
        match &stream.decode_type {
            Some(decode_type) => Ok(decode_type.clone()),
            None if stream.native.subtype.is_uncompressed() => Ok(stream.native.clone()),
            None => Err(TranscodeError::engine(
                "get current type",
                format!("stream {stream_index} has no decode type"),
            )),
        }
    }

    fn open_decoder(&mut self, stream_index: usize) -> Result<(), TranscodeError> {
        let stream = self.input.stream(stream_index).ok_or_else(|| {
            TranscodeError::engine("open decoder", format!("no source stream {stream_index}"))
        })?;
        let context = CodecContext::from_parameters(stream.parameters())?;

        let decoder = match self.streams[stream_index].native.kind() {
            MediaKind::Video => StreamDecoder::Video {
                decoder: context.decoder().video()?,
                scaler: None,
            },
            MediaKind::Audio => StreamDecoder::Audio {
                decoder: context.decoder().audio()?,
                resampler: None,
            },
            MediaKind::Other => {
                return Err(TranscodeError::engine(
                    "open decoder",
                    format!("stream {stream_index} cannot be decoded"),
                ));
            }
        };

        log::debug!("Opened decoder for stream {stream_index}");
        self.streams[stream_index].decoder = Some(decoder);
        Ok(())
    }

    fn read_next(&mut self) -> ReadResult<DecodedFrame> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                if result.sample.is_some() {
                    self.last_timestamp = self.last_timestamp.max(result.timestamp);
                }
                return result;
            }
            if self.demuxer_exhausted {
                return ReadResult::event(0, ReadFlags::END_OF_STREAM, self.last_timestamp);
            }
            if let Err(error) = self.pump() {
                log::error!("Reading {error}");
                return ReadResult::failure(0, error.to_string());
            }
        }
    }

    /// Route one packet and queue the results it produces.
    fn pump(&mut self) -> Result<(), TranscodeError> {
        let input = &mut self.input;
        let Some(packet) = self.feed.next(|packet| packet.read(input))? else {
            self.drain_decoders()?;
            self.demuxer_exhausted = true;
            return Ok(());
        };

        let stream_index = packet.stream();
        match route_packet(stream_index, &self.streams) {
            PacketRoute::NewStream => {
                self.discover_streams()?;
                let Some(stream) = self.streams.get(stream_index) else {
                    log::warn!("Dropping packet of unknown stream {stream_index}");
                    return Ok(());
                };
                let timestamp = packet
                    .pts()
                    .map(|pts| to_microseconds(pts, stream.time_base))
                    .unwrap_or(self.last_timestamp);
                self.pending.push_back(ReadResult::event(
                    stream_index,
                    ReadFlags::NEW_STREAM,
                    timestamp,
                ));
                self.feed.hold(packet);
                Ok(())
            }
            PacketRoute::Skip => Ok(()),
            PacketRoute::Decode => self.decode_packet(stream_index, &packet),
        }
    }

    fn decode_packet(&mut self, stream_index: usize, packet: &Packet) -> Result<(), TranscodeError> {
        if self.streams[stream_index].decoder.is_none() {
            self.open_decoder(stream_index)?;
        }

        let stream = &mut self.streams[stream_index];
        let sent = match stream.decoder.as_mut() {
            Some(StreamDecoder::Video { decoder, .. }) => decoder.send_packet(packet),
            Some(StreamDecoder::Audio { decoder, .. }) => decoder.send_packet(packet),
            None => Ok(()),
        };
        sent.map_err(|error| {
            TranscodeError::engine("decode", format!("stream {stream_index}: {error}"))
        })?;

        receive_frames(stream_index, stream, &mut self.pending)
    }

    fn drain_decoders(&mut self) -> Result<(), TranscodeError> {
        for (stream_index, stream) in self.streams.iter_mut().enumerate() {
            if !stream.selected {
                continue;
            }
            let flushed = match stream.decoder.as_mut() {
                Some(StreamDecoder::Video { decoder, .. }) => decoder.send_eof(),
                Some(StreamDecoder::Audio { decoder, .. }) => decoder.send_eof(),
                None => continue,
            };
            if let Err(error) = flushed {
                log::debug!("Flushing decoder of stream {stream_index} failed: {error}");
                continue;
            }
            receive_frames(stream_index, stream, &mut self.pending)?;
        }
        Ok(())
    }

    fn discover_streams(&mut self) -> Result<(), TranscodeError> {
        let known = self.streams.len();
        for stream in self.input.streams().skip(known) {
            log::debug!("Demuxer reported new stream {}", stream.index());
            self.streams.push(StreamState::from_stream(&stream)?);
        }
        Ok(())
    }
}

/// Pull every available frame out of a stream's decoder and queue it.
fn receive_frames(
    stream_index: usize,
    stream: &mut StreamState,
    pending: &mut VecDeque<ReadResult<DecodedFrame>>,
) -> Result<(), TranscodeError> {
    let StreamState {
        native,
        time_base,
        decoder,
        next_timestamp,
        ..
    } = stream;

    match decoder.as_mut() {
        Some(StreamDecoder::Video { decoder, scaler }) => {
            let mut decoded = VideoFrame::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let mut flags = ReadFlags::empty();
                let mut frame_duration = 0;

                if let MediaDetails::Video(details) = &mut native.details {
                    if record_frame_size(stream_index, details, decoded.width(), decoded.height()) {
                        flags |= ReadFlags::NATIVE_TYPE_CHANGED;
                    }
                    frame_duration = video_frame_duration(details);
                }

                let timestamp = frame_timestamp(
                    decoded.timestamp().or(decoded.pts()),
                    *time_base,
                    *next_timestamp,
                );
                let mut converted = convert_video(&decoded, scaler)?;
                converted.set_pts(Some(timestamp));

                queue_sample(
                    stream_index,
                    timestamp,
                    frame_duration,
                    DecodedFrame::Video(converted),
                    flags,
                    next_timestamp,
                    pending,
                );
            }
        }
        Some(StreamDecoder::Audio { decoder, resampler }) => {
            let mut decoded = AudioFrame::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let layout = match decoder.channel_layout() {
                    layout if layout.is_empty() => {
                        ChannelLayout::default(i32::from(decoder.channels()))
                    }
                    layout => layout,
                };
                if decoded.channel_layout().is_empty() {
                    decoded.set_channel_layout(layout);
                }
                if resampler.is_none() {
                    *resampler = Some(ResamplingContext::get(
                        decoder.format(),
                        layout,
                        decoder.rate(),
                        PCM_S16,
                        layout,
                        decoder.rate(),
                    )?);
                }

                let mut converted = AudioFrame::empty();
                if let Some(resampler) = resampler.as_mut() {
                    resampler.run(&decoded, &mut converted)?;
                }

                let timestamp = frame_timestamp(
                    decoded.timestamp().or(decoded.pts()),
                    *time_base,
                    *next_timestamp,
                );
                let frame_duration = if decoded.rate() > 0 {
                    decoded.samples() as i64 * 1_000_000 / i64::from(decoded.rate())
                } else {
                    0
                };
                converted.set_pts(Some(timestamp));

                queue_sample(
                    stream_index,
                    timestamp,
                    frame_duration,
                    DecodedFrame::Audio(converted),
                    ReadFlags::empty(),
                    next_timestamp,
                    pending,
                );
            }
        }
        None => {}
    }

    Ok(())
}

/// Queue a decoded sample, preceded by a gap marker when its timestamp
/// jumps past the end of the previous sample of the same stream.
fn queue_sample(
    stream_index: usize,
    timestamp: i64,
    frame_duration: i64,
    sample: DecodedFrame,
    flags: ReadFlags,
    next_timestamp: &mut Option<i64>,
    pending: &mut VecDeque<ReadResult<DecodedFrame>>,
) {
    if let Some(expected) = *next_timestamp
        && timestamp - expected > GAP_THRESHOLD_MICROSECONDS
    {
        log::debug!("Stream {stream_index}: gap from {expected}us to {timestamp}us");
        pending.push_back(ReadResult::event(stream_index, ReadFlags::GAP, expected));
    }
    *next_timestamp = Some(timestamp + frame_duration);
    pending.push_back(ReadResult::sample(stream_index, timestamp, sample).with_flags(flags));
}

/// Record a decoded frame's size on the stream's native type. Returns
/// whether it differs from the size recorded before.
fn record_frame_size(
    stream_index: usize,
    details: &mut VideoDetails,
    width: u32,
    height: u32,
) -> bool {
    if details.width == width && details.height == height {
        return false;
    }
    log::info!(
        "Stream {stream_index}: frame size changed from {}x{} to {width}x{height}",
        details.width,
        details.height
    );
    details.width = width;
    details.height = height;
    true
}

/// Duration of one frame in microseconds, zero without a frame rate.
fn video_frame_duration(details: &VideoDetails) -> i64 {
    match details.frame_rate {
        Some(rate) if rate.numerator > 0 => {
            1_000_000 * i64::from(rate.denominator) / i64::from(rate.numerator)
        }
        _ => 0,
    }
}

fn frame_timestamp(pts: Option<i64>, time_base: Rational, next_timestamp: Option<i64>) -> i64 {
    match pts {
        Some(pts) => to_microseconds(pts, time_base),
        None => next_timestamp.unwrap_or(0),
    }
}

fn convert_video(
    decoded: &VideoFrame,
    scaler: &mut Option<((Pixel, u32, u32), ScalingContext)>,
) -> Result<VideoFrame, TranscodeError> {
    let key = (decoded.format(), decoded.width(), decoded.height());
    if scaler.as_ref().map(|(current, _)| *current) != Some(key) {
        let context = ScalingContext::get(
            key.0,
            key.1,
            key.2,
            Pixel::NV12,
            key.1,
            key.2,
            ScalingFlags::BILINEAR,
        )?;
        *scaler = Some((key, context));
    }

    let mut converted = VideoFrame::empty();
    if let Some((_, context)) = scaler.as_mut() {
        context.run(decoded, &mut converted)?;
    }
    Ok(converted)
}

/// Build the engine-neutral native type of a container stream.
fn native_type_of(stream: &Stream<'_>) -> Result<MediaType, TranscodeError> {
    let parameters = stream.parameters();
    let codec_id = parameters.id();
    let codec_name = codec_id.name().to_string();
    let bit_rate = unsafe { (*parameters.as_ptr()).bit_rate };

    let media_type = match parameters.medium() {
        Type::Video => {
            let decoder = CodecContext::from_parameters(stream.parameters())?
                .decoder()
                .video()?;

            let frame_rate = stream.avg_frame_rate();
            let frame_rate = (frame_rate.numerator() > 0 && frame_rate.denominator() > 0)
                .then(|| Ratio::new(frame_rate.numerator() as u32, frame_rate.denominator() as u32));

            let aspect_ratio = decoder.aspect_ratio();
            let pixel_aspect_ratio = (aspect_ratio.numerator() > 0
                && aspect_ratio.denominator() > 0)
                .then(|| {
                    Ratio::new(
                        aspect_ratio.numerator() as u32,
                        aspect_ratio.denominator() as u32,
                    )
                });

            let field_order = unsafe { (*parameters.as_ptr()).field_order };
            let progressive = matches!(
                field_order,
                AVFieldOrder::AV_FIELD_PROGRESSIVE | AVFieldOrder::AV_FIELD_UNKNOWN
            );

            let subtype = if codec_id == Id::RAWVIDEO && decoder.format() == Pixel::NV12 {
                Subtype::Nv12
            } else {
                Subtype::Encoded(codec_name)
            };

            MediaType::video(
                subtype,
                VideoDetails {
                    width: decoder.width(),
                    height: decoder.height(),
                    frame_rate,
                    pixel_aspect_ratio,
                    progressive,
                    all_samples_independent: false,
                },
            )
        }
        Type::Audio => {
            let decoder = CodecContext::from_parameters(stream.parameters())?
                .decoder()
                .audio()?;

            let bits_per_sample = unsafe { (*parameters.as_ptr()).bits_per_coded_sample };
            let layout = decoder.channel_layout();
            let subtype = if codec_id == Id::PCM_S16LE {
                Subtype::Pcm
            } else {
                Subtype::Encoded(codec_name)
            };
            let uncompressed = subtype.is_uncompressed();

            MediaType::audio(
                subtype,
                AudioDetails {
                    sample_rate: decoder.rate(),
                    channels: decoder.channels(),
                    bits_per_sample: (bits_per_sample > 0).then_some(bits_per_sample as u16),
                    channel_mask: (!layout.is_empty()).then(|| layout.bits()),
                    average_bytes_per_second: (bit_rate > 0)
                        .then(|| (bit_rate / 8).min(i64::from(u32::MAX)) as u32),
                    block_alignment: None,
                    all_samples_independent: uncompressed,
                },
            )
        }
        _ => MediaType::other(codec_name),
    };

    Ok(if bit_rate > 0 {
        media_type.with_average_bit_rate(bit_rate.min(i64::from(u32::MAX)) as u32)
    } else {
        media_type
    })
}
