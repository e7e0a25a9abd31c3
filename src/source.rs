//! Asynchronous sample source.
//!
//! [`AsyncSampleSource`] wraps a decode engine implementing [`MediaReader`]
//! and turns its callback-driven reads into a request/await pair: the
//! pipeline fires [`request_next_sample`](AsyncSampleSource::request_next_sample)
//! and later blocks in [`await_result`](AsyncSampleSource::await_result).
//! The source also owns decoder negotiation: it picks an uncompressed decode
//! target for every stream and redoes that work whenever the engine reports
//! a new stream or a native format change.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::{
    descriptor::StreamDescriptor,
    error::TranscodeError,
    mailbox::{CompletionSink, Mailbox, ReadFlags},
    media_type::{AudioDetails, MediaDetails, MediaType, Ratio, Subtype, VideoDetails},
};

/// Bits per sample used for PCM when the source does not declare a depth.
pub const DEFAULT_PCM_BITS_PER_SAMPLE: u16 = 16;

/// Share of the file size attributed to the video stream when the container
/// declares no video bit rate.
pub const FILE_SIZE_VIDEO_SHARE: f64 = 0.998;

/// Decode engine consumed by [`AsyncSampleSource`].
///
/// Stream indices are the engine's own source stream indices. Every method
/// except [`request_sample`](MediaReader::request_sample) completes
/// synchronously.
pub trait MediaReader {
    /// Decoded sample type handed to the encoder.
    type Sample: Send + 'static;

    /// Select every stream of the source for reading. Idempotent.
    fn select_all_streams(&mut self) -> Result<(), TranscodeError>;

    /// Exclude a stream from reading and decoding.
    fn deselect_stream(&mut self, stream_index: usize) -> Result<(), TranscodeError>;

    /// Whether a stream is currently selected.
    fn is_selected(&mut self, stream_index: usize) -> Result<bool, TranscodeError>;

    /// Native type of a stream as found in the container.
    ///
    /// Returns `Ok(None)` when the source has no stream with that index.
    fn native_type(&mut self, stream_index: usize) -> Result<Option<MediaType>, TranscodeError>;

    /// Configure the type the decoder must output for a stream.
    fn set_decode_type(
        &mut self,
        stream_index: usize,
        media_type: &MediaType,
    ) -> Result<(), TranscodeError>;

    /// Type the decoder currently outputs for a stream.
    fn current_type(&mut self, stream_index: usize) -> Result<MediaType, TranscodeError>;

    /// Total duration of the source, if known.
    fn duration(&self) -> Option<Duration>;

    /// Size of the source file in bytes, if known.
    fn file_size(&self) -> Option<u64>;

    /// Start reading the next sample. The result is delivered through
    /// `completion` once available, possibly from another thread.
    fn request_sample(
        &mut self,
        completion: CompletionSink<Self::Sample>,
    ) -> Result<(), TranscodeError>;
}

/// A completed read as seen by the pipeline.
#[derive(Debug)]
pub struct ReadOutcome<S> {
    /// Source stream the read refers to.
    pub stream_index: usize,
    /// Events reported with the read. Never contains [`ReadFlags::ERROR`].
    pub flags: ReadFlags,
    /// Timestamp in microseconds.
    pub timestamp: i64,
    /// Decoded sample, absent on pure event reads.
    pub sample: Option<S>,
}

impl<S> ReadOutcome<S> {
    /// Whether the source reached its end.
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(ReadFlags::END_OF_STREAM)
    }
}

/// How a stream must be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeTarget {
    /// Decode to the given uncompressed type.
    Convert(MediaType),
    /// Leave the decoder as it is; the stream is already uncompressed.
    Keep,
    /// The stream cannot be encoded and must be deselected.
    Exclude,
}

/// Derive the decode target of a stream from its native type.
///
/// # Errors
///
/// Returns [`TranscodeError::IncompleteMediaType`] for audio streams that do
/// not declare their sample rate or channel count.
pub fn decode_target(
    stream_index: usize,
    native: &MediaType,
) -> Result<DecodeTarget, TranscodeError> {
    match &native.details {
        MediaDetails::Video(video) => Ok(DecodeTarget::Convert(uncompressed_video_from(video))),
        MediaDetails::Audio(_) if native.subtype.is_uncompressed() => Ok(DecodeTarget::Keep),
        MediaDetails::Audio(audio) => {
            uncompressed_audio_from(stream_index, audio).map(DecodeTarget::Convert)
        }
        MediaDetails::Other => Ok(DecodeTarget::Exclude),
    }
}

/// NV12, progressive, with a 1:1 pixel aspect ratio unless the source
/// declares one.
pub fn uncompressed_video_from(native: &VideoDetails) -> MediaType {
    MediaType::video(
        Subtype::Nv12,
        VideoDetails {
            width: native.width,
            height: native.height,
            frame_rate: native.frame_rate,
            pixel_aspect_ratio: Some(native.pixel_aspect_ratio.unwrap_or(Ratio::new(1, 1))),
            progressive: true,
            all_samples_independent: true,
        },
    )
}

/// PCM at the source sample rate and channel count.
///
/// # Errors
///
/// Returns [`TranscodeError::IncompleteMediaType`] if the sample rate or the
/// channel count is missing.
pub fn uncompressed_audio_from(
    stream_index: usize,
    native: &AudioDetails,
) -> Result<MediaType, TranscodeError> {
    if native.channels == 0 {
        return Err(TranscodeError::IncompleteMediaType {
            stream_index,
            reason: "channel count is not declared".to_string(),
        });
    }
    if native.sample_rate == 0 {
        return Err(TranscodeError::IncompleteMediaType {
            stream_index,
            reason: "sample rate is not declared".to_string(),
        });
    }

    let bits_per_sample = native
        .bits_per_sample
        .unwrap_or(DEFAULT_PCM_BITS_PER_SAMPLE);
    let block_alignment = u32::from(native.channels) * u32::from(bits_per_sample) / 8;

    Ok(MediaType::audio(
        Subtype::Pcm,
        AudioDetails {
            sample_rate: native.sample_rate,
            channels: native.channels,
            bits_per_sample: Some(bits_per_sample),
            channel_mask: native.channel_mask,
            average_bytes_per_second: Some(block_alignment * native.sample_rate),
            block_alignment: Some(block_alignment),
            all_samples_independent: true,
        },
    ))
}

/// Video bit rate estimated from the file size, for containers that do not
/// declare one.
pub fn bit_rate_from_file_size(file_size: u64, duration: Duration) -> u32 {
    let seconds = duration.as_secs_f64();
    if seconds <= 0.0 {
        return 0;
    }
    (FILE_SIZE_VIDEO_SHARE * file_size as f64 * 8.0 / seconds).min(f64::from(u32::MAX)) as u32
}

/// Request/await wrapper around a [`MediaReader`].
///
/// At most one read may be in flight: requesting while a read is
/// outstanding, or awaiting with none outstanding, panics.
pub struct AsyncSampleSource<R: MediaReader> {
    reader: R,
    mailbox: Mailbox<R::Sample>,
    in_flight: bool,
    configured_streams: usize,
    excluded: BTreeSet<usize>,
    requests_issued: u64,
    results_consumed: u64,
}

impl<R: MediaReader> AsyncSampleSource<R> {
    /// Wrap a reader, select all of its streams and configure their
    /// decoders.
    ///
    /// # Errors
    ///
    /// Returns any engine error raised while selecting streams or
    /// configuring decoders.
    pub fn new(reader: R) -> Result<Self, TranscodeError> {
        let mut source = Self {
            reader,
            mailbox: Mailbox::new(),
            in_flight: false,
            configured_streams: 0,
            excluded: BTreeSet::new(),
            requests_issued: 0,
            results_consumed: 0,
        };
        source.reader.select_all_streams()?;
        source.configure_decoders(false)?;
        Ok(source)
    }

    /// Issue the next asynchronous read.
    ///
    /// # Panics
    ///
    /// Panics if a previous read has not been awaited yet.
    pub fn request_next_sample(&mut self) -> Result<(), TranscodeError> {
        assert!(
            !self.in_flight,
            "a sample was requested while the previous read is still outstanding"
        );
        self.reader.request_sample(self.mailbox.sink())?;
        self.in_flight = true;
        self.requests_issued += 1;
        Ok(())
    }

    /// Block until the outstanding read completes.
    ///
    /// New streams are selected and configured, and a native type change
    /// triggers reconfiguration of every stream, before the outcome is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if no read is outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::Engine`] if the engine flagged the read as
    /// failed, or any error raised while reconfiguring decoders.
    pub fn await_result(&mut self) -> Result<ReadOutcome<R::Sample>, TranscodeError> {
        assert!(self.in_flight, "awaited a sample with no read outstanding");
        let result = self.mailbox.wait();
        self.in_flight = false;
        self.results_consumed += 1;

        if result.flags.contains(ReadFlags::ERROR) {
            let reason = result
                .error
                .unwrap_or_else(|| "engine reported an unspecified failure".to_string());
            log::error!("Read of stream {} failed: {reason}", result.stream_index);
            return Err(TranscodeError::engine("read sample", reason));
        }

        if result.flags.contains(ReadFlags::NEW_STREAM) {
            log::info!("New stream discovered at source index {}", result.stream_index);
            self.reader.select_all_streams()?;
            for &stream_index in &self.excluded {
                self.reader.deselect_stream(stream_index)?;
            }
            self.configure_decoders(result.flags.contains(ReadFlags::NATIVE_TYPE_CHANGED))?;
        } else if result.flags.contains(ReadFlags::NATIVE_TYPE_CHANGED) {
            log::info!("Native type of stream {} changed", result.stream_index);
            self.configure_decoders(true)?;
        }

        Ok(ReadOutcome {
            stream_index: result.stream_index,
            flags: result.flags,
            timestamp: result.timestamp,
            sample: result.sample,
        })
    }

    /// Descriptors of the selected streams at or after `first_index`.
    ///
    /// Excluded and unselected streams are skipped.
    ///
    /// # Errors
    ///
    /// Returns any engine error raised while querying stream types.
    pub fn decoded_streams_from(
        &mut self,
        first_index: usize,
    ) -> Result<Vec<(usize, StreamDescriptor)>, TranscodeError> {
        let mut streams = Vec::new();
        let mut stream_index = first_index;

        while let Some(native) = self.reader.native_type(stream_index)? {
            if !self.excluded.contains(&stream_index) && self.reader.is_selected(stream_index)? {
                let decoded = self.reader.current_type(stream_index)?;
                let rate = self.original_data_rate(&native);
                streams.push((stream_index, StreamDescriptor::new(decoded, rate)));
            }
            stream_index += 1;
        }

        Ok(streams)
    }

    /// Exclude a stream from decoding for the rest of the session.
    pub fn deselect(&mut self, stream_index: usize) -> Result<(), TranscodeError> {
        self.excluded.insert(stream_index);
        self.reader.deselect_stream(stream_index)
    }

    /// Source duration, if the engine knows it.
    pub fn duration(&self) -> Option<Duration> {
        self.reader.duration()
    }

    /// Whether a read is outstanding.
    pub fn is_request_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of reads issued so far.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Number of read results consumed so far.
    pub fn results_consumed(&self) -> u64 {
        self.results_consumed
    }

    /// Streams excluded from decoding.
    pub fn excluded_streams(&self) -> impl Iterator<Item = usize> + '_ {
        self.excluded.iter().copied()
    }

    /// The wrapped reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Unwrap the reader.
    pub fn into_reader(self) -> R {
        self.reader
    }

    fn configure_decoders(&mut self, reconfigure_all: bool) -> Result<(), TranscodeError> {
        let mut stream_index = if reconfigure_all {
            0
        } else {
            self.configured_streams
        };

        while let Some(native) = self.reader.native_type(stream_index)? {
            if !self.excluded.contains(&stream_index) {
                match decode_target(stream_index, &native)? {
                    DecodeTarget::Convert(target) => {
                        log::debug!(
                            "Stream {stream_index}: decoding {} to {}",
                            native.subtype,
                            target.subtype
                        );
                        self.reader.set_decode_type(stream_index, &target)?;
                    }
                    DecodeTarget::Keep => {
                        log::debug!("Stream {stream_index}: already uncompressed");
                    }
                    DecodeTarget::Exclude => {
                        log::debug!("Stream {stream_index}: deselected, kind is not encodable");
                        self.deselect(stream_index)?;
                    }
                }
            }
            stream_index += 1;
        }

        self.configured_streams = stream_index;
        Ok(())
    }

    fn original_data_rate(&self, native: &MediaType) -> u32 {
        match &native.details {
            MediaDetails::Video(_) => native.average_bit_rate.unwrap_or_else(|| {
                match (self.reader.file_size(), self.reader.duration()) {
                    (Some(size), Some(duration)) => bit_rate_from_file_size(size, duration),
                    _ => 0,
                }
            }),
            MediaDetails::Audio(audio) => audio
                .average_bytes_per_second
                .map(|bytes| bytes.saturating_mul(8))
                .or(native.average_bit_rate)
                .unwrap_or(0),
            MediaDetails::Other => native.average_bit_rate.unwrap_or(0),
        }
    }
}
