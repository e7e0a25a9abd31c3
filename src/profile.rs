//! Per-stream encoder settings.
//!
//! [`EncoderSettings::for_stream`] turns a [`StreamDescriptor`] and a
//! [`TargetFactor`] into the parameters handed to the encode engine when a
//! stream is added: target data rate, quality vs. speed, and the format the
//! encoder must produce.

use crate::{
    configuration::TargetFactor,
    descriptor::StreamDescriptor,
    error::TranscodeError,
    media_type::{MediaDetails, MediaKind, Ratio},
    quality::{self, AUDIO_QUALITY_VS_SPEED},
};

/// Frame rate assumed when the source does not declare one.
const DEFAULT_FRAME_RATE: Ratio = Ratio::new(30, 1);

/// Bits per sample assumed for audio sources that do not declare it.
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264 / AVC, High profile.
    H264,
    /// H.265 / HEVC, Main 8-bit 4:2:0 profile.
    Hevc,
}

impl VideoCodec {
    /// Short lowercase name, as used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Hevc => "hevc",
        }
    }

    /// Encoder profile name.
    pub fn profile(self) -> &'static str {
        match self {
            VideoCodec::H264 => "high",
            VideoCodec::Hevc => "main",
        }
    }
}

/// Encoder parameters for a video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoderSettings {
    /// Output codec.
    pub codec: VideoCodec,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate.
    pub frame_rate: Ratio,
    /// Target average bit rate in bits per second.
    pub average_bit_rate: u32,
    /// Quality vs. speed knob in `[1, 100]`.
    pub quality_vs_speed: u32,
}

/// Encoder parameters for an audio stream. Audio is always AAC.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEncoderSettings {
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bits per sample of the input.
    pub bits_per_sample: u16,
    /// Target average data rate in bytes per second.
    pub average_bytes_per_second: u32,
    /// Quality vs. speed knob in `[1, 100]`.
    pub quality_vs_speed: u32,
}

/// Encoder parameters for one output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderSettings {
    /// Video stream.
    Video(VideoEncoderSettings),
    /// Audio stream.
    Audio(AudioEncoderSettings),
}

impl EncoderSettings {
    /// Derive encoder settings for a decoded stream.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::UnsupportedStreamKind`] for streams that are
    ///   neither video nor audio.
    pub fn for_stream(
        source_index: usize,
        descriptor: &StreamDescriptor,
        target: TargetFactor,
        codec: VideoCodec,
    ) -> Result<Self, TranscodeError> {
        match &descriptor.decoded_type.details {
            MediaDetails::Video(video) => {
                let frame_rate = video.frame_rate.unwrap_or_else(|| {
                    log::warn!(
                        "Stream {source_index} declares no frame rate; assuming {DEFAULT_FRAME_RATE}"
                    );
                    DEFAULT_FRAME_RATE
                });

                let average_bit_rate =
                    (f64::from(descriptor.original_data_rate) * target.get()) as u32;
                let quality_vs_speed = quality::estimate_complexity(descriptor, target);

                log::info!(
                    "Stream {source_index}: targeted video data rate is {:.1} KB/s",
                    f64::from(average_bit_rate) / (8.0 * 1024.0)
                );
                log::info!(
                    "Stream {source_index}: encoder 'quality vs. speed' set to {quality_vs_speed}%"
                );

                Ok(EncoderSettings::Video(VideoEncoderSettings {
                    codec,
                    width: video.width,
                    height: video.height,
                    frame_rate,
                    average_bit_rate,
                    quality_vs_speed,
                }))
            }
            MediaDetails::Audio(audio) => {
                let average_bytes_per_second =
                    quality::audio_target_byte_rate(descriptor.original_byte_rate());

                log::info!(
                    "Stream {source_index}: targeted audio data rate is {average_bytes_per_second} B/s"
                );

                Ok(EncoderSettings::Audio(AudioEncoderSettings {
                    sample_rate: audio.sample_rate,
                    channels: audio.channels,
                    bits_per_sample: audio.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE),
                    average_bytes_per_second,
                    quality_vs_speed: AUDIO_QUALITY_VS_SPEED,
                }))
            }
            MediaDetails::Other => Err(TranscodeError::UnsupportedStreamKind {
                source_index,
                kind: MediaKind::Other,
            }),
        }
    }

    /// Kind of stream these settings encode.
    pub fn kind(&self) -> MediaKind {
        match self {
            EncoderSettings::Video(_) => MediaKind::Video,
            EncoderSettings::Audio(_) => MediaKind::Audio,
        }
    }
}
