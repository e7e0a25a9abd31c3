//! Engine-neutral media type model.
//!
//! A [`MediaType`] describes the format of one elementary stream, either as
//! found in the source container (its *native* type) or as produced by the
//! decoder after reconfiguration (its *decoded* type). Decode and encode
//! engines translate to and from this model so the pipeline never touches
//! engine handles.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Major kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Anything else (subtitles, data, attachments). Never encoded.
    Other,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// An unsigned ratio, used for frame rates and pixel aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    /// Numerator.
    pub numerator: u32,
    /// Denominator.
    pub denominator: u32,
}

impl Ratio {
    /// Create a new ratio.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Value as a float, or `None` if the denominator is zero.
    pub fn as_f64(self) -> Option<f64> {
        if self.denominator == 0 {
            None
        } else {
            Some(self.numerator as f64 / self.denominator as f64)
        }
    }
}

impl Display for Ratio {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Sample encoding of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subtype {
    /// Uncompressed planar Y + interleaved UV 4:2:0 video.
    Nv12,
    /// Uncompressed interleaved PCM audio.
    Pcm,
    /// Compressed data, identified by codec name (e.g. `"h264"`, `"aac"`).
    Encoded(String),
}

impl Subtype {
    /// Whether the samples are already uncompressed.
    pub fn is_uncompressed(&self) -> bool {
        matches!(self, Subtype::Nv12 | Subtype::Pcm)
    }
}

impl Display for Subtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Subtype::Nv12 => write!(f, "nv12"),
            Subtype::Pcm => write!(f, "pcm"),
            Subtype::Encoded(codec) => write!(f, "{codec}"),
        }
    }
}

/// Video-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate, if known.
    pub frame_rate: Option<Ratio>,
    /// Pixel aspect ratio, if the container declares one.
    pub pixel_aspect_ratio: Option<Ratio>,
    /// `true` for progressive scan.
    pub progressive: bool,
    /// `true` when every sample is a key frame.
    pub all_samples_independent: bool,
}

/// Audio-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDetails {
    /// Samples per second. Zero when unknown.
    pub sample_rate: u32,
    /// Channel count. Zero when unknown.
    pub channels: u16,
    /// Bits per sample, if declared.
    pub bits_per_sample: Option<u16>,
    /// Speaker channel mask, if declared.
    pub channel_mask: Option<u64>,
    /// Average data rate in bytes per second, if known.
    pub average_bytes_per_second: Option<u32>,
    /// Block alignment in bytes, for uncompressed audio.
    pub block_alignment: Option<u32>,
    /// `true` when every sample is independently decodable.
    pub all_samples_independent: bool,
}

/// Kind-specific attributes of a [`MediaType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaDetails {
    /// Video stream attributes.
    Video(VideoDetails),
    /// Audio stream attributes.
    Audio(AudioDetails),
    /// Stream kind the pipeline does not handle.
    Other,
}

/// Format of one elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Sample encoding.
    pub subtype: Subtype,
    /// Kind-specific attributes.
    pub details: MediaDetails,
    /// Average data rate in bits per second, if the container declares it.
    pub average_bit_rate: Option<u32>,
}

impl MediaType {
    /// Build a video media type.
    pub fn video(subtype: Subtype, details: VideoDetails) -> Self {
        Self {
            subtype,
            details: MediaDetails::Video(details),
            average_bit_rate: None,
        }
    }

    /// Build an audio media type.
    pub fn audio(subtype: Subtype, details: AudioDetails) -> Self {
        Self {
            subtype,
            details: MediaDetails::Audio(details),
            average_bit_rate: None,
        }
    }

    /// Build a media type for a stream the pipeline does not handle.
    pub fn other(codec: impl Into<String>) -> Self {
        Self {
            subtype: Subtype::Encoded(codec.into()),
            details: MediaDetails::Other,
            average_bit_rate: None,
        }
    }

    /// Attach an average bit rate.
    #[must_use]
    pub fn with_average_bit_rate(mut self, bit_rate: u32) -> Self {
        self.average_bit_rate = Some(bit_rate);
        self
    }

    /// Major kind of the stream.
    pub fn kind(&self) -> MediaKind {
        match self.details {
            MediaDetails::Video(_) => MediaKind::Video,
            MediaDetails::Audio(_) => MediaKind::Audio,
            MediaDetails::Other => MediaKind::Other,
        }
    }

    /// Video attributes, if this is a video type.
    pub fn video_details(&self) -> Option<&VideoDetails> {
        match &self.details {
            MediaDetails::Video(details) => Some(details),
            _ => None,
        }
    }

    /// Audio attributes, if this is an audio type.
    pub fn audio_details(&self) -> Option<&AudioDetails> {
        match &self.details {
            MediaDetails::Audio(details) => Some(details),
            _ => None,
        }
    }
}
