//! Decoded stream descriptors.
//!
//! A [`StreamDescriptor`] packs what the encoding side must know about one
//! decoded source stream: its kind, the data rate it was originally
//! encoded at, and the media type the decoder now produces. Descriptors are
//! recomputed whenever the source reports a native format change.

use crate::media_type::{MediaKind, MediaType};

/// Description of one decoded elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Major kind of the stream.
    pub kind: MediaKind,
    /// Data rate of the stream as encoded in the source, in bits per second.
    pub original_data_rate: u32,
    /// Media type the decoder outputs for this stream.
    pub decoded_type: MediaType,
}

impl StreamDescriptor {
    /// Create a descriptor. The kind is taken from the decoded type.
    pub fn new(decoded_type: MediaType, original_data_rate: u32) -> Self {
        Self {
            kind: decoded_type.kind(),
            original_data_rate,
            decoded_type,
        }
    }

    /// Frame area in pixels for video streams, zero otherwise.
    pub fn frame_area(&self) -> u64 {
        self.decoded_type
            .video_details()
            .map(|video| u64::from(video.width) * u64::from(video.height))
            .unwrap_or(0)
    }

    /// Original data rate in bytes per second.
    pub fn original_byte_rate(&self) -> u32 {
        self.original_data_rate / 8
    }
}
