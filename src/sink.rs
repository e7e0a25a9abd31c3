//! Encoding sink.
//!
//! [`EncodingSink`] wraps an encode engine implementing [`MediaWriter`].
//! It derives encoder settings for every stream it is given, keeps the
//! source-to-sink index mapping in a [`StreamRegistry`], and routes samples
//! and gap markers to the right encoder stream. All calls come from the
//! pipeline driver's thread.

use std::collections::BTreeMap;

use crate::{
    configuration::TargetFactor,
    descriptor::StreamDescriptor,
    error::TranscodeError,
    gap::GapTracker,
    media_type::MediaType,
    profile::{EncoderSettings, VideoCodec},
    registry::{StreamEntry, StreamRegistry},
};

/// Encode engine consumed by [`EncodingSink`].
pub trait MediaWriter {
    /// Decoded sample type accepted by the encoders.
    type Sample;

    /// Add an output stream and return its sink index.
    ///
    /// Sink indices must be assigned densely from zero in call order.
    fn add_stream(
        &mut self,
        settings: &EncoderSettings,
        input_type: &MediaType,
    ) -> Result<u16, TranscodeError>;

    /// Encode one sample on a sink stream.
    fn write_sample(&mut self, sink_index: u16, sample: Self::Sample)
    -> Result<(), TranscodeError>;

    /// Mark a discontinuity at `timestamp` (microseconds) on a sink stream.
    fn write_gap(&mut self, sink_index: u16, timestamp: i64) -> Result<(), TranscodeError>;

    /// Flush every encoder and close the output.
    fn finalize(&mut self) -> Result<(), TranscodeError>;

    /// Whether any stream is encoded by a hardware encoder.
    fn hardware_accelerated(&self) -> bool {
        false
    }
}

/// Routes decoded samples to the encoder streams of a [`MediaWriter`].
pub struct EncodingSink<W: MediaWriter> {
    writer: W,
    registry: StreamRegistry,
    descriptors: BTreeMap<usize, StreamDescriptor>,
    gaps: GapTracker,
    target_factor: TargetFactor,
    codec: VideoCodec,
}

impl<W: MediaWriter> EncodingSink<W> {
    /// Wrap a writer. Every video stream is encoded with `codec`, targeting
    /// `target_factor` of its source data rate.
    pub fn new(writer: W, target_factor: TargetFactor, codec: VideoCodec) -> Self {
        Self {
            writer,
            registry: StreamRegistry::new(),
            descriptors: BTreeMap::new(),
            gaps: GapTracker::new(),
            target_factor,
            codec,
        }
    }

    /// Register a source stream and create its encoder stream.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::UnsupportedStreamKind`] if the stream is neither
    ///   video nor audio. The stream still occupies its registry slot.
    /// - [`TranscodeError::Engine`] if the writer assigned an unexpected
    ///   sink index, or any error from the writer.
    ///
    /// # Panics
    ///
    /// Panics if `source_index` is not greater than every source index
    /// added before.
    pub fn add_stream(
        &mut self,
        source_index: usize,
        descriptor: &StreamDescriptor,
    ) -> Result<u16, TranscodeError> {
        let sink_index = self.registry.register_stream(source_index, descriptor.kind)?;
        let settings =
            EncoderSettings::for_stream(source_index, descriptor, self.target_factor, self.codec)?;

        let assigned = self
            .writer
            .add_stream(&settings, &descriptor.decoded_type)?;
        if assigned != sink_index {
            return Err(TranscodeError::engine(
                "add stream",
                format!("writer assigned sink stream {assigned}, expected {sink_index}"),
            ));
        }

        log::info!(
            "Source stream {source_index} ({}) mapped to output stream {sink_index}",
            descriptor.kind
        );
        self.descriptors.insert(source_index, descriptor.clone());
        Ok(sink_index)
    }

    /// Descriptor of an encoded source stream, as last recorded.
    pub fn descriptor(&self, source_index: usize) -> Option<&StreamDescriptor> {
        self.descriptors.get(&source_index)
    }

    /// Record the recomputed descriptor of an encoded source stream after
    /// its native format changed.
    ///
    /// The encoder stream keeps the settings chosen when it was added; the
    /// writer converts samples of the new format to them. Returns whether
    /// the descriptor differs from the recorded one.
    pub fn update_descriptor(&mut self, source_index: usize, descriptor: StreamDescriptor) -> bool {
        let Some(current) = self.descriptors.get_mut(&source_index) else {
            return false;
        };
        if *current == descriptor {
            return false;
        }

        match descriptor.decoded_type.video_details() {
            Some(video) => log::info!(
                "Source stream {source_index} now decodes to {} {}x{}",
                descriptor.decoded_type.subtype,
                video.width,
                video.height
            ),
            None => log::info!(
                "Source stream {source_index} now decodes to {}",
                descriptor.decoded_type.subtype
            ),
        }
        *current = descriptor;
        true
    }

    /// Encode a sample read from `source_index`.
    ///
    /// Samples of streams without an encoder stream are dropped with a
    /// warning.
    pub fn submit_sample(
        &mut self,
        source_index: usize,
        sample: W::Sample,
    ) -> Result<(), TranscodeError> {
        match self.sink_index(source_index) {
            Some(sink_index) => self.writer.write_sample(sink_index, sample),
            None => {
                log::warn!("Dropping sample of source stream {source_index}: not encoded");
                Ok(())
            }
        }
    }

    /// Mark a timeline gap on the encoder stream of `source_index`.
    ///
    /// A gap at or before the last gap placed on the same stream is ignored.
    /// Returns whether the gap was forwarded to the writer.
    pub fn place_gap(&mut self, source_index: usize, timestamp: i64) -> Result<bool, TranscodeError> {
        let Some(sink_index) = self.sink_index(source_index) else {
            return Ok(false);
        };
        if !self.gaps.advance(sink_index, timestamp) {
            return Ok(false);
        }
        self.writer.write_gap(sink_index, timestamp)?;
        Ok(true)
    }

    /// Flush and close the output.
    pub fn finalize(&mut self) -> Result<(), TranscodeError> {
        self.writer.finalize()
    }

    /// Registry entry of a source stream, if it lies in the registered
    /// range.
    pub fn entry(&self, source_index: usize) -> Option<StreamEntry> {
        if self.registry.contains(source_index) {
            self.registry.lookup(source_index)
        } else {
            None
        }
    }

    /// The source-to-sink stream mapping.
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// The wrapped writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Unwrap the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn sink_index(&self, source_index: usize) -> Option<u16> {
        self.entry(source_index).and_then(|entry| entry.sink_index)
    }
}
