//! Whole-file transcoding.
//!
//! [`Transcoder`] wires the FFmpeg engines into a [`Pipeline`]: it opens the
//! input, negotiates decoders, creates the output and runs the session.
//!
//! # Example
//!
//! ```no_run
//! use vtranscode::{TargetFactor, TranscodeOptions, Transcoder, VideoCodec};
//!
//! let options = TranscodeOptions::new()
//!     .with_codec(VideoCodec::Hevc)
//!     .with_target_factor(TargetFactor::new(0.3)?);
//! let summary = Transcoder::open("input.mp4", options)?.run("output.mp4")?;
//! println!("{} samples written", summary.samples_written);
//! # Ok::<(), vtranscode::TranscodeError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use crate::{
    configuration::TranscodeOptions,
    descriptor::StreamDescriptor,
    error::TranscodeError,
    ffmpeg::{FfmpegReader, FfmpegWriter},
    pipeline::{Pipeline, TranscodeSummary},
    profile::EncoderSettings,
    sink::EncodingSink,
    source::AsyncSampleSource,
};

/// Encoding plan of one source stream, as reported by
/// [`Transcoder::plan`].
#[derive(Debug, Clone)]
pub struct StreamPlan {
    /// Index of the stream in the source.
    pub source_index: usize,
    /// Decoded stream description.
    pub descriptor: StreamDescriptor,
    /// Encoder settings the session would use, `None` if the stream would
    /// be excluded.
    pub settings: Option<EncoderSettings>,
}

/// Transcodes one media file into another.
pub struct Transcoder {
    source: AsyncSampleSource<FfmpegReader>,
    options: TranscodeOptions,
}

impl Transcoder {
    /// Open the input and configure its decoders.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::FileOpen`] if the input cannot be opened.
    /// - Any engine error raised while configuring decoders.
    pub fn open<P: AsRef<Path>>(input: P, options: TranscodeOptions) -> Result<Self, TranscodeError> {
        let reader = FfmpegReader::open(input)?;
        let source = AsyncSampleSource::new(reader)?;
        Ok(Self { source, options })
    }

    /// Source duration, if known.
    pub fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }

    /// Describe every decoded stream and the encoder settings it would get.
    pub fn plan(&mut self) -> Result<Vec<StreamPlan>, TranscodeError> {
        let target_factor = self.options.target_factor();
        let codec = self.options.codec();

        Ok(self
            .source
            .decoded_streams_from(0)?
            .into_iter()
            .map(|(source_index, descriptor)| {
                let settings =
                    EncoderSettings::for_stream(source_index, &descriptor, target_factor, codec).ok();
                StreamPlan {
                    source_index,
                    descriptor,
                    settings,
                }
            })
            .collect())
    }

    /// Transcode the whole input into `output`.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::FileOpen`] if the output cannot be created.
    /// - [`TranscodeError::EncoderUnavailable`] if no encoder opens for a
    ///   stream.
    /// - [`TranscodeError::Engine`] on any fatal decode or encode failure.
    ///   Bytes already written to `output` are left in place.
    pub fn run<P: AsRef<Path>>(self, output: P) -> Result<TranscodeSummary, TranscodeError> {
        log::info!(
            "Transcoding to {} ({:?})",
            output.as_ref().display(),
            self.options
        );

        let writer = FfmpegWriter::create(output, self.options.hardware_acceleration())?;
        let sink = EncodingSink::new(
            writer,
            self.options.target_factor(),
            self.options.codec(),
        );

        let mut pipeline = Pipeline::new(self.source, sink, self.options.progress.clone());
        pipeline.run()
    }
}
