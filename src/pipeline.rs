//! Pipeline driver.
//!
//! [`Pipeline`] runs the request → await → dispatch loop that moves decoded
//! samples from an [`AsyncSampleSource`] into an [`EncodingSink`]. Each read
//! result is handled in a fixed order:
//!
//! 1. a gap is placed on the stream's encoder,
//! 2. newly discovered streams get encoder streams and streams whose
//!    native format changed get fresh descriptors,
//! 3. unless the source ended, the next read is issued,
//! 4. the sample, if any, is encoded,
//! 5. progress is updated.
//!
//! The loop ends after the read that carries the end-of-stream flag, at
//! which point the sink is finalized.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::TranscodeError,
    mailbox::ReadFlags,
    progress::{ProgressCallback, ProgressTracker},
    sink::{EncodingSink, MediaWriter},
    source::{AsyncSampleSource, MediaReader},
};

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Created, no read issued yet.
    Idle,
    /// Reading and encoding samples.
    Running,
    /// End of stream observed; flushing encoders.
    Draining,
    /// Output finalized.
    Finished,
    /// A fatal error ended the session.
    Failed,
}

/// Statistics of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSummary {
    /// Number of encoded output streams.
    pub output_streams: u16,
    /// Number of samples handed to the encoders.
    pub samples_written: u64,
    /// Number of gaps forwarded to the encoders.
    pub gaps_placed: u64,
    /// Number of streams discovered after the session started.
    pub streams_discovered: u64,
    /// Number of stream descriptors recomputed after native format changes.
    pub format_changes: u64,
    /// Number of reads issued.
    pub reads: u64,
    /// Whether any stream used a hardware encoder.
    pub hardware_accelerated: bool,
    /// Wall-clock duration of the session.
    pub elapsed: Duration,
}

/// Drives samples from a source to a sink until end of stream.
pub struct Pipeline<R, W>
where
    R: MediaReader,
    W: MediaWriter<Sample = R::Sample>,
{
    source: AsyncSampleSource<R>,
    sink: EncodingSink<W>,
    state: PipelineState,
    progress: ProgressTracker,
    samples_written: u64,
    gaps_placed: u64,
    streams_discovered: u64,
    format_changes: u64,
}

impl<R, W> Pipeline<R, W>
where
    R: MediaReader,
    W: MediaWriter<Sample = R::Sample>,
{
    /// Build a pipeline. Progress is reported against the source duration.
    pub fn new(
        source: AsyncSampleSource<R>,
        sink: EncodingSink<W>,
        progress: Arc<dyn ProgressCallback>,
    ) -> Self {
        let duration = source.duration();
        Self {
            source,
            sink,
            state: PipelineState::Idle,
            progress: ProgressTracker::new(progress, duration),
            samples_written: 0,
            gaps_placed: 0,
            streams_discovered: 0,
            format_changes: 0,
        }
    }

    /// Run the session to completion.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by the source or the sink; the
    /// pipeline is then [`Failed`](PipelineState::Failed).
    ///
    /// # Panics
    ///
    /// Panics if the pipeline already ran.
    pub fn run(&mut self) -> Result<TranscodeSummary, TranscodeError> {
        assert_eq!(
            self.state,
            PipelineState::Idle,
            "a pipeline can only be run once"
        );

        match self.drive() {
            Ok(summary) => {
                self.state = PipelineState::Finished;
                log::info!(
                    "Transcoding finished: {} samples in {} streams, {:.1}s",
                    summary.samples_written,
                    summary.output_streams,
                    summary.elapsed.as_secs_f64()
                );
                Ok(summary)
            }
            Err(error) => {
                self.state = PipelineState::Failed;
                log::error!("Transcoding failed: {error}");
                Err(error)
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The sample source.
    pub fn source(&self) -> &AsyncSampleSource<R> {
        &self.source
    }

    /// The encoding sink.
    pub fn sink(&self) -> &EncodingSink<W> {
        &self.sink
    }

    /// Split the pipeline back into its source and sink.
    pub fn into_parts(self) -> (AsyncSampleSource<R>, EncodingSink<W>) {
        (self.source, self.sink)
    }

    fn drive(&mut self) -> Result<TranscodeSummary, TranscodeError> {
        self.add_new_streams()?;

        self.source.request_next_sample()?;
        self.state = PipelineState::Running;

        loop {
            let outcome = self.source.await_result()?;

            if outcome.flags.contains(ReadFlags::GAP)
                && self.sink.place_gap(outcome.stream_index, outcome.timestamp)?
            {
                self.gaps_placed += 1;
            }

            if outcome.flags.contains(ReadFlags::NEW_STREAM) {
                self.streams_discovered += self.add_new_streams()?;
            }
            if outcome.flags.contains(ReadFlags::NATIVE_TYPE_CHANGED) {
                self.format_changes += self.refresh_descriptors()?;
            }

            let end_of_stream = outcome.is_end_of_stream();
            if !end_of_stream {
                self.source.request_next_sample()?;
            }

            if let Some(sample) = outcome.sample {
                self.sink.submit_sample(outcome.stream_index, sample)?;
                self.samples_written += 1;
            }

            self.progress.advance(outcome.timestamp);

            if end_of_stream {
                break;
            }
        }

        self.state = PipelineState::Draining;
        self.sink.finalize()?;
        let elapsed = self.progress.finish();

        Ok(TranscodeSummary {
            output_streams: self.sink.registry().sink_stream_count(),
            samples_written: self.samples_written,
            gaps_placed: self.gaps_placed,
            streams_discovered: self.streams_discovered,
            format_changes: self.format_changes,
            reads: self.source.requests_issued(),
            hardware_accelerated: self.sink.writer().hardware_accelerated(),
            elapsed,
        })
    }

    /// Add encoder streams for every source stream past the registered
    /// range. Returns the number of streams added.
    fn add_new_streams(&mut self) -> Result<u64, TranscodeError> {
        let first = self.sink.registry().len();
        let mut added = 0;

        for (source_index, descriptor) in self.source.decoded_streams_from(first)? {
            match self.sink.add_stream(source_index, &descriptor) {
                Ok(_) => added += 1,
                Err(error) if error.is_recoverable() => {
                    log::warn!("Excluding source stream {source_index}: {error}");
                    self.source.deselect(source_index)?;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(added)
    }

    /// Recompute the descriptors of the encoded streams after the source
    /// reported a native format change. Returns the number that changed.
    fn refresh_descriptors(&mut self) -> Result<u64, TranscodeError> {
        let registered = self.sink.registry().len();
        let mut changed = 0;

        for (source_index, descriptor) in self.source.decoded_streams_from(0)? {
            if source_index < registered && self.sink.update_descriptor(source_index, descriptor) {
                changed += 1;
            }
        }

        Ok(changed)
    }
}
