//! # vtranscode
//!
//! Re-encode multi-stream media files through an asynchronous
//! decode → encode pipeline.
//!
//! `vtranscode` reads every stream of a source file, decodes video to NV12
//! and audio to PCM, and re-encodes them to H.264 or HEVC video and AAC
//! audio, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate. The output
//! size is steered by a single target factor, and the encoder's quality vs.
//! speed trade-off is estimated from how compressed the source already is.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vtranscode::{TranscodeOptions, Transcoder};
//!
//! let summary = Transcoder::open("input.mp4", TranscodeOptions::new())?.run("output.mp4")?;
//! println!("wrote {} output streams", summary.output_streams);
//! # Ok::<(), vtranscode::TranscodeError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`AsyncSampleSource`] wraps a decode engine ([`MediaReader`]) and
//!   exposes a request/await pair for reading one sample at a time.
//! - [`EncodingSink`] wraps an encode engine ([`MediaWriter`]), derives
//!   encoder settings per stream and maps source streams to output streams
//!   through a [`StreamRegistry`].
//! - [`Pipeline`] drives samples from the source to the sink, placing
//!   timeline gaps and adding streams discovered mid-file, until the source
//!   reports end of stream.
//!
//! The FFmpeg engines live in [`ffmpeg`]; any other engine can be plugged in
//! by implementing the two engine traits.
//!
//! ## Features
//!
//! - **Quality estimation** from the source bytes per pixel and the target
//!   factor
//! - **Hardware encoders** (NVENC, Quick Sync, VAAPI, VideoToolbox, AMF)
//!   with automatic software fallback
//! - **Dynamic streams**: streams appearing mid-file get output streams
//! - **Gap handling**: timeline discontinuities are forwarded to encoders
//! - **Progress** reporting with elapsed and remaining time
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod descriptor;
pub mod error;
pub mod ffmpeg;
pub mod gap;
pub mod hardware_acceleration;
pub mod mailbox;
pub mod media_type;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod quality;
pub mod registry;
pub mod sink;
pub mod source;
pub mod transcode;

pub use configuration::{TargetFactor, TranscodeOptions};
pub use descriptor::StreamDescriptor;
pub use error::TranscodeError;
pub use ffmpeg::{
    DecodedFrame, FfmpegLogLevel, FfmpegReader, FfmpegWriter, get_ffmpeg_log_level,
    set_ffmpeg_log_level,
};
pub use gap::GapTracker;
pub use hardware_acceleration::{HardwareAccelerationMode, HardwareDeviceType};
pub use mailbox::{CompletionSink, Mailbox, ReadFlags, ReadResult};
pub use media_type::{
    AudioDetails, MediaDetails, MediaKind, MediaType, Ratio, Subtype, VideoDetails,
};
pub use pipeline::{Pipeline, PipelineState, TranscodeSummary};
pub use profile::{AudioEncoderSettings, EncoderSettings, VideoCodec, VideoEncoderSettings};
pub use progress::{NoOpProgress, ProgressCallback, ProgressInfo, ProgressState};
pub use registry::{StreamEntry, StreamRegistry};
pub use sink::{EncodingSink, MediaWriter};
pub use source::{AsyncSampleSource, MediaReader, ReadOutcome};
pub use transcode::{StreamPlan, Transcoder};
