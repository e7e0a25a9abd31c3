//! FFmpeg decode and encode engines.
//!
//! [`FfmpegReader`] implements [`MediaReader`](crate::MediaReader) on top of
//! `libavformat`/`libavcodec`, and [`FfmpegWriter`] implements
//! [`MediaWriter`](crate::MediaWriter). Both exchange [`DecodedFrame`]s
//! whose presentation timestamps are in microseconds.
//!
//! FFmpeg has its own internal logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) crate. [`set_ffmpeg_log_level`]
//! tunes FFmpeg's console output without importing `ffmpeg-next` directly.
//!
//! # Example
//!
//! ```no_run
//! use vtranscode::FfmpegLogLevel;
//!
//! // Silence all FFmpeg output except fatal errors.
//! vtranscode::set_ffmpeg_log_level(FfmpegLogLevel::Fatal);
//! ```

mod reader;
mod writer;

use ffmpeg_next::{
    Rational, Rescale,
    frame::{Audio as AudioFrame, Video as VideoFrame},
    util::log::Level,
};

pub use reader::FfmpegReader;
pub use writer::FfmpegWriter;

/// Time base of every timestamp crossing the engine boundary.
pub(crate) const MICROSECONDS: Rational = Rational(1, 1_000_000);

/// Convert a timestamp from `time_base` to microseconds.
pub(crate) fn to_microseconds(timestamp: i64, time_base: Rational) -> i64 {
    timestamp.rescale(time_base, MICROSECONDS)
}

/// A decoded sample: an NV12 video frame or a packed 16-bit PCM audio frame.
///
/// The frame's presentation timestamp is expressed in microseconds.
pub enum DecodedFrame {
    /// Uncompressed video.
    Video(VideoFrame),
    /// Uncompressed audio.
    Audio(AudioFrame),
}

impl DecodedFrame {
    /// Presentation timestamp in microseconds.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            DecodedFrame::Video(frame) => frame.pts(),
            DecodedFrame::Audio(frame) => frame.pts(),
        }
    }
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodedFrame::Video(frame) => f
                .debug_struct("Video")
                .field("width", &frame.width())
                .field("height", &frame.height())
                .field("pts", &frame.pts())
                .finish(),
            DecodedFrame::Audio(frame) => f
                .debug_struct("Audio")
                .field("samples", &frame.samples())
                .field("rate", &frame.rate())
                .field("pts", &frame.pts())
                .finish(),
        }
    }
}

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions the process cannot recover from.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (default FFmpeg level).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}
