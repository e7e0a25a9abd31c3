//! Error types for the `vtranscode` crate.
//!
//! This module defines [`TranscodeError`], the unified error type returned by
//! every fallible operation in the crate. Fatal engine failures carry the
//! name of the engine operation that failed alongside the engine-reported
//! reason, so the session can be aborted with a useful message.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::media_type::MediaKind;

/// The unified error type for all `vtranscode` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranscodeError {
    /// The input or output media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A target quality/size factor outside `(0, 1]` was supplied.
    #[error("Target factor {0} is outside the range (0, 1]")]
    InvalidTargetFactor(f64),

    /// A decode or encode engine reported a failure. The session cannot
    /// continue.
    #[error("{operation} failed: {reason}")]
    Engine {
        /// Name of the engine operation that failed.
        operation: String,
        /// Engine-reported reason.
        reason: String,
    },

    /// A discovered stream cannot be encoded. Recovered by excluding the
    /// stream from decoding.
    #[error("Source stream {source_index} has unsupported kind {kind:?}")]
    UnsupportedStreamKind {
        /// Index of the stream in the source.
        source_index: usize,
        /// Kind that was rejected.
        kind: MediaKind,
    },

    /// The native media type of a stream lacks information required to
    /// derive its decode target.
    #[error("Media type of stream {stream_index} is incomplete: {reason}")]
    IncompleteMediaType {
        /// Index of the stream in the source.
        stream_index: usize,
        /// What was missing.
        reason: String,
    },

    /// No encoder could be opened for the requested codec.
    #[error("No usable encoder: {0}")]
    EncoderUnavailable(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl TranscodeError {
    /// Build an [`Engine`](TranscodeError::Engine) error.
    pub fn engine(operation: impl Into<String>, reason: impl ToString) -> Self {
        TranscodeError::Engine {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the pipeline may continue after this error.
    ///
    /// Only [`UnsupportedStreamKind`](TranscodeError::UnsupportedStreamKind)
    /// is recovered locally; everything else aborts the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TranscodeError::UnsupportedStreamKind { .. })
    }
}

impl From<FfmpegError> for TranscodeError {
    fn from(error: FfmpegError) -> Self {
        TranscodeError::FfmpegError(error.to_string())
    }
}
