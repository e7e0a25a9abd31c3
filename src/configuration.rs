//! Transcoding configuration.
//!
//! [`TranscodeOptions`] is a builder that threads the target factor, the
//! video codec, hardware acceleration and progress reporting through a
//! transcoding session without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vtranscode::{ProgressCallback, ProgressInfo, TargetFactor, TranscodeOptions, VideoCodec};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}% done", info.percent);
//!     }
//! }
//!
//! let options = TranscodeOptions::new()
//!     .with_codec(VideoCodec::Hevc)
//!     .with_target_factor(TargetFactor::new(0.4)?)
//!     .with_progress(Arc::new(LogProgress));
//! # Ok::<(), vtranscode::TranscodeError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::{
    error::TranscodeError,
    hardware_acceleration::HardwareAccelerationMode,
    profile::VideoCodec,
    progress::{NoOpProgress, ProgressCallback},
};

/// Target output size/quality as a fraction of the source data rate.
///
/// Always within `(0, 1]`: `1.0` keeps the source video data rate, `0.5`
/// halves it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TargetFactor(f64);

impl TargetFactor {
    /// Factor used when none is configured.
    pub const DEFAULT: TargetFactor = TargetFactor(0.5);

    /// Validate and wrap a factor.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::InvalidTargetFactor`] unless
    /// `0.0 < value <= 1.0`.
    pub fn new(value: f64) -> Result<Self, TranscodeError> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(TranscodeError::InvalidTargetFactor(value))
        }
    }

    /// The wrapped value.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for TargetFactor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration for a transcoding session.
#[derive(Clone)]
pub struct TranscodeOptions {
    pub(crate) target_factor: TargetFactor,
    pub(crate) codec: VideoCodec,
    pub(crate) hardware_acceleration: HardwareAccelerationMode,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for TranscodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TranscodeOptions")
            .field("target_factor", &self.target_factor.get())
            .field("codec", &self.codec)
            .field("hardware_acceleration", &self.hardware_acceleration)
            .field("has_progress", &true)
            .finish()
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeOptions {
    /// Create options with default settings.
    ///
    /// Defaults: H.264, target factor 0.5, automatic hardware acceleration,
    /// no progress callback.
    pub fn new() -> Self {
        Self {
            target_factor: TargetFactor::DEFAULT,
            codec: VideoCodec::H264,
            hardware_acceleration: HardwareAccelerationMode::Auto,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set the target factor.
    #[must_use]
    pub fn with_target_factor(mut self, target_factor: TargetFactor) -> Self {
        self.target_factor = target_factor;
        self
    }

    /// Set the video codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the hardware acceleration mode for the video encoder.
    #[must_use]
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware_acceleration = mode;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The configured target factor.
    pub fn target_factor(&self) -> TargetFactor {
        self.target_factor
    }

    /// The configured video codec.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// The configured hardware acceleration mode.
    pub fn hardware_acceleration(&self) -> HardwareAccelerationMode {
        self.hardware_acceleration
    }
}
