//! Progress reporting.
//!
//! The pipeline reports how far it got through the source timeline via a
//! [`ProgressCallback`]. Reports are throttled by [`ProgressState`]: a
//! callback fires only when the integer completion percentage changes, plus
//! one final report when the session finishes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vtranscode::{ProgressCallback, ProgressInfo, TranscodeOptions, Transcoder};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:3}% [{}/40]", info.percent, info.steps);
//!     }
//! }
//!
//! let options = TranscodeOptions::new().with_progress(Arc::new(PrintProgress));
//! Transcoder::open("input.mp4", options)?.run("output.mp4")?;
//! # Ok::<(), vtranscode::TranscodeError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of steps in a full progress bar.
pub const BAR_STEPS: u32 = 40;

/// A snapshot of transcoding progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Completion percentage in `[0, 100]`.
    pub percent: u32,
    /// Filled progress bar steps in `[0, BAR_STEPS]`.
    pub steps: u32,
    /// Timestamp of the most recent sample.
    pub position: Duration,
    /// Total source duration, if known.
    pub duration: Option<Duration>,
    /// Wall-clock time since the session started.
    pub elapsed: Duration,
    /// Estimated time remaining, extrapolated from the elapsed time.
    pub estimated_remaining: Option<Duration>,
    /// `true` on the final report of a session.
    pub finished: bool,
}

/// Trait for receiving progress updates during transcoding.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// pipeline.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the completion percentage changes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Last reported progress, owned by the pipeline driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Percentage of the last report, `None` before the first one.
    pub last_percent: Option<u32>,
    /// Bar steps of the last report.
    pub last_steps: u32,
}

impl ProgressState {
    /// Create a state with nothing reported yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new position and return `(percent, steps)` when the integer
    /// percentage changed since the last report.
    ///
    /// Returns `None` when the duration is unknown or zero, or when the
    /// percentage did not change.
    pub fn update(&mut self, position: Duration, duration: Duration) -> Option<(u32, u32)> {
        if duration.is_zero() {
            return None;
        }
        let fraction = (position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0);
        let percent = (fraction * 100.0) as u32;
        if self.last_percent == Some(percent) {
            return None;
        }
        let steps = (fraction * f64::from(BAR_STEPS)) as u32;
        self.last_percent = Some(percent);
        self.last_steps = steps;
        Some((percent, steps))
    }
}

/// Estimate the remaining time from the elapsed time and completed fraction.
///
/// Returns `None` until some progress was made.
pub fn estimate_remaining(elapsed: Duration, fraction: f64) -> Option<Duration> {
    if fraction <= 0.0 || !fraction.is_finite() {
        return None;
    }
    let fraction = fraction.min(1.0);
    Some(elapsed.mul_f64((1.0 - fraction) / fraction))
}

/// Internal helper that tracks timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    duration: Option<Duration>,
    state: ProgressState,
    start_time: Instant,
    position: Duration,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, duration: Option<Duration>) -> Self {
        Self {
            callback,
            duration,
            state: ProgressState::new(),
            start_time: Instant::now(),
            position: Duration::ZERO,
        }
    }

    /// Record the timestamp of the latest read, in microseconds.
    pub(crate) fn advance(&mut self, timestamp: i64) {
        let Ok(micros) = u64::try_from(timestamp) else {
            return;
        };
        let position = Duration::from_micros(micros);
        if position > self.position {
            self.position = position;
        }

        let Some(duration) = self.duration else {
            return;
        };
        if let Some((percent, steps)) = self.state.update(self.position, duration) {
            let elapsed = self.start_time.elapsed();
            let fraction = self.position.as_secs_f64() / duration.as_secs_f64();
            self.callback.on_progress(&ProgressInfo {
                percent,
                steps,
                position: self.position,
                duration: self.duration,
                elapsed,
                estimated_remaining: estimate_remaining(elapsed, fraction),
                finished: false,
            });
        }
    }

    /// Unconditionally emit the final report.
    pub(crate) fn finish(&mut self) -> Duration {
        let elapsed = self.start_time.elapsed();
        self.state.last_percent = Some(100);
        self.state.last_steps = BAR_STEPS;
        self.callback.on_progress(&ProgressInfo {
            percent: 100,
            steps: BAR_STEPS,
            position: self.position,
            duration: self.duration,
            elapsed,
            estimated_remaining: Some(Duration::ZERO),
            finished: true,
        });
        elapsed
    }
}
