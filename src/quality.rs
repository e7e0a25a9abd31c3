//! Encoder quality estimation.
//!
//! The encoders expose a "quality vs. speed" knob in `[1, 100]`. This module
//! estimates a value for it from how efficiently the source was already
//! compressed: a source with few bytes per pixel leaves little redundancy,
//! so a slower, higher-complexity encode is needed to avoid visible loss.
//!
//! The calibration comes from reference H.264 encodes of real videos and is
//! empirical. [`CALIBRATION_K`] and [`FALLBACK_COMPLEXITY`] are tunable.
//!
//! # Example
//!
//! ```
//! use vtranscode::quality::complexity_from_rate_per_pixel;
//!
//! // 1280x720 at 4 Mbit/s, targeting half the source data rate.
//! let rate_per_pixel = (4_000_000.0 / 8.0) / (1280.0 * 720.0);
//! assert_eq!(complexity_from_rate_per_pixel(rate_per_pixel, 0.5), 83);
//! ```

use crate::{configuration::TargetFactor, descriptor::StreamDescriptor, media_type::MediaKind};

/// Calibration constant relating target factor and bytes per pixel to
/// encoder complexity.
pub const CALIBRATION_K: f64 = 17.0;

/// Baseline complexity every video encode starts from.
pub const BASE_COMPLEXITY: f64 = 67.0;

/// Complexity used when the source data rate per pixel is unknown.
pub const FALLBACK_COMPLEXITY: u32 = 80;

/// Quality vs. speed value for audio encoders.
pub const AUDIO_QUALITY_VS_SPEED: u32 = 80;

/// Average audio data rates (bytes per second) the AAC encoder accepts.
pub const AUDIO_BYTE_RATE_LADDER: [u32; 4] = [12_000, 16_000, 20_000, 24_000];

/// Source data rate in bytes per second per pixel of a video stream.
///
/// Returns `0.0` for non-video descriptors or a zero frame area.
pub fn rate_per_pixel(descriptor: &StreamDescriptor) -> f64 {
    let area = descriptor.frame_area();
    if area == 0 {
        return 0.0;
    }
    f64::from(descriptor.original_byte_rate()) / area as f64
}

/// Map a source bytes-per-pixel figure and a target factor to a
/// complexity value in `[1, 100]`.
///
/// Non-positive `rate_per_pixel` yields [`FALLBACK_COMPLEXITY`].
pub fn complexity_from_rate_per_pixel(rate_per_pixel: f64, target_factor: f64) -> u32 {
    if rate_per_pixel <= 0.0 || !rate_per_pixel.is_finite() {
        return FALLBACK_COMPLEXITY;
    }

    let estimate = (BASE_COMPLEXITY + target_factor * CALIBRATION_K / rate_per_pixel).round();
    estimate.clamp(1.0, 100.0) as u32
}

/// Estimate the quality vs. speed parameter for a stream.
///
/// Video streams use [`complexity_from_rate_per_pixel`]; audio streams get
/// the fixed [`AUDIO_QUALITY_VS_SPEED`].
pub fn estimate_complexity(descriptor: &StreamDescriptor, target: TargetFactor) -> u32 {
    match descriptor.kind {
        MediaKind::Video => complexity_from_rate_per_pixel(rate_per_pixel(descriptor), target.get()),
        MediaKind::Audio => AUDIO_QUALITY_VS_SPEED,
        MediaKind::Other => FALLBACK_COMPLEXITY,
    }
}

/// Pick the average audio byte rate for the encoder from
/// [`AUDIO_BYTE_RATE_LADDER`].
///
/// Chooses the rung at or below the source rate. A source matching a rung
/// exactly keeps it only up to 16 kB/s; above that the next lower rung is
/// used. Sources below the lowest rung get the lowest rung.
pub fn audio_target_byte_rate(source_bytes_per_second: u32) -> u32 {
    let ladder = &AUDIO_BYTE_RATE_LADDER;
    let position = ladder.partition_point(|&rung| rung < source_bytes_per_second);

    if position == 0 {
        return ladder[0];
    }

    match ladder.get(position) {
        Some(&rung) if rung == source_bytes_per_second && rung <= 16_000 => rung,
        _ => ladder[position - 1],
    }
}
