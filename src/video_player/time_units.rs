// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion utilities for video playback.
//!
//! Positions, durations and clock anchors are shared between threads as
//! integer microseconds so they fit in atomics. These helpers do the
//! conversions.
//!
//! # Constants
//!
//! - `MICROS_PER_SECOND`: 1,000,000 (f64 for calculations)

/// Microseconds per second as f64 for calculations.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Converts seconds to signed microseconds, rounding to nearest.
///
/// Non-finite input maps to 0; values beyond `i64` saturate.
///
/// # Examples
///
/// ```
/// use frame_pacer::video_player::time_units::secs_to_micros;
///
/// assert_eq!(secs_to_micros(1.0), 1_000_000);
/// assert_eq!(secs_to_micros(-0.5), -500_000);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation)] // `as` saturates for out-of-range floats
pub fn secs_to_micros(secs: f64) -> i64 {
    if secs.is_finite() {
        (secs * MICROS_PER_SECOND).round() as i64
    } else {
        0
    }
}

/// Converts non-negative seconds to unsigned microseconds.
///
/// Negative and non-finite values map to 0.
///
/// # Examples
///
/// ```
/// use frame_pacer::video_player::time_units::secs_to_micros_unsigned;
///
/// assert_eq!(secs_to_micros_unsigned(2.5), 2_500_000);
/// assert_eq!(secs_to_micros_unsigned(-1.0), 0);
/// ```
#[inline]
#[allow(clippy::cast_sign_loss)]
pub fn secs_to_micros_unsigned(secs: f64) -> u64 {
    secs_to_micros(secs).max(0) as u64
}

/// Converts signed microseconds to seconds.
///
/// # Examples
///
/// ```
/// use frame_pacer::video_player::time_units::micros_to_secs;
///
/// assert_eq!(micros_to_secs(1_000_000), 1.0);
/// assert_eq!(micros_to_secs(500_000), 0.5);
/// ```
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

/// Converts unsigned microseconds to seconds.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn unsigned_micros_to_secs(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}
