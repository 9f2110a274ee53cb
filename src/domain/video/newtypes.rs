// SPDX-License-Identifier: MPL-2.0
//! Video playback newtypes.
//!
//! This module provides type-safe wrappers for playback values,
//! ensuring they are always within valid ranges.

use crate::config::defaults::{
    DEFAULT_MAX_PLAYBACK_SPEED, DEFAULT_MIN_PLAYBACK_SPEED, DEFAULT_PLAYBACK_SPEED,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SPEED_STEP, MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY,
};

// =============================================================================
// SpeedRange
// =============================================================================

/// Inclusive bounds and step for playback speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedRange {
    min: f64,
    max: f64,
    step: f64,
}

impl SpeedRange {
    /// Creates a speed range.
    ///
    /// Returns `None` unless `0 < min <= max` and `step > 0`, all finite.
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Option<Self> {
        let valid = min.is_finite()
            && max.is_finite()
            && step.is_finite()
            && min > 0.0
            && min <= max
            && step > 0.0;
        valid.then_some(Self { min, max, step })
    }

    #[must_use]
    pub fn min(self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn step(self) -> f64 {
        self.step
    }

    /// Clamps a raw speed into this range. Non-finite input maps to 1.0
    /// (itself clamped).
    #[must_use]
    pub fn clamp(self, speed: f64) -> PlaybackSpeed {
        let speed = if speed.is_finite() {
            speed
        } else {
            DEFAULT_PLAYBACK_SPEED
        };
        PlaybackSpeed(speed.clamp(self.min, self.max))
    }
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PLAYBACK_SPEED,
            max: DEFAULT_MAX_PLAYBACK_SPEED,
            step: DEFAULT_SPEED_STEP,
        }
    }
}

// =============================================================================
// PlaybackSpeed
// =============================================================================

/// Playback speed multiplier, guaranteed to be positive and finite.
///
/// Values are produced through a [`SpeedRange`], which keeps them inside the
/// configured bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSpeed(f64);

impl PlaybackSpeed {
    /// Returns the speed value as f64.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Returns the speed one step faster, clamped to the range.
    #[must_use]
    pub fn increase(self, range: SpeedRange) -> Self {
        range.clamp(self.0 + range.step)
    }

    /// Returns the speed one step slower, clamped to the range.
    #[must_use]
    pub fn decrease(self, range: SpeedRange) -> Self {
        range.clamp(self.0 - range.step)
    }

    /// Returns true if this is the minimum speed of the range.
    #[must_use]
    pub fn is_min(self, range: SpeedRange) -> bool {
        (self.0 - range.min).abs() < 0.001
    }

    /// Returns true if this is the maximum speed of the range.
    #[must_use]
    pub fn is_max(self, range: SpeedRange) -> bool {
        (self.0 - range.max).abs() < 0.001
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self(DEFAULT_PLAYBACK_SPEED)
    }
}

// =============================================================================
// QueueCapacity
// =============================================================================

/// Number of frames the queue may hold, guaranteed to be within bounds.
///
/// # Example
///
/// ```
/// use frame_pacer::domain::video::QueueCapacity;
///
/// assert_eq!(QueueCapacity::new(4).value(), 4);
/// // Zero is clamped to the minimum
/// assert_eq!(QueueCapacity::new(0).value(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCapacity(usize);

impl QueueCapacity {
    /// Creates a new capacity, clamping to valid range.
    #[must_use]
    pub fn new(value: usize) -> Self {
        Self(value.clamp(MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY))
    }

    /// Returns the value as usize.
    #[must_use]
    pub fn value(self) -> usize {
        self.0
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        Self(DEFAULT_QUEUE_CAPACITY)
    }
}
