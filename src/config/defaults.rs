// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the pipeline. Constants are organized by category.
//!
//! # Categories
//!
//! - **Queue**: Frame queue capacity bounds
//! - **Layout**: Canonical frame size bound
//! - **Speed**: Playback speed range and step
//! - **Polling**: Cooperative wait intervals of the workers

use std::time::Duration;

// ==========================================================================
// Queue Defaults
// ==========================================================================

/// Default number of frames buffered between decoder and renderer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Minimum queue capacity.
pub const MIN_QUEUE_CAPACITY: usize = 1;

/// Maximum queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = 1024;

// ==========================================================================
// Layout Defaults
// ==========================================================================

/// Largest width or height accepted for a fixed canonical frame size.
pub const MAX_CANONICAL_DIMENSION: u32 = 16_384;

// ==========================================================================
// Speed Defaults
// ==========================================================================

/// Default playback speed (1.0 = normal speed).
pub const DEFAULT_PLAYBACK_SPEED: f64 = 1.0;

/// Default lower speed bound.
pub const DEFAULT_MIN_PLAYBACK_SPEED: f64 = 0.25;

/// Default upper speed bound.
pub const DEFAULT_MAX_PLAYBACK_SPEED: f64 = 4.0;

/// Default increment used by speed up / slow down controls.
pub const DEFAULT_SPEED_STEP: f64 = 0.25;

// ==========================================================================
// Polling Defaults
// ==========================================================================

/// How often paused workers re-check the pause and quit flags.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest uninterrupted slice of any blocking wait before quit is re-checked.
pub const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded wait used by the render worker when popping frames.
pub const RENDER_POP_TIMEOUT: Duration = Duration::from_millis(10);

/// Number of presented frames between two progress log lines.
pub const PROGRESS_LOG_EVERY_FRAMES: u64 = 30;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Queue validation
    assert!(MIN_QUEUE_CAPACITY > 0);
    assert!(MAX_QUEUE_CAPACITY >= MIN_QUEUE_CAPACITY);
    assert!(DEFAULT_QUEUE_CAPACITY >= MIN_QUEUE_CAPACITY);
    assert!(DEFAULT_QUEUE_CAPACITY <= MAX_QUEUE_CAPACITY);

    // Layout validation
    assert!(MAX_CANONICAL_DIMENSION > 0);
    assert!((MAX_CANONICAL_DIMENSION as u64) * (MAX_CANONICAL_DIMENSION as u64) <= u32::MAX as u64);

    // Speed validation
    assert!(DEFAULT_MIN_PLAYBACK_SPEED > 0.0);
    assert!(DEFAULT_MAX_PLAYBACK_SPEED > DEFAULT_MIN_PLAYBACK_SPEED);
    assert!(DEFAULT_PLAYBACK_SPEED >= DEFAULT_MIN_PLAYBACK_SPEED);
    assert!(DEFAULT_PLAYBACK_SPEED <= DEFAULT_MAX_PLAYBACK_SPEED);
    assert!(DEFAULT_SPEED_STEP > 0.0);

    // Progress validation
    assert!(PROGRESS_LOG_EVERY_FRAMES > 0);
};
