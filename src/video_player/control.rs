// SPDX-License-Identifier: MPL-2.0
//! Controller-facing handle on a running pipeline.

use std::sync::Arc;

use crate::domain::video::{PlaybackSpeed, StopMode};
use crate::error::VideoError;

use super::frame_queue::FrameQueue;
use super::state::{PlaybackState, PlaybackStats};
use super::sync::PlaybackClock;

/// Cloneable control plane handle.
///
/// Every method is non-blocking. Mutations that a blocked worker has to
/// react to (pause, resume, speed, quit) also wake the queue and the clock
/// so the change is observed promptly.
#[derive(Debug, Clone)]
pub struct PlaybackControl {
    state: Arc<PlaybackState>,
    queue: Arc<FrameQueue>,
    clock: Arc<PlaybackClock>,
}

impl PlaybackControl {
    pub(crate) fn new(
        state: Arc<PlaybackState>,
        queue: Arc<FrameQueue>,
        clock: Arc<PlaybackClock>,
    ) -> Self {
        Self {
            state,
            queue,
            clock,
        }
    }

    pub fn pause(&self) {
        if !self.state.set_paused(true) {
            tracing::info!(position_secs = self.state.position_secs(), "paused");
            self.wake();
        }
    }

    pub fn resume(&self) {
        if self.state.set_paused(false) {
            tracing::info!(position_secs = self.state.position_secs(), "resumed");
            self.wake();
        }
    }

    /// Flips pause, returning true if playback is now paused.
    pub fn toggle_pause(&self) -> bool {
        let paused = self.state.toggle_paused();
        tracing::info!(paused, "pause toggled");
        self.wake();
        paused
    }

    /// Sets the speed multiplier, clamped to the configured range.
    ///
    /// Returns the speed actually applied.
    pub fn set_speed(&self, speed: f64) -> PlaybackSpeed {
        let applied = self.state.set_speed(speed);
        tracing::info!(requested = speed, applied = applied.value(), "speed changed");
        self.wake();
        applied
    }

    /// Raises the speed by one step.
    pub fn speed_up(&self) -> PlaybackSpeed {
        let applied = self.state.update_speed(PlaybackSpeed::increase);
        tracing::info!(speed = applied.value(), "speed up");
        self.wake();
        applied
    }

    /// Lowers the speed by one step.
    pub fn slow_down(&self) -> PlaybackSpeed {
        let applied = self.state.update_speed(PlaybackSpeed::decrease);
        tracing::info!(speed = applied.value(), "slow down");
        self.wake();
        applied
    }

    /// Stops both workers at their next suspension point. Idempotent.
    pub fn quit(&self) {
        if self.state.request_quit(StopMode::Immediate) {
            tracing::info!("quit requested");
        }
        self.wake();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    #[must_use]
    pub fn speed(&self) -> PlaybackSpeed {
        self.state.speed()
    }

    #[must_use]
    pub fn stop_mode(&self) -> StopMode {
        self.state.stop_mode()
    }

    #[must_use]
    pub fn stats(&self) -> PlaybackStats {
        self.state
            .snapshot(self.queue.len(), self.queue.capacity())
    }

    /// The first fatal error raised by a worker, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<VideoError> {
        self.state.last_error()
    }

    /// Returns true once quit is raised and both workers have exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_quit() && self.state.active_workers() == 0
    }

    pub(crate) fn state(&self) -> &Arc<PlaybackState> {
        &self.state
    }

    pub(crate) fn wake(&self) {
        self.queue.wake_all();
        self.clock.wake_all();
    }
}
