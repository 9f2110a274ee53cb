// SPDX-License-Identifier: MPL-2.0
//! Playback lifecycle states.
//!
//! [`StopMode`] describes how the quit signal was raised;
//! [`OverflowPolicy`] selects what the frame queue does when it is full.

use serde::{Deserialize, Serialize};

/// How playback is being stopped.
///
/// Quit is a single idempotent signal; the mode only tells the render
/// worker whether frames already queued should still be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StopMode {
    /// Playback is running.
    #[default]
    Running = 0,
    /// The producer is done: present what is queued, then exit.
    Drain = 1,
    /// Stop every worker at its next suspension point.
    Immediate = 2,
}

impl StopMode {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Drain,
            _ => Self::Immediate,
        }
    }

    /// Returns true once quit has been raised in any mode.
    #[must_use]
    pub fn is_quit(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if workers must stop without draining.
    #[must_use]
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::Immediate)
    }
}

/// Behaviour of the frame queue when a push finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Suspend the producer until a slot frees (backpressure).
    #[default]
    Block,
    /// Evict the oldest queued frame to admit the new one.
    DropOldest,
}
