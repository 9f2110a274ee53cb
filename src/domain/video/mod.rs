// SPDX-License-Identifier: MPL-2.0
//! Video playback domain types.
//!
//! This module contains frame and playback value objects that are
//! independent of any decoder or presentation backend.

pub mod frame;
pub mod newtypes;
pub mod playback;

// Re-export commonly used types
pub use frame::{DecodedFrame, DeviceSurface, FrameOrigin, FramePixels, HostPixels, PixelFormat};
pub use newtypes::{PlaybackSpeed, QueueCapacity, SpeedRange};
pub use playback::{OverflowPolicy, StopMode};
