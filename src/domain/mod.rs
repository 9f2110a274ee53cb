// SPDX-License-Identifier: MPL-2.0
//! Domain layer - frames, pixel layouts and playback value objects.
//!
//! Types here carry no threading or backend concerns; the only external
//! crate they touch is `serde`, for the layout and policy names that appear
//! in configuration files.
//!
//! # Modules
//!
//! - [`video`]: Video playback types ([`DecodedFrame`](video::DecodedFrame),
//!   [`PixelFormat`](video::PixelFormat), [`PlaybackSpeed`](video::PlaybackSpeed),
//!   [`OverflowPolicy`](video::OverflowPolicy))

pub mod video;
