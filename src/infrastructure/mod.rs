// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! This module contains concrete implementations of the port traits defined in
//! `application::port`. These adapters wrap external dependencies like `FFmpeg`.
//!
//! # Available Adapters
//!
//! - [`ffmpeg`]: Video demuxing and decoding via `FFmpeg` (implements
//!   [`FrameSource`]); requires the `ffmpeg` feature
//!
//! [`FrameSource`]: crate::application::port::FrameSource

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;
