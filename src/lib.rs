// SPDX-License-Identifier: MPL-2.0
//! `frame_pacer` delivers decoded video frames to a consumer at a steady,
//! wall-clock-paced rate.
//!
//! A decode worker pulls frames from a [`FrameSource`], normalizes them into
//! one canonical pixel layout and queues them in a bounded
//! [`FrameQueue`](video_player::FrameQueue). A render worker pops them,
//! waits for each frame's presentation instant on the
//! [`PlaybackClock`](video_player::PlaybackClock) and hands it to a
//! [`FrameSink`]. Pause, speed changes, looping and quit are driven through
//! a [`PlaybackControl`](video_player::PlaybackControl) handle.
//!
//! ```no_run
//! use frame_pacer::config::PipelineConfig;
//! use frame_pacer::domain::video::DecodedFrame;
//! use frame_pacer::error::VideoError;
//! use frame_pacer::video_player::Pipeline;
//! # fn run(source: impl frame_pacer::application::port::FrameSource + 'static) -> frame_pacer::error::Result<()> {
//! let sink = |frame: DecodedFrame| -> Result<(), VideoError> {
//!     println!("frame at {:.3}s", frame.pts_secs());
//!     Ok(())
//! };
//! let pipeline = Pipeline::start(&PipelineConfig::default(), source, sink)?;
//! pipeline.control().set_speed(2.0);
//! let summary = pipeline.join()?;
//! println!("{}", summary.stats);
//! # Ok(())
//! # }
//! ```
//!
//! [`FrameSource`]: application::port::FrameSource
//! [`FrameSink`]: application::port::FrameSink

#![doc(html_root_url = "https://docs.rs/frame_pacer/0.1.0")]

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod video_player;

#[cfg(test)]
pub(crate) mod test_utils;
