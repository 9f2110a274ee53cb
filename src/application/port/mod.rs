// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! This module defines abstract interfaces that infrastructure adapters implement.
//! These traits use only domain types, ensuring the pipeline remains
//! independent of concrete decoders and outputs.
//!
//! # Available Ports
//!
//! - [`video`]: Frame sources (demux + decode) and frame sinks
//!
//! # Design Notes
//!
//! - All traits use domain types only (no `FFmpeg` types)
//! - Traits are `Send` so collaborators can move onto worker threads
//! - Methods return `Result` with [`VideoError`](crate::error::VideoError)

pub mod video;

// Re-export main types for convenience
pub use video::{FrameSink, FrameSource, SourceRead};
