// SPDX-License-Identifier: MPL-2.0
//! Paced playback engine.
//!
//! A decode worker pulls frames from a [`FrameSource`](crate::application::port::FrameSource),
//! normalizes them and feeds a bounded [`FrameQueue`]. A render worker pops
//! them, waits on the [`PlaybackClock`] and hands them to a
//! [`FrameSink`](crate::application::port::FrameSink). Both run on their
//! own threads and coordinate through the atomic [`PlaybackState`].

pub mod control;
pub mod conversion;
pub mod decoder;
pub mod frame_queue;
pub mod normalizer;
pub mod pipeline;
pub mod renderer;
pub mod state;
pub mod sync;
pub mod time_units;

pub use control::PlaybackControl;
pub use conversion::ConversionContext;
pub use decoder::{DecodeOutcome, DecodeWorker};
pub use frame_queue::{FrameQueue, PushOutcome};
pub use normalizer::{CanonicalLayout, FrameNormalizer, NormalizerStats};
pub use pipeline::{Pipeline, PlaybackSummary};
pub use renderer::{RenderOutcome, RenderWorker};
pub use state::{PlaybackState, PlaybackStats};
pub use sync::{PacingOutcome, PlaybackClock, SharedPlaybackClock};

use crate::error::VideoError;

/// How a worker thread ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// Ran to its natural end (end of stream, or queue drained after it).
    Finished,
    /// Stopped by quit.
    Cancelled,
    /// Stopped by a fatal error.
    Failed(VideoError),
}
