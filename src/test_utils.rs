// SPDX-License-Identifier: MPL-2.0
//! Test utilities for float comparisons and other common test helpers.
//!
//! This module re-exports the `approx` crate's assertion macros for float comparison,
//! and provides a scripted frame source and a recording sink for worker tests.

// Re-export approx macros for convenient use in tests
pub use approx::assert_abs_diff_eq;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::application::port::{FrameSource, SourceRead};
use crate::domain::video::{DecodedFrame, PixelFormat};
use crate::error::VideoError;

/// Builds a 2x2 RGBA frame whose first byte carries `tag`.
pub fn rgba_frame(tag: u8, pts_secs: f64) -> DecodedFrame {
    let mut data = vec![0; PixelFormat::Rgba.buffer_size(2, 2)];
    data[0] = tag;
    DecodedFrame::from_host(data, PixelFormat::Rgba, 2, 2, pts_secs)
}

/// Source emitting `frames` units, one frame each, spaced by `interval`.
#[derive(Debug)]
pub struct ScriptedSource {
    frames: u8,
    interval: f64,
    next: u8,
    pub seeks: u32,
    pub fail_seek: bool,
    pub fail_decode_at: Option<u8>,
    /// Unit whose decode reports a recoverable error.
    pub skip_unit_at: Option<u8>,
}

impl ScriptedSource {
    pub fn new(frames: u8, interval: f64) -> Self {
        Self {
            frames,
            interval,
            next: 0,
            seeks: 0,
            fail_seek: false,
            fail_decode_at: None,
            skip_unit_at: None,
        }
    }
}

impl FrameSource for ScriptedSource {
    type Unit = u8;

    fn next_unit(&mut self) -> Result<SourceRead<u8>, VideoError> {
        if self.next >= self.frames {
            return Ok(SourceRead::EndOfStream);
        }
        let unit = self.next;
        self.next += 1;
        Ok(SourceRead::Unit(unit))
    }

    fn decode(&mut self, unit: u8) -> Result<Vec<DecodedFrame>, VideoError> {
        if self.fail_decode_at == Some(unit) {
            return Err(VideoError::DecodingFailed(format!("bad packet {unit}")));
        }
        if self.skip_unit_at == Some(unit) {
            return Err(VideoError::ConversionFailed(format!("garbled packet {unit}")));
        }
        Ok(vec![rgba_frame(unit, f64::from(unit) * self.interval)])
    }

    fn seek(&mut self, position: Duration) -> Result<(), VideoError> {
        if self.fail_seek {
            return Err(VideoError::SeekFailed("not seekable".to_string()));
        }
        self.seeks += 1;
        self.next = (position.as_secs_f64() / self.interval) as u8;
        Ok(())
    }

    fn flush(&mut self) {}

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(f64::from(self.frames) * self.interval))
    }
}

/// Presented frames as `(tag, pts, segment)`.
pub type Presented = Arc<Mutex<Vec<(u8, f64, u64)>>>;

/// Sink recording what it is handed.
pub fn recording_sink(
    presented: &Presented,
) -> impl FnMut(DecodedFrame) -> Result<(), VideoError> + Send + 'static {
    let presented = Arc::clone(presented);
    move |frame: DecodedFrame| {
        let tag = frame.data().map_or(0, |data| data[0]);
        presented
            .lock()
            .push((tag, frame.pts_secs(), frame.segment()));
        Ok(())
    }
}
