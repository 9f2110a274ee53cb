// SPDX-License-Identifier: MPL-2.0
//! Frame source and sink port definitions.
//!
//! This module defines the [`FrameSource`] trait the decode worker pulls
//! from and the [`FrameSink`] trait the render worker presents to.
//! Infrastructure adapters (like `FFmpeg`) implement them.
//!
//! # Design Notes
//!
//! - Sources are **stateful** - they own the demuxer and decoder contexts
//! - Methods are not `async` - each worker drives its collaborator from a
//!   dedicated thread
//! - Uses domain types only (`DecodedFrame`, `VideoError`)

use std::time::Duration;

use crate::domain::video::DecodedFrame;
use crate::error::VideoError;

// =============================================================================
// FrameSource Trait
// =============================================================================

/// Result of pulling from a source.
#[derive(Debug)]
pub enum SourceRead<U> {
    /// A compressed unit ready for decoding.
    Unit(U),
    /// No more input.
    EndOfStream,
}

/// Port for demuxing and decoding.
///
/// # Thread Safety
///
/// Implementations must be `Send`: the source is moved onto the decode
/// thread when playback starts and used exclusively from there.
///
/// # Lifecycle
///
/// 1. Open the source (adapter specific; failures abort pipeline setup)
/// 2. `next_unit()` / `decode()` until `EndOfStream`
/// 3. `end_of_input()` to collect frames still buffered in the decoder
/// 4. For looping: `flush()` then `seek(Duration::ZERO)`, and back to 2
///
/// # Example
///
/// ```ignore
/// use frame_pacer::application::port::{FrameSource, SourceRead};
///
/// fn count_frames(source: &mut impl FrameSource) -> usize {
///     let mut count = 0;
///     while let Ok(SourceRead::Unit(unit)) = source.next_unit() {
///         count += source.decode(unit).map(|frames| frames.len()).unwrap_or(0);
///     }
///     count
/// }
/// ```
pub trait FrameSource: Send {
    /// Compressed unit type (a packet, a NAL unit, ...).
    type Unit: Send;

    /// Reads the next compressed unit.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] on unrecoverable read failures.
    fn next_unit(&mut self) -> Result<SourceRead<Self::Unit>, VideoError>;

    /// Decodes one unit into zero or more frames.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if decoding fails hard.
    fn decode(&mut self, unit: Self::Unit) -> Result<Vec<DecodedFrame>, VideoError>;

    /// Repositions the source.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if the seek operation fails.
    fn seek(&mut self, position: Duration) -> Result<(), VideoError>;

    /// Discards any state buffered inside the decoder.
    fn flush(&mut self);

    /// Frames still buffered inside the decoder once input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if draining the decoder fails.
    fn end_of_input(&mut self) -> Result<Vec<DecodedFrame>, VideoError> {
        Ok(Vec::new())
    }

    /// Total stream duration, if known.
    fn duration(&self) -> Option<Duration> {
        None
    }
}

// =============================================================================
// FrameSink Trait
// =============================================================================

/// Port for whatever consumes paced frames (display, encoder, writer).
pub trait FrameSink: Send {
    /// Takes ownership of a frame that is due now.
    ///
    /// Returns once the frame is safe to release.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if the sink can no longer accept frames.
    fn present(&mut self, frame: DecodedFrame) -> Result<(), VideoError>;
}

impl<F> FrameSink for F
where
    F: FnMut(DecodedFrame) -> Result<(), VideoError> + Send,
{
    fn present(&mut self, frame: DecodedFrame) -> Result<(), VideoError> {
        self(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::video::PixelFormat;

    // Mock implementation for testing
    struct MockSource {
        remaining: u32,
        position: Duration,
    }

    impl FrameSource for MockSource {
        type Unit = u32;

        fn next_unit(&mut self) -> Result<SourceRead<u32>, VideoError> {
            if self.remaining == 0 {
                return Ok(SourceRead::EndOfStream);
            }
            self.remaining -= 1;
            Ok(SourceRead::Unit(self.remaining))
        }

        fn decode(&mut self, unit: u32) -> Result<Vec<DecodedFrame>, VideoError> {
            Ok(vec![DecodedFrame::from_host(
                vec![0; 4],
                PixelFormat::Rgba,
                1,
                1,
                f64::from(unit),
            )])
        }

        fn seek(&mut self, position: Duration) -> Result<(), VideoError> {
            self.position = position;
            Ok(())
        }

        fn flush(&mut self) {}
    }

    #[test]
    fn mock_source_lifecycle() {
        let mut source = MockSource {
            remaining: 3,
            position: Duration::from_secs(1),
        };

        let mut frames = Vec::new();
        while let SourceRead::Unit(unit) = source.next_unit().unwrap() {
            frames.extend(source.decode(unit).unwrap());
        }
        assert_eq!(frames.len(), 3);
        assert!(source.end_of_input().unwrap().is_empty());
        assert_eq!(source.duration(), None);

        source.seek(Duration::ZERO).unwrap();
        assert_eq!(source.position, Duration::ZERO);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = 0;
        {
            let mut sink = |frame: DecodedFrame| {
                seen += frame.size_bytes();
                Ok(())
            };
            let frame = DecodedFrame::from_host(vec![0; 4], PixelFormat::Rgba, 1, 1, 0.0);
            sink.present(frame).unwrap();
        }
        assert_eq!(seen, 4);
    }
}
