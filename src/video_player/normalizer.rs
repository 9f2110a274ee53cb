// SPDX-License-Identifier: MPL-2.0
//! Frame normalization into the canonical pipeline layout.
//!
//! Decoders may hand out frames in host or foreign memory and in any of the
//! supported pixel layouts. The [`FrameNormalizer`] makes every frame look
//! the same before it is queued:
//!
//! 1. Foreign-resident frames are downloaded into host memory.
//! 2. Frames already in the canonical layout and size are moved through.
//! 3. Everything else is converted with a cached [`ConversionContext`],
//!    rebuilt only when the source format or size changes.
//!
//! Failures only cost the frame at hand: it is released, the failure is
//! logged and counted, and `normalize` returns `None`.

use crate::domain::video::{DecodedFrame, PixelFormat};
use crate::error::VideoError;

use super::conversion::ConversionContext;

/// Target layout every frame is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalLayout {
    format: PixelFormat,
    size: Option<(u32, u32)>,
}

impl CanonicalLayout {
    /// Creates a layout. With `size` unset, frames keep their decoded size.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::UnsupportedFormat`] for planar formats and
    /// [`VideoError::ConversionFailed`] for a zero dimension.
    pub fn new(format: PixelFormat, size: Option<(u32, u32)>) -> Result<Self, VideoError> {
        if !format.is_packed() {
            return Err(VideoError::UnsupportedFormat);
        }
        if let Some((width, height)) = size {
            if width == 0 || height == 0 {
                return Err(VideoError::ConversionFailed(format!(
                    "canonical size {width}x{height} is empty"
                )));
            }
        }
        Ok(Self { format, size })
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Output size for a frame decoded at `width` x `height`.
    #[must_use]
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        self.size.unwrap_or((width, height))
    }
}

impl Default for CanonicalLayout {
    fn default() -> Self {
        Self {
            format: PixelFormat::Rgba,
            size: None,
        }
    }
}

/// Counters kept by a normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizerStats {
    /// Frames moved through without conversion.
    pub passthrough: u64,
    /// Frames downloaded from foreign memory.
    pub transferred: u64,
    pub converted: u64,
    pub failed: u64,
    pub context_rebuilds: u64,
}

/// Converts decoded frames into the canonical layout.
///
/// Owned by the decode worker; the cached conversion context lives as long
/// as the normalizer.
#[derive(Debug, Default)]
pub struct FrameNormalizer {
    layout: CanonicalLayout,
    context: Option<ConversionContext>,
    stats: NormalizerStats,
}

impl FrameNormalizer {
    #[must_use]
    pub fn new(layout: CanonicalLayout) -> Self {
        Self {
            layout,
            context: None,
            stats: NormalizerStats::default(),
        }
    }

    #[must_use]
    pub fn layout(&self) -> CanonicalLayout {
        self.layout
    }

    #[must_use]
    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    /// The conversion context built for the most recent converted frame.
    #[must_use]
    pub fn context(&self) -> Option<&ConversionContext> {
        self.context.as_ref()
    }

    /// Returns the frame in canonical form, or `None` if it had to be dropped.
    pub fn normalize(&mut self, frame: DecodedFrame) -> Option<DecodedFrame> {
        let pts = frame.pts_secs();
        match self.try_normalize(frame) {
            Ok(frame) => Some(frame),
            Err(err) => {
                self.stats.failed += 1;
                tracing::warn!(pts, error = %err, "dropping frame that could not be normalized");
                None
            }
        }
    }

    fn try_normalize(&mut self, frame: DecodedFrame) -> Result<DecodedFrame, VideoError> {
        let frame = if frame.is_host_resident() {
            frame
        } else {
            let host = frame.into_host()?;
            self.stats.transferred += 1;
            host
        };

        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Err(VideoError::ConversionFailed(format!(
                "empty frame {width}x{height}"
            )));
        }

        let format = frame.format();
        let (target_width, target_height) = self.layout.target_size(width, height);
        if format == self.layout.format && (width, height) == (target_width, target_height) {
            let expected = format.buffer_size(width, height);
            if frame.size_bytes() != expected {
                return Err(VideoError::ConversionFailed(format!(
                    "{format} {width}x{height} buffer has {} bytes, expected {expected}",
                    frame.size_bytes()
                )));
            }
            self.stats.passthrough += 1;
            return Ok(frame);
        }

        let context = self.context_for(format, width, height)?;
        let data = frame
            .data()
            .ok_or_else(|| VideoError::TransferFailed("frame is not host resident".to_string()))?;
        let converted = context.convert(data)?;
        let (target_format, target_width, target_height) = context.target();
        let out = frame.with_pixels(converted, target_format, target_width, target_height);
        self.stats.converted += 1;
        Ok(out)
    }

    fn context_for(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<&ConversionContext, VideoError> {
        let reusable = self
            .context
            .as_ref()
            .is_some_and(|context| context.matches(format, width, height));
        if !reusable {
            let (target_width, target_height) = self.layout.target_size(width, height);
            let context = ConversionContext::new(
                format,
                width,
                height,
                self.layout.format,
                target_width,
                target_height,
            )?;
            tracing::debug!(
                %format,
                width,
                height,
                target = %self.layout.format,
                target_width,
                target_height,
                "rebuilt conversion context"
            );
            self.stats.context_rebuilds += 1;
            self.context = Some(context);
        }
        self.context
            .as_ref()
            .ok_or_else(|| VideoError::ConversionFailed("no conversion context".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::video::{DeviceSurface, FrameOrigin, HostPixels};

    #[derive(Debug)]
    struct Surface {
        format: PixelFormat,
        data: Option<Vec<u8>>,
    }

    impl DeviceSurface for Surface {
        fn host_format(&self) -> PixelFormat {
            self.format
        }

        fn download(self: Box<Self>) -> Result<HostPixels, VideoError> {
            match self.data {
                Some(data) => Ok(HostPixels {
                    format: self.format,
                    data,
                }),
                None => Err(VideoError::TransferFailed("device lost".to_string())),
            }
        }
    }

    fn frame(format: PixelFormat, width: u32, height: u32, pts: f64) -> DecodedFrame {
        DecodedFrame::from_host(
            vec![128; format.buffer_size(width, height)],
            format,
            width,
            height,
            pts,
        )
    }

    #[test]
    fn canonical_frame_passes_through_untouched() {
        let mut normalizer = FrameNormalizer::default();
        let input = DecodedFrame::from_host(vec![1, 2, 3, 4], PixelFormat::Rgba, 1, 1, 0.5);

        let out = normalizer.normalize(input).unwrap();
        assert_eq!(out.data(), Some(&[1, 2, 3, 4][..]));
        assert_eq!(out.pts_secs(), 0.5);
        assert_eq!(normalizer.stats().passthrough, 1);
        assert!(normalizer.context().is_none());
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut normalizer = FrameNormalizer::default();
        let once = normalizer.normalize(frame(PixelFormat::Nv12, 4, 4, 1.0)).unwrap();
        let once_data = once.data().map(<[u8]>::to_vec);
        let twice = normalizer.normalize(once).unwrap();

        assert_eq!(twice.data().map(<[u8]>::to_vec), once_data);
        assert_eq!(twice.format(), PixelFormat::Rgba);
        let stats = normalizer.stats();
        assert_eq!((stats.converted, stats.passthrough), (1, 1));
    }

    #[test]
    fn context_is_reused_until_source_changes() {
        let mut normalizer = FrameNormalizer::default();
        for i in 0..3 {
            normalizer.normalize(frame(PixelFormat::Yuv420p, 4, 4, f64::from(i)));
        }
        assert_eq!(normalizer.stats().context_rebuilds, 1);

        normalizer.normalize(frame(PixelFormat::Yuv420p, 8, 4, 3.0));
        assert_eq!(normalizer.stats().context_rebuilds, 2);

        normalizer.normalize(frame(PixelFormat::Nv12, 8, 4, 4.0));
        assert_eq!(normalizer.stats().context_rebuilds, 3);
        assert_eq!(normalizer.stats().converted, 5);
    }

    #[test]
    fn conversion_keeps_timing_and_provenance() {
        let mut normalizer = FrameNormalizer::default();
        let mut input = frame(PixelFormat::Bgra, 2, 2, 3.5);
        input.set_segment(4);
        let out = normalizer.normalize(input).unwrap();

        assert_eq!(out.pts_secs(), 3.5);
        assert_eq!(out.segment(), 4);
        assert_eq!(out.origin(), FrameOrigin::Native);
    }

    #[test]
    fn canonical_size_resizes_frames() {
        let layout = CanonicalLayout::new(PixelFormat::Rgba, Some((8, 6))).unwrap();
        let mut normalizer = FrameNormalizer::new(layout);
        let out = normalizer.normalize(frame(PixelFormat::Rgba, 4, 3, 0.0)).unwrap();

        assert_eq!((out.width(), out.height()), (8, 6));
        assert_eq!(out.size_bytes(), PixelFormat::Rgba.buffer_size(8, 6));
        assert_eq!(normalizer.stats().converted, 1);
    }

    #[test]
    fn foreign_frames_are_downloaded_first() {
        let mut normalizer = FrameNormalizer::default();
        let surface = Surface {
            format: PixelFormat::Nv12,
            data: Some(vec![16; PixelFormat::Nv12.buffer_size(2, 2)]),
        };
        let out = normalizer
            .normalize(DecodedFrame::from_device(Box::new(surface), 2, 2, 0.25))
            .unwrap();

        assert!(out.is_host_resident());
        assert_eq!(out.origin(), FrameOrigin::Foreign);
        assert_eq!(out.format(), PixelFormat::Rgba);
        let stats = normalizer.stats();
        assert_eq!((stats.transferred, stats.converted), (1, 1));
    }

    #[test]
    fn failed_transfer_drops_the_frame() {
        let mut normalizer = FrameNormalizer::default();
        let surface = Surface {
            format: PixelFormat::Rgba,
            data: None,
        };
        assert!(normalizer
            .normalize(DecodedFrame::from_device(Box::new(surface), 2, 2, 0.0))
            .is_none());
        assert_eq!(normalizer.stats().failed, 1);
    }

    #[test]
    fn malformed_buffers_are_dropped() {
        let mut normalizer = FrameNormalizer::default();
        let short_canonical = DecodedFrame::from_host(vec![0; 3], PixelFormat::Rgba, 1, 1, 0.0);
        let short_yuv = DecodedFrame::from_host(vec![0; 5], PixelFormat::Yuv420p, 2, 2, 0.0);
        let empty = DecodedFrame::from_host(Vec::new(), PixelFormat::Rgba, 0, 0, 0.0);

        assert!(normalizer.normalize(short_canonical).is_none());
        assert!(normalizer.normalize(short_yuv).is_none());
        assert!(normalizer.normalize(empty).is_none());
        assert_eq!(normalizer.stats().failed, 3);
    }

    #[test]
    fn planar_layouts_cannot_be_canonical() {
        assert!(CanonicalLayout::new(PixelFormat::Nv12, None).is_err());
        assert!(CanonicalLayout::new(PixelFormat::Gray8, Some((0, 4))).is_err());
        assert!(CanonicalLayout::new(PixelFormat::Gray8, Some((4, 4))).is_ok());
    }
}
