// SPDX-License-Identifier: MPL-2.0
//! Decoded frame and pixel layout types.
//!
//! A [`DecodedFrame`] is deliberately not `Clone`: it is moved from the
//! decoder to the normalizer, into the queue and finally into the sink, so
//! there is exactly one owner of its pixel buffer at any time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VideoError;

/// Pixel layouts understood by the pipeline.
///
/// Buffers are tightly packed (no row padding). Planar YUV formats use
/// BT.601 limited range and chroma planes of `ceil(w/2) x ceil(h/2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba,
    Bgra,
    Rgb24,
    Gray8,
    Yuv420p,
    Nv12,
}

impl PixelFormat {
    /// Returns the byte length of a tightly packed buffer in this layout.
    #[must_use]
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        let chroma = w.div_ceil(2) * h.div_ceil(2);
        match self {
            Self::Rgba | Self::Bgra => w * h * 4,
            Self::Rgb24 => w * h * 3,
            Self::Gray8 => w * h,
            Self::Yuv420p | Self::Nv12 => w * h + 2 * chroma,
        }
    }

    /// Returns true for interleaved single-plane layouts.
    ///
    /// Only packed layouts can be used as the canonical pipeline layout.
    #[must_use]
    pub fn is_packed(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Rgb24 | Self::Gray8)
    }

    /// Bytes per pixel for packed layouts, `None` for planar ones.
    #[must_use]
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgba | Self::Bgra => Some(4),
            Self::Rgb24 => Some(3),
            Self::Gray8 => Some(1),
            Self::Yuv420p | Self::Nv12 => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Rgb24 => "rgb24",
            Self::Gray8 => "gray8",
            Self::Yuv420p => "yuv420p",
            Self::Nv12 => "nv12",
        };
        f.write_str(name)
    }
}

/// Where a frame's pixels lived when the decoder produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// Decoded straight into host memory.
    Native,
    /// Produced in a foreign memory domain (e.g. a hardware decoder surface).
    Foreign,
}

/// Pixels copied out of a foreign surface.
#[derive(Debug)]
pub struct HostPixels {
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// A decoded picture living outside ordinary addressable memory.
///
/// Implemented by decoder integrations that hand out hardware surfaces.
/// `download` consumes the surface; the surface is released once the call
/// returns, whether or not the copy succeeded.
pub trait DeviceSurface: Send + fmt::Debug {
    /// Layout the pixels will have once downloaded.
    fn host_format(&self) -> PixelFormat;

    /// Copies the surface into host memory.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::TransferFailed`] when the copy is impossible.
    fn download(self: Box<Self>) -> Result<HostPixels, VideoError>;
}

/// Pixel storage of a frame.
#[derive(Debug)]
pub enum FramePixels {
    Host(Vec<u8>),
    Device(Box<dyn DeviceSurface>),
}

/// A single presentable picture.
#[derive(Debug)]
pub struct DecodedFrame {
    pixels: FramePixels,
    format: PixelFormat,
    origin: FrameOrigin,
    width: u32,
    height: u32,
    pts_secs: f64,
    segment: u64,
}

impl DecodedFrame {
    /// Creates a frame whose pixels are already in host memory.
    #[must_use]
    pub fn from_host(
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
        pts_secs: f64,
    ) -> Self {
        Self {
            pixels: FramePixels::Host(data),
            format,
            origin: FrameOrigin::Native,
            width,
            height,
            pts_secs,
            segment: 0,
        }
    }

    /// Creates a frame backed by a foreign surface.
    #[must_use]
    pub fn from_device(
        surface: Box<dyn DeviceSurface>,
        width: u32,
        height: u32,
        pts_secs: f64,
    ) -> Self {
        Self {
            format: surface.host_format(),
            pixels: FramePixels::Device(surface),
            origin: FrameOrigin::Foreign,
            width,
            height,
            pts_secs,
            segment: 0,
        }
    }

    /// Presentation timestamp in seconds.
    #[must_use]
    pub fn pts_secs(&self) -> f64 {
        self.pts_secs
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout of the host buffer (or of the surface once downloaded).
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[must_use]
    pub fn origin(&self) -> FrameOrigin {
        self.origin
    }

    /// Playback segment this frame belongs to (bumped on every loop).
    #[must_use]
    pub fn segment(&self) -> u64 {
        self.segment
    }

    pub(crate) fn set_segment(&mut self, segment: u64) {
        self.segment = segment;
    }

    /// Returns true if the pixels are in ordinary memory.
    #[must_use]
    pub fn is_host_resident(&self) -> bool {
        matches!(self.pixels, FramePixels::Host(_))
    }

    /// Host pixel data, `None` for frames still on a device.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match &self.pixels {
            FramePixels::Host(data) => Some(data),
            FramePixels::Device(_) => None,
        }
    }

    /// Size of the host buffer in bytes (0 while on a device).
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data().map_or(0, <[u8]>::len)
    }

    /// Consumes the frame and returns its host buffer, if any.
    #[must_use]
    pub fn into_data(self) -> Option<Vec<u8>> {
        match self.pixels {
            FramePixels::Host(data) => Some(data),
            FramePixels::Device(_) => None,
        }
    }

    /// Moves a foreign-resident frame into host memory.
    ///
    /// Host-resident frames are returned unchanged. The origin flag keeps
    /// recording where the frame was decoded.
    ///
    /// # Errors
    ///
    /// Returns the surface's transfer error; the frame is released.
    pub fn into_host(self) -> Result<Self, VideoError> {
        match self.pixels {
            FramePixels::Host(_) => Ok(self),
            FramePixels::Device(surface) => {
                let host = surface.download()?;
                Ok(Self {
                    pixels: FramePixels::Host(host.data),
                    format: host.format,
                    ..self
                })
            }
        }
    }

    /// Builds a host frame carrying this frame's timing and provenance.
    pub(crate) fn with_pixels(
        &self,
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            pixels: FramePixels::Host(data),
            format,
            origin: self.origin,
            width,
            height,
            pts_secs: self.pts_secs,
            segment: self.segment,
        }
    }
}
