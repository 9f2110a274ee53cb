// SPDX-License-Identifier: MPL-2.0
//! Pixel layout conversion and resizing.
//!
//! A [`ConversionContext`] is built for one (source format, width, height)
//! triple and a fixed target. Building it precomputes the nearest-neighbour
//! sampling maps, so a stream of identically shaped frames pays that cost
//! once.
//!
//! YUV sources are interpreted as BT.601 limited range.

use crate::domain::video::PixelFormat;
use crate::error::VideoError;

/// Cached state for converting frames of one shape into the canonical layout.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    src_format: PixelFormat,
    src_width: u32,
    src_height: u32,
    dst_format: PixelFormat,
    dst_width: u32,
    dst_height: u32,
    /// Source column sampled for each destination column.
    x_map: Vec<u32>,
    /// Source row sampled for each destination row.
    y_map: Vec<u32>,
}

impl ConversionContext {
    /// Builds a context.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::ConversionFailed`] if the target layout is
    /// planar or either size has a zero dimension.
    pub fn new(
        src_format: PixelFormat,
        src_width: u32,
        src_height: u32,
        dst_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<Self, VideoError> {
        if !dst_format.is_packed() {
            return Err(VideoError::ConversionFailed(format!(
                "cannot convert into planar layout {dst_format}"
            )));
        }
        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            return Err(VideoError::ConversionFailed(format!(
                "empty frame size {src_width}x{src_height} -> {dst_width}x{dst_height}"
            )));
        }
        Ok(Self {
            src_format,
            src_width,
            src_height,
            dst_format,
            dst_width,
            dst_height,
            x_map: sampling_map(src_width, dst_width),
            y_map: sampling_map(src_height, dst_height),
        })
    }

    /// Returns true if this context was built for the given source shape.
    #[must_use]
    pub fn matches(&self, format: PixelFormat, width: u32, height: u32) -> bool {
        self.src_format == format && self.src_width == width && self.src_height == height
    }

    #[must_use]
    pub fn source(&self) -> (PixelFormat, u32, u32) {
        (self.src_format, self.src_width, self.src_height)
    }

    #[must_use]
    pub fn target(&self) -> (PixelFormat, u32, u32) {
        (self.dst_format, self.dst_width, self.dst_height)
    }

    /// Converts one tightly packed source buffer into a new target buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::ConversionFailed`] if `src` does not have the
    /// length its declared layout requires.
    pub fn convert(&self, src: &[u8]) -> Result<Vec<u8>, VideoError> {
        let expected = self.src_format.buffer_size(self.src_width, self.src_height);
        if src.len() != expected {
            return Err(VideoError::ConversionFailed(format!(
                "{} {}x{} buffer has {} bytes, expected {expected}",
                self.src_format,
                self.src_width,
                self.src_height,
                src.len()
            )));
        }

        let out_bpp = self.dst_format.bytes_per_pixel().unwrap_or(4);
        let mut out = Vec::with_capacity(self.dst_format.buffer_size(self.dst_width, self.dst_height));
        let reader = SourceReader::new(self.src_format, self.src_width, self.src_height, src);
        let mut pixel = [0u8; 4];

        for &sy in &self.y_map {
            for &sx in &self.x_map {
                let rgba = reader.rgba_at(sx as usize, sy as usize);
                write_pixel(self.dst_format, rgba, &mut pixel);
                out.extend_from_slice(&pixel[..out_bpp]);
            }
        }
        Ok(out)
    }
}

/// Nearest-neighbour index map from `dst_len` positions into `src_len`.
#[allow(clippy::cast_possible_truncation)] // result < src_len, which is a u32
fn sampling_map(src_len: u32, dst_len: u32) -> Vec<u32> {
    (0..u64::from(dst_len))
        .map(|i| (i * u64::from(src_len) / u64::from(dst_len)) as u32)
        .collect()
}

struct SourceReader<'a> {
    format: PixelFormat,
    width: usize,
    chroma_width: usize,
    luma_len: usize,
    chroma_len: usize,
    data: &'a [u8],
}

impl<'a> SourceReader<'a> {
    fn new(format: PixelFormat, width: u32, height: u32, data: &'a [u8]) -> Self {
        let width = width as usize;
        let height = height as usize;
        Self {
            format,
            width,
            chroma_width: width.div_ceil(2),
            luma_len: width * height,
            chroma_len: width.div_ceil(2) * height.div_ceil(2),
            data,
        }
    }

    fn rgba_at(&self, x: usize, y: usize) -> [u8; 4] {
        let index = y * self.width + x;
        let d = self.data;
        match self.format {
            PixelFormat::Rgba => {
                let i = index * 4;
                [d[i], d[i + 1], d[i + 2], d[i + 3]]
            }
            PixelFormat::Bgra => {
                let i = index * 4;
                [d[i + 2], d[i + 1], d[i], d[i + 3]]
            }
            PixelFormat::Rgb24 => {
                let i = index * 3;
                [d[i], d[i + 1], d[i + 2], 255]
            }
            PixelFormat::Gray8 => {
                let g = d[index];
                [g, g, g, 255]
            }
            PixelFormat::Yuv420p => {
                let c = (y / 2) * self.chroma_width + x / 2;
                let u = d[self.luma_len + c];
                let v = d[self.luma_len + self.chroma_len + c];
                yuv_to_rgba(d[index], u, v)
            }
            PixelFormat::Nv12 => {
                let c = self.luma_len + (y / 2) * self.chroma_width * 2 + (x / 2) * 2;
                yuv_to_rgba(d[index], d[c], d[c + 1])
            }
        }
    }
}

/// BT.601 limited-range YUV to RGBA, integer approximation.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
        255,
    ]
}

#[allow(clippy::cast_possible_truncation)]
fn write_pixel(format: PixelFormat, [r, g, b, a]: [u8; 4], out: &mut [u8; 4]) {
    *out = match format {
        PixelFormat::Bgra => [b, g, r, a],
        PixelFormat::Gray8 => {
            let luma = (77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b)) >> 8;
            [luma as u8, 0, 0, 0]
        }
        // Rgb24 keeps the first three bytes
        _ => [r, g, b, a],
    };
}
