// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` adapter implementing the [`FrameSource`] port trait.
//!
//! [`FfmpegSource`] demuxes the best video stream of a file and decodes it
//! packet by packet. Frames in a layout the pipeline understands are copied
//! out as-is (stride removed); anything else goes through `FFmpeg`'s scaler
//! to RGBA.
//!
//! Available with the `ffmpeg` cargo feature.
//!
//! [`FrameSource`]: crate::application::port::FrameSource

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use crate::application::port::{FrameSource, SourceRead};
use crate::domain::video::{DecodedFrame, PixelFormat};
use crate::error::VideoError;

static FFMPEG_INIT: Once = Once::new();

/// Initializes `FFmpeg` once per process and silences its warning output.
fn init_ffmpeg() -> Result<(), VideoError> {
    let mut init_result = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(VideoError::Other(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Maps an `FFmpeg` pixel format to a pipeline layout, if there is one.
fn map_pixel_format(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::GRAY8 => Some(PixelFormat::Gray8),
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        _ => None,
    }
}

/// `FFmpeg`-backed frame source.
///
/// # Thread Safety
///
/// This type is `Send` but not `Sync`: it is moved onto the decode thread
/// and used exclusively from there.
///
/// # Example
///
/// ```ignore
/// use frame_pacer::infrastructure::ffmpeg::FfmpegSource;
/// use frame_pacer::video_player::Pipeline;
///
/// let source = FfmpegSource::open(Path::new("video.mp4"))?;
/// let pipeline = Pipeline::start(&config, source, |frame| display(frame))?;
/// ```
pub struct FfmpegSource {
    state: SourceState,
    width: u32,
    height: u32,
    duration: Option<Duration>,
}

/// `FFmpeg` contexts for one open file.
struct SourceState {
    input_context: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    video_stream_index: usize,
    time_base_f64: f64,
    /// First timestamp of the stream, subtracted so playback starts at 0.
    start_pts: i64,
    /// RGBA scaler for layouts the pipeline does not handle, keyed by source shape.
    scaler: Option<(Pixel, u32, u32, scaling::Context)>,
}

// SAFETY: SourceState contains FFmpeg types with internal raw pointers.
// These are safe to send between threads because:
// 1. FFmpeg's decoder/format/scaler contexts are safe for single-threaded access per instance
// 2. We maintain exclusive access through Rust's ownership model
// 3. The source is only used from one thread at a time (move semantics)
unsafe impl Send for SourceState {}

impl FfmpegSource {
    /// Opens `path` and prepares a decoder for its best video stream.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] classified from `FFmpeg`'s message when the
    /// file cannot be opened, has no video stream, or uses an unsupported
    /// codec.
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        init_ffmpeg()?;

        let input_context = ffmpeg_next::format::input(path)
            .map_err(|e| VideoError::from_message(&e.to_string()))?;

        let video_stream = input_context
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(VideoError::NoVideoStream)?;
        let video_stream_index = video_stream.index();

        let time_base = video_stream.time_base();
        let time_base_f64 = f64::from(time_base.numerator()) / f64::from(time_base.denominator());
        let start_pts = match video_stream.start_time() {
            ffmpeg_next::ffi::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let context_decoder =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .map_err(|e| VideoError::from_message(&format!("codec context: {e}")))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| VideoError::from_message(&format!("decoder: {e}")))?;

        #[allow(clippy::cast_sign_loss)]
        let duration = (input_context.duration() > 0)
            .then(|| Duration::from_micros(input_context.duration() as u64));

        let width = decoder.width();
        let height = decoder.height();
        tracing::info!(
            path = %path.display(),
            width,
            height,
            format = ?decoder.format(),
            duration_secs = duration.map(|d| d.as_secs_f64()),
            "opened video source"
        );

        Ok(Self {
            state: SourceState {
                input_context,
                decoder,
                video_stream_index,
                time_base_f64,
                start_pts,
                scaler: None,
            },
            width,
            height,
            duration,
        })
    }

    /// Coded size of the video stream.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pulls every frame the decoder has ready.
    ///
    /// A frame that cannot be converted is skipped; the rest are kept.
    fn receive_frames(&mut self) -> Vec<DecodedFrame> {
        let state = &mut self.state;
        let mut decoded = ffmpeg_next::frame::Video::empty();
        keep_converted(std::iter::from_fn(|| {
            state
                .decoder
                .receive_frame(&mut decoded)
                .ok()
                .map(|()| state.convert_frame(&decoded))
        }))
    }
}

impl SourceState {
    #[allow(clippy::cast_precision_loss)]
    fn pts_secs(&self, frame: &ffmpeg_next::frame::Video) -> f64 {
        frame
            .timestamp()
            .or_else(|| frame.pts())
            .map_or(0.0, |pts| (pts - self.start_pts) as f64 * self.time_base_f64)
            .max(0.0)
    }

    fn convert_frame(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
    ) -> Result<DecodedFrame, VideoError> {
        let pts_secs = self.pts_secs(frame);
        let (width, height) = (frame.width(), frame.height());

        if let Some(format) = map_pixel_format(frame.format()) {
            let data = copy_planes(frame, format);
            return Ok(DecodedFrame::from_host(data, format, width, height, pts_secs));
        }

        let scaler = self.scaler_for(frame.format(), width, height)?;
        let mut rgba = ffmpeg_next::frame::Video::empty();
        scaler
            .run(frame, &mut rgba)
            .map_err(|e| VideoError::ConversionFailed(format!("Scaling failed: {e}")))?;
        let data = copy_planes(&rgba, PixelFormat::Rgba);
        Ok(DecodedFrame::from_host(
            data,
            PixelFormat::Rgba,
            width,
            height,
            pts_secs,
        ))
    }

    fn scaler_for(
        &mut self,
        format: Pixel,
        width: u32,
        height: u32,
    ) -> Result<&mut scaling::Context, VideoError> {
        let reusable = matches!(
            &self.scaler,
            Some((f, w, h, _)) if *f == format && *w == width && *h == height
        );
        if !reusable {
            let context = scaling::Context::get(
                format,
                width,
                height,
                Pixel::RGBA,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| VideoError::ConversionFailed(format!("Failed to create scaler: {e}")))?;
            tracing::debug!(?format, width, height, "created RGBA scaler");
            self.scaler = Some((format, width, height, context));
        }
        self.scaler
            .as_mut()
            .map(|(_, _, _, context)| context)
            .ok_or_else(|| VideoError::ConversionFailed("scaler unavailable".to_string()))
    }
}

/// Collects converted frames, logging and skipping the ones that failed.
fn keep_converted(
    results: impl IntoIterator<Item = Result<DecodedFrame, VideoError>>,
) -> Vec<DecodedFrame> {
    results
        .into_iter()
        .filter_map(|result| {
            result
                .map_err(|err| tracing::warn!(error = %err, "skipping unconvertible frame"))
                .ok()
        })
        .collect()
}

/// Copies a frame's planes into one tightly packed buffer, dropping stride padding.
fn copy_planes(frame: &ffmpeg_next::frame::Video, format: PixelFormat) -> Vec<u8> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);

    // (plane index, bytes per row, rows)
    let planes: &[(usize, usize, usize)] = match format {
        PixelFormat::Rgba | PixelFormat::Bgra => &[(0, width * 4, height)],
        PixelFormat::Rgb24 => &[(0, width * 3, height)],
        PixelFormat::Gray8 => &[(0, width, height)],
        PixelFormat::Yuv420p => &[
            (0, width, height),
            (1, chroma_width, chroma_height),
            (2, chroma_width, chroma_height),
        ],
        PixelFormat::Nv12 => &[(0, width, height), (1, chroma_width * 2, chroma_height)],
    };

    let mut out = Vec::with_capacity(format.buffer_size(frame.width(), frame.height()));
    for &(plane, row_bytes, rows) in planes {
        let data = frame.data(plane);
        let stride = frame.stride(plane);
        for y in 0..rows {
            let row_start = y * stride;
            out.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
    }
    out
}

impl FrameSource for FfmpegSource {
    type Unit = ffmpeg_next::Packet;

    fn next_unit(&mut self) -> Result<SourceRead<Self::Unit>, VideoError> {
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.state.input_context) {
                Ok(()) if packet.stream() == self.state.video_stream_index => {
                    return Ok(SourceRead::Unit(packet));
                }
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return Ok(SourceRead::EndOfStream),
                Err(e) => {
                    return Err(VideoError::DecodingFailed(format!("Packet read failed: {e}")))
                }
            }
        }
    }

    fn decode(&mut self, unit: Self::Unit) -> Result<Vec<DecodedFrame>, VideoError> {
        self.state
            .decoder
            .send_packet(&unit)
            .map_err(|e| VideoError::DecodingFailed(format!("Packet send failed: {e}")))?;
        Ok(self.receive_frames())
    }

    fn seek(&mut self, position: Duration) -> Result<(), VideoError> {
        // FFmpeg seek uses AV_TIME_BASE which is 1_000_000
        #[allow(clippy::cast_possible_truncation)]
        let timestamp = position.as_micros() as i64;

        // RangeTo lets FFmpeg land on the preceding keyframe
        self.state
            .input_context
            .seek(timestamp, ..timestamp)
            .map_err(|e| VideoError::SeekFailed(e.to_string()))?;
        self.state.decoder.flush();
        Ok(())
    }

    fn flush(&mut self) {
        self.state.decoder.flush();
    }

    fn end_of_input(&mut self) -> Result<Vec<DecodedFrame>, VideoError> {
        self.state
            .decoder
            .send_eof()
            .map_err(|e| VideoError::DecodingFailed(format!("Decoder drain failed: {e}")))?;
        Ok(self.receive_frames())
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
