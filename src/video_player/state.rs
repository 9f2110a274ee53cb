// SPDX-License-Identifier: MPL-2.0
//! Shared playback signals and counters.
//!
//! [`PlaybackState`] is the control plane both workers observe: every field
//! is its own atomic, read and written without a lock. There is no
//! multi-field transaction; a [`PlaybackStats`] snapshot may mix values
//! read a few microseconds apart.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::time_units::{secs_to_micros_unsigned, unsigned_micros_to_secs};
use crate::domain::video::{PlaybackSpeed, SpeedRange, StopMode};
use crate::error::VideoError;

/// Sentinel for "duration unknown".
const UNKNOWN_DURATION: u64 = u64::MAX;

/// Process-wide playback signals shared by the controller and both workers.
#[derive(Debug)]
pub struct PlaybackState {
    stop: AtomicU8,
    paused: AtomicBool,
    speed_bits: AtomicU64,
    speed_range: SpeedRange,

    /// Position of the last presented frame, in microseconds.
    position_us: AtomicU64,
    duration_us: AtomicU64,

    decoded: AtomicU64,
    displayed: AtomicU64,
    dropped: AtomicU64,
    foreign: AtomicU64,
    loops: AtomicU64,
    segment: AtomicU64,

    active_workers: AtomicUsize,
    last_error: Mutex<Option<VideoError>>,
}

impl PlaybackState {
    /// Creates a running, unpaused state. `initial_speed` is clamped to `speed_range`.
    #[must_use]
    pub fn new(speed_range: SpeedRange, initial_speed: f64) -> Self {
        Self {
            stop: AtomicU8::new(StopMode::Running as u8),
            paused: AtomicBool::new(false),
            speed_bits: AtomicU64::new(speed_range.clamp(initial_speed).value().to_bits()),
            speed_range,
            position_us: AtomicU64::new(0),
            duration_us: AtomicU64::new(UNKNOWN_DURATION),
            decoded: AtomicU64::new(0),
            displayed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            foreign: AtomicU64::new(0),
            loops: AtomicU64::new(0),
            segment: AtomicU64::new(0),
            active_workers: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        }
    }

    // ---------------------------------------------------------------------
    // Quit
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn stop_mode(&self) -> StopMode {
        StopMode::from_u8(self.stop.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_quit(&self) -> bool {
        self.stop_mode().is_quit()
    }

    /// Raises quit. Idempotent; a stronger mode is never downgraded.
    ///
    /// Returns true if this call changed the mode.
    pub fn request_quit(&self, mode: StopMode) -> bool {
        let previous = self.stop.fetch_max(mode as u8, Ordering::SeqCst);
        previous < mode as u8
    }

    // ---------------------------------------------------------------------
    // Pause and speed
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Sets the pause flag, returning the previous value.
    pub(crate) fn set_paused(&self, paused: bool) -> bool {
        self.paused.swap(paused, Ordering::SeqCst)
    }

    /// Flips the pause flag, returning the new value.
    pub(crate) fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn speed(&self) -> PlaybackSpeed {
        self.speed_range
            .clamp(f64::from_bits(self.speed_bits.load(Ordering::SeqCst)))
    }

    #[must_use]
    pub fn speed_range(&self) -> SpeedRange {
        self.speed_range
    }

    /// Stores a raw speed after clamping it to the configured range.
    pub(crate) fn set_speed(&self, speed: f64) -> PlaybackSpeed {
        let clamped = self.speed_range.clamp(speed);
        self.speed_bits
            .store(clamped.value().to_bits(), Ordering::SeqCst);
        clamped
    }

    /// Atomically replaces the speed with `f(current)`.
    pub(crate) fn update_speed(
        &self,
        f: impl Fn(PlaybackSpeed, SpeedRange) -> PlaybackSpeed,
    ) -> PlaybackSpeed {
        let range = self.speed_range;
        let previous = self
            .speed_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some(f(range.clamp(f64::from_bits(bits)), range).value().to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f(range.clamp(f64::from_bits(previous)), range)
    }

    // ---------------------------------------------------------------------
    // Position and duration
    // ---------------------------------------------------------------------

    /// Timestamp of the last presented frame within the current segment.
    #[must_use]
    pub fn position_secs(&self) -> f64 {
        unsigned_micros_to_secs(self.position_us.load(Ordering::SeqCst))
    }

    pub(crate) fn set_position_secs(&self, secs: f64) {
        self.position_us
            .store(secs_to_micros_unsigned(secs), Ordering::SeqCst);
    }

    #[must_use]
    pub fn duration_secs(&self) -> Option<f64> {
        match self.duration_us.load(Ordering::SeqCst) {
            UNKNOWN_DURATION => None,
            us => Some(unsigned_micros_to_secs(us)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn set_duration(&self, duration: Option<Duration>) {
        let us = duration.map_or(UNKNOWN_DURATION, |d| {
            (d.as_micros() as u64).min(UNKNOWN_DURATION - 1)
        });
        self.duration_us.store(us, Ordering::SeqCst);
    }

    // ---------------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------------

    pub(crate) fn record_decoded(&self) -> u64 {
        self.decoded.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_displayed(&self) -> u64 {
        self.displayed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_foreign(&self) -> u64 {
        self.foreign.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Starts a new playback segment after a loop reset.
    ///
    /// Returns the new segment number.
    pub(crate) fn begin_segment(&self) -> u64 {
        self.loops.fetch_add(1, Ordering::SeqCst);
        self.segment.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn displayed(&self) -> u64 {
        self.displayed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Frames that arrived from the decoder in foreign residency.
    #[must_use]
    pub fn foreign_frames(&self) -> u64 {
        self.foreign.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn loops(&self) -> u64 {
        self.loops.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn segment(&self) -> u64 {
        self.segment.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Workers and errors
    // ---------------------------------------------------------------------

    pub(crate) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn worker_exited(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of worker threads still running.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Records a fatal error. The first error wins.
    pub(crate) fn set_last_error(&self, error: VideoError) {
        let mut slot = self.last_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    #[must_use]
    pub fn last_error(&self) -> Option<VideoError> {
        self.last_error.lock().clone()
    }

    /// Copies every field into a snapshot.
    #[must_use]
    pub fn snapshot(&self, queue_len: usize, queue_capacity: usize) -> PlaybackStats {
        PlaybackStats {
            stop_mode: self.stop_mode(),
            paused: self.is_paused(),
            speed: self.speed().value(),
            position_secs: self.position_secs(),
            duration_secs: self.duration_secs(),
            decoded: self.decoded(),
            displayed: self.displayed(),
            dropped: self.dropped(),
            foreign_frames: self.foreign_frames(),
            loops: self.loops(),
            segment: self.segment(),
            queue_len,
            queue_capacity,
        }
    }
}

/// Point-in-time copy of the playback counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStats {
    pub stop_mode: StopMode,
    pub paused: bool,
    pub speed: f64,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub decoded: u64,
    pub displayed: u64,
    pub dropped: u64,
    pub foreign_frames: u64,
    pub loops: u64,
    pub segment: u64,
    pub queue_len: usize,
    pub queue_capacity: usize,
}

impl PlaybackStats {
    /// Position as a percentage of the duration, when the duration is known.
    #[must_use]
    pub fn progress_percent(&self) -> Option<f64> {
        self.duration_secs
            .filter(|duration| *duration > 0.0)
            .map(|duration| (self.position_secs / duration * 100.0).clamp(0.0, 100.0))
    }
}

impl fmt::Display for PlaybackStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/", self.position_secs)?;
        match self.duration_secs {
            Some(duration) => write!(f, "{duration:.1}s")?,
            None => f.write_str("--")?,
        }
        write!(
            f,
            " | Q:{}/{} | D:{} | Drop:{}",
            self.queue_len, self.queue_capacity, self.decoded, self.dropped
        )
    }
}
