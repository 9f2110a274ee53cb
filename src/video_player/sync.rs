// SPDX-License-Identifier: MPL-2.0
//! Wall-clock pacing for frame presentation.
//!
//! The [`PlaybackClock`] maps a frame's presentation timestamp to the
//! instant it is due:
//!
//! ```text
//! expected_instant(pts) = anchor + pts / speed
//! ```
//!
//! The anchor is the wall-clock instant treated as stream position 0. It is
//! moved ("rebased") on resume, on speed changes and on loop/seek resets so
//! that time spent paused or in a previous segment never shows up as lag.
//!
//! The clock never skips frames; dropping is left to the queue's overflow
//! policy upstream.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::time_units::{micros_to_secs, secs_to_micros};
use crate::config::defaults::QUIT_POLL_INTERVAL;
use crate::domain::video::PlaybackSpeed;

/// Reference instant for converting `Instant` to/from atomic microseconds.
/// All anchors are stored relative to this instant, allowing storage in `AtomicI64`.
static REFERENCE_INSTANT: OnceLock<Instant> = OnceLock::new();

fn reference() -> Instant {
    *REFERENCE_INSTANT.get_or_init(Instant::now)
}

/// Converts an `Instant` to signed microseconds since the reference instant.
#[allow(clippy::cast_possible_truncation)] // u128 microseconds won't overflow i64 for reasonable durations
fn instant_to_us(instant: Instant) -> i64 {
    let reference = reference();
    if instant >= reference {
        instant.duration_since(reference).as_micros() as i64
    } else {
        -(reference.duration_since(instant).as_micros() as i64)
    }
}

/// Converts signed microseconds since reference back to an `Instant`.
#[allow(clippy::cast_sign_loss)]
fn us_to_instant(us: i64) -> Instant {
    let reference = reference();
    if us >= 0 {
        reference + Duration::from_micros(us as u64)
    } else {
        reference
            .checked_sub(Duration::from_micros(us.unsigned_abs()))
            .unwrap_or(reference)
    }
}

/// Result of waiting for a frame's presentation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingOutcome {
    /// The frame is due now.
    Ready,
    /// The wait was cut short (pause, quit or speed change).
    Interrupted,
}

/// Computes how long to wait before a frame is due.
///
/// `elapsed_secs` is the wall-clock time since the anchor. Returns zero when
/// the frame is already due or late.
///
/// # Examples
///
/// ```
/// use frame_pacer::video_player::sync::pacing_delay;
/// use std::time::Duration;
///
/// assert_eq!(pacing_delay(2.0, 1.0, 0.0), Duration::from_secs(2));
/// assert_eq!(pacing_delay(2.0, 2.0, 0.0), Duration::from_secs(1));
/// assert_eq!(pacing_delay(1.0, 1.0, 5.0), Duration::ZERO);
/// ```
#[must_use]
pub fn pacing_delay(pts_secs: f64, speed: f64, elapsed_secs: f64) -> Duration {
    let due_secs = pts_secs / speed - elapsed_secs;
    if due_secs.is_finite() && due_secs > 0.0 {
        Duration::from_secs_f64(due_secs)
    } else {
        Duration::ZERO
    }
}

/// Playback clock pacing frames against wall-clock time.
///
/// This struct is lock-free for reads: anchor and speed live in atomics.
/// The mutex/condvar pair only exists so [`wake_all`](Self::wake_all) can cut
/// a pending [`wait_for`](Self::wait_for) short.
#[derive(Debug)]
pub struct PlaybackClock {
    /// Anchor as microseconds since `REFERENCE_INSTANT` (may be negative).
    anchor_us: AtomicI64,

    /// Speed multiplier stored as `f64` bits.
    speed_bits: AtomicU64,

    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl PlaybackClock {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new(speed: PlaybackSpeed) -> Self {
        Self {
            anchor_us: AtomicI64::new(instant_to_us(Instant::now())),
            speed_bits: AtomicU64::new(speed.value().to_bits()),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    /// Returns the current speed multiplier.
    #[must_use]
    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::SeqCst))
    }

    /// Uses a new multiplier for every subsequent computation.
    ///
    /// Past computations are not corrected; callers that want a seamless
    /// change rebase at the current position as well.
    pub fn set_speed(&self, speed: PlaybackSpeed) {
        self.speed_bits
            .store(speed.value().to_bits(), Ordering::SeqCst);
    }

    /// Wall-clock instant corresponding to stream position 0.
    #[must_use]
    pub fn anchor(&self) -> Instant {
        us_to_instant(self.anchor_us.load(Ordering::SeqCst))
    }

    /// Instant at which a frame with the given timestamp is due.
    #[must_use]
    pub fn expected_instant(&self, pts_secs: f64) -> Instant {
        us_to_instant(self.expected_us(pts_secs))
    }

    fn expected_us(&self, pts_secs: f64) -> i64 {
        let offset = secs_to_micros(pts_secs / self.speed());
        self.anchor_us.load(Ordering::SeqCst).saturating_add(offset)
    }

    /// Time left before the frame is due, measured from `now`.
    #[must_use]
    pub fn wait_duration_at(&self, pts_secs: f64, now: Instant) -> Duration {
        let elapsed = micros_to_secs(instant_to_us(now) - self.anchor_us.load(Ordering::SeqCst));
        pacing_delay(pts_secs, self.speed(), elapsed)
    }

    /// Time left before the frame is due.
    #[must_use]
    pub fn wait_duration(&self, pts_secs: f64) -> Duration {
        self.wait_duration_at(pts_secs, Instant::now())
    }

    /// Suspends the caller until the frame is due.
    ///
    /// Returns immediately if the frame is already due or late. The wait is
    /// sliced: `should_abort` is consulted before each slice, and
    /// [`wake_all`](Self::wake_all) ends the current slice early.
    pub fn wait_for(&self, pts_secs: f64, should_abort: impl Fn() -> bool) -> PacingOutcome {
        let mut guard = self.wake_lock.lock();
        loop {
            let remaining = self.wait_duration(pts_secs);
            if remaining.is_zero() {
                return PacingOutcome::Ready;
            }
            if should_abort() {
                return PacingOutcome::Interrupted;
            }
            let _ = self
                .wake
                .wait_for(&mut guard, remaining.min(QUIT_POLL_INTERVAL));
        }
    }

    /// Rebases so that `current_pts` is due exactly now.
    ///
    /// Used on resume: the pause duration is not treated as lag.
    pub fn rebase(&self, current_pts: f64) {
        self.rebase_at(current_pts, Instant::now());
    }

    /// Rebases so that `current_pts` is due exactly at `now`.
    pub fn rebase_at(&self, current_pts: f64, now: Instant) {
        let offset = secs_to_micros(current_pts / self.speed());
        self.anchor_us
            .store(instant_to_us(now).saturating_sub(offset), Ordering::SeqCst);
    }

    /// Treats `now` as stream position 0 (loop or seek reset).
    pub fn restart(&self) {
        self.rebase_at(0.0, Instant::now());
    }

    /// Wakes any thread blocked in [`wait_for`](Self::wait_for).
    pub fn wake_all(&self) {
        let _guard = self.wake_lock.lock();
        self.wake.notify_all();
    }
}

/// Thread-safe wrapper around `PlaybackClock` for sharing between threads.
pub type SharedPlaybackClock = Arc<PlaybackClock>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::video::SpeedRange;
    use crate::test_utils::assert_abs_diff_eq;
    use std::sync::atomic::AtomicBool;

    fn speed(value: f64) -> PlaybackSpeed {
        SpeedRange::default().clamp(value)
    }

    #[test]
    fn instant_conversion_round_trips() {
        let now = Instant::now();
        let back = us_to_instant(instant_to_us(now));
        let diff = if back > now { back - now } else { now - back };
        assert!(diff < Duration::from_micros(2));
    }

    #[test]
    fn expected_instant_adds_scaled_pts_to_anchor() {
        let clock = PlaybackClock::new(speed(1.0));
        let t0 = Instant::now();
        clock.rebase_at(0.0, t0);

        let expected = clock.expected_instant(1.5);
        let offset = expected.duration_since(clock.anchor());
        assert_abs_diff_eq!(offset.as_secs_f64(), 1.5, epsilon = 1e-5);
    }

    #[test]
    fn double_speed_halves_wait_time() {
        let clock = PlaybackClock::new(speed(1.0));
        let t0 = Instant::now();
        clock.rebase_at(0.0, t0);
        let normal = clock.wait_duration_at(2.0, t0);

        clock.set_speed(speed(2.0));
        let fast = clock.wait_duration_at(2.0, t0);

        assert_abs_diff_eq!(normal.as_secs_f64(), 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(fast.as_secs_f64(), normal.as_secs_f64() / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn late_frames_are_due_immediately() {
        let clock = PlaybackClock::new(speed(1.0));
        let t0 = Instant::now();
        clock.rebase_at(0.0, t0);
        assert_eq!(
            clock.wait_duration_at(0.5, t0 + Duration::from_secs(1)),
            Duration::ZERO
        );
    }

    #[test]
    fn rebase_makes_current_pts_due_now() {
        let clock = PlaybackClock::new(speed(1.0));
        let now = Instant::now();
        clock.rebase_at(42.0, now);

        assert_eq!(clock.wait_duration_at(42.0, now), Duration::ZERO);
        // The next frame keeps its relative spacing
        let next = clock.wait_duration_at(42.04, now);
        assert_abs_diff_eq!(next.as_secs_f64(), 0.04, epsilon = 1e-5);
    }

    #[test]
    fn rebase_accounts_for_speed() {
        let clock = PlaybackClock::new(speed(2.0));
        let now = Instant::now();
        clock.rebase_at(10.0, now);
        let next = clock.wait_duration_at(11.0, now);
        assert_abs_diff_eq!(next.as_secs_f64(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn restart_anchors_new_segment_at_zero() {
        let clock = PlaybackClock::new(speed(1.0));
        clock.rebase_at(300.0, Instant::now());
        clock.restart();
        let wait = clock.wait_duration(0.1);
        assert!(wait <= Duration::from_millis(100));
        assert!(wait > Duration::from_millis(50));
    }

    #[test]
    fn wait_for_returns_ready_for_due_frames() {
        let clock = PlaybackClock::new(speed(1.0));
        clock.rebase(1.0);
        assert_eq!(clock.wait_for(0.0, || false), PacingOutcome::Ready);
    }

    #[test]
    fn wait_for_sleeps_until_due() {
        let clock = PlaybackClock::new(speed(1.0));
        clock.restart();
        let start = Instant::now();
        assert_eq!(clock.wait_for(0.05, || false), PacingOutcome::Ready);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn wait_for_is_interrupted_by_abort_predicate() {
        let clock = Arc::new(PlaybackClock::new(speed(1.0)));
        clock.restart();
        let abort = Arc::new(AtomicBool::new(false));

        let waiter = {
            let clock = Arc::clone(&clock);
            let abort = Arc::clone(&abort);
            std::thread::spawn(move || clock.wait_for(60.0, || abort.load(Ordering::SeqCst)))
        };

        std::thread::sleep(Duration::from_millis(20));
        let signalled = Instant::now();
        abort.store(true, Ordering::SeqCst);
        clock.wake_all();

        assert_eq!(waiter.join().unwrap(), PacingOutcome::Interrupted);
        assert!(signalled.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pacing_delay_handles_degenerate_speed() {
        assert_eq!(pacing_delay(1.0, 0.0, 0.0), Duration::ZERO);
        assert_eq!(pacing_delay(f64::NAN, 1.0, 0.0), Duration::ZERO);
    }
}
