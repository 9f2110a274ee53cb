// SPDX-License-Identifier: MPL-2.0
//! Render worker: pops frames, paces them and hands them to the sink.
//!
//! The render worker is the only consumer of the frame queue and the only
//! writer of the playback position and displayed count. It polls the
//! control plane at every loop boundary and while waiting on the clock.

use std::sync::Arc;

use crate::application::port::FrameSink;
use crate::config::defaults::{PAUSE_POLL_INTERVAL, PROGRESS_LOG_EVERY_FRAMES, RENDER_POP_TIMEOUT};
use crate::domain::video::{DecodedFrame, StopMode};
use crate::error::VideoError;

use super::frame_queue::FrameQueue;
use super::state::PlaybackState;
use super::sync::{PacingOutcome, PlaybackClock};
use super::WorkerOutcome;

/// How the render worker ended.
pub type RenderOutcome = WorkerOutcome;

/// Consumer side of the pipeline.
pub struct RenderWorker<K: FrameSink> {
    sink: K,
    queue: Arc<FrameQueue>,
    clock: Arc<PlaybackClock>,
    state: Arc<PlaybackState>,
    /// Frame popped but not yet presented (its wait was interrupted).
    pending: Option<DecodedFrame>,
    /// Segment of the last frame seen; `None` before the first frame.
    segment: Option<u64>,
    was_paused: bool,
}

impl<K: FrameSink> RenderWorker<K> {
    pub fn new(
        sink: K,
        queue: Arc<FrameQueue>,
        clock: Arc<PlaybackClock>,
        state: Arc<PlaybackState>,
    ) -> Self {
        Self {
            sink,
            queue,
            clock,
            state,
            pending: None,
            segment: None,
            was_paused: false,
        }
    }

    /// Runs until quit is raised and, in drain mode, the queue is empty.
    ///
    /// A drain quit observed while paused ends the worker without waiting
    /// for a resume.
    pub fn run(mut self) -> RenderOutcome {
        tracing::info!("render worker started");
        let outcome = self.render_loop();
        tracing::info!(
            ?outcome,
            displayed = self.state.displayed(),
            position_secs = self.state.position_secs(),
            "render worker stopped"
        );
        outcome
    }

    fn render_loop(&mut self) -> RenderOutcome {
        loop {
            if self.state.stop_mode().is_immediate() {
                return RenderOutcome::Cancelled;
            }

            if self.state.is_paused() {
                if self.state.is_quit() {
                    // Input ended while paused: stop without presenting,
                    // queued frames are released at teardown
                    tracing::debug!(queued = self.queue.len(), "input ended while paused");
                    return RenderOutcome::Finished;
                }
                self.was_paused = true;
                std::thread::sleep(PAUSE_POLL_INTERVAL);
                continue;
            }
            if self.was_paused {
                self.was_paused = false;
                let position = self.state.position_secs();
                self.clock.rebase(position);
                tracing::debug!(position_secs = position, "resumed; clock rebased");
            }

            let frame = match self.pending.take() {
                Some(frame) => frame,
                None => match self.queue.pop(RENDER_POP_TIMEOUT) {
                    Some(frame) => frame,
                    // Nothing queued: either the producer is done, or this
                    // is a loop-reset gap and frames will follow.
                    None if self.state.is_quit() => return RenderOutcome::Finished,
                    None => continue,
                },
            };

            if self.segment != Some(frame.segment()) {
                self.start_segment(frame.segment());
            }
            self.apply_speed();

            let state = &self.state;
            let clock = &self.clock;
            let paced = clock.wait_for(frame.pts_secs(), || {
                state.is_paused()
                    || state.stop_mode().is_immediate()
                    || state.speed().value() != clock.speed()
            });
            if paced == PacingOutcome::Interrupted {
                self.pending = Some(frame);
                continue;
            }

            if let Err(err) = self.present(frame) {
                return RenderOutcome::Failed(err);
            }
        }
    }

    /// Anchors pacing at the first frame of a new segment.
    fn start_segment(&mut self, segment: u64) {
        if self.segment.is_some() {
            tracing::debug!(segment, "new segment; clock restarted");
        }
        self.segment = Some(segment);
        self.clock.restart();
        self.state.set_position_secs(0.0);
    }

    /// Picks up a speed change, rebasing at the current position so the
    /// next frame keeps its spacing from the last one presented.
    fn apply_speed(&self) {
        let speed = self.state.speed();
        if speed.value() != self.clock.speed() {
            self.clock.set_speed(speed);
            self.clock.rebase(self.state.position_secs());
            tracing::debug!(speed = speed.value(), "playback speed applied");
        }
    }

    fn present(&mut self, frame: DecodedFrame) -> Result<(), VideoError> {
        let pts = frame.pts_secs();
        if let Err(err) = self.sink.present(frame) {
            tracing::error!(pts, error = %err, "sink rejected frame");
            self.state.set_last_error(err.clone());
            self.state.request_quit(StopMode::Immediate);
            self.queue.wake_all();
            return Err(err);
        }

        self.state.set_position_secs(pts);
        let displayed = self.state.record_displayed();
        if displayed % PROGRESS_LOG_EVERY_FRAMES == 0 {
            let stats = self
                .state
                .snapshot(self.queue.len(), self.queue.capacity());
            tracing::debug!(%stats, "playback progress");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::video::{OverflowPolicy, QueueCapacity, SpeedRange};
    use crate::test_utils::{assert_abs_diff_eq, recording_sink, rgba_frame, Presented};
    use parking_lot::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Harness {
        queue: Arc<FrameQueue>,
        clock: Arc<PlaybackClock>,
        state: Arc<PlaybackState>,
    }

    impl Harness {
        fn new() -> Self {
            let state = Arc::new(PlaybackState::new(SpeedRange::default(), 1.0));
            let queue = Arc::new(FrameQueue::new(
                QueueCapacity::new(32),
                OverflowPolicy::Block,
                Arc::clone(&state),
            ));
            let clock = Arc::new(PlaybackClock::new(state.speed()));
            Self {
                queue,
                clock,
                state,
            }
        }

        fn worker<K: FrameSink>(&self, sink: K) -> RenderWorker<K> {
            RenderWorker::new(
                sink,
                Arc::clone(&self.queue),
                Arc::clone(&self.clock),
                Arc::clone(&self.state),
            )
        }
    }

    #[test]
    fn drains_queue_after_producer_finishes() {
        let harness = Harness::new();
        for i in 0..5 {
            harness.queue.push(rgba_frame(i, f64::from(i) * 0.01));
        }
        harness.state.request_quit(StopMode::Drain);

        let presented: Presented = Arc::new(Mutex::new(Vec::new()));
        let outcome = harness.worker(recording_sink(&presented)).run();

        assert_eq!(outcome, RenderOutcome::Finished);
        let tags: Vec<u8> = presented.lock().iter().map(|(tag, _, _)| *tag).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
        assert_eq!(harness.state.displayed(), 5);
        assert!((harness.state.position_secs() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn frames_are_paced_by_timestamp() {
        let harness = Harness::new();
        for i in 0..4 {
            harness.queue.push(rgba_frame(i, f64::from(i) * 0.03));
        }
        harness.state.request_quit(StopMode::Drain);

        let start = Instant::now();
        harness
            .worker(|_frame: DecodedFrame| -> Result<(), VideoError> { Ok(()) })
            .run();
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn new_segment_resets_position_and_anchor() {
        let harness = Harness::new();
        harness.queue.push(rgba_frame(0, 0.0));
        harness.queue.push(rgba_frame(1, 0.05));
        let mut looped = rgba_frame(2, 0.0);
        looped.set_segment(1);
        harness.queue.push(looped);
        harness.state.request_quit(StopMode::Drain);

        let positions = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let positions = Arc::clone(&positions);
            let state = Arc::clone(&harness.state);
            move |frame: DecodedFrame| -> Result<(), VideoError> {
                positions.lock().push((frame.segment(), state.position_secs()));
                Ok(())
            }
        };
        let start = Instant::now();
        harness.worker(sink).run();

        // The looped frame at pts 0 is due immediately after the restart
        assert!(start.elapsed() < Duration::from_millis(500));
        let seen = positions.lock().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (1, 0.0));
        assert_eq!(harness.state.position_secs(), 0.0);
    }

    #[test]
    fn sink_failure_is_fatal() {
        let harness = Harness::new();
        harness.queue.push(rgba_frame(0, 0.0));
        harness.queue.push(rgba_frame(1, 0.0));

        let outcome = harness
            .worker(|_frame: DecodedFrame| -> Result<(), VideoError> {
                Err(VideoError::SinkFailed("closed".into()))
            })
            .run();

        assert!(matches!(outcome, RenderOutcome::Failed(VideoError::SinkFailed(_))));
        assert_eq!(harness.state.stop_mode(), StopMode::Immediate);
        assert_eq!(harness.state.displayed(), 0);
        assert!(harness.state.last_error().is_some());
    }

    #[test]
    fn immediate_quit_interrupts_clock_wait() {
        let harness = Harness::new();
        harness.queue.push(rgba_frame(0, 0.0));
        harness.queue.push(rgba_frame(1, 60.0));

        let presented: Presented = Arc::new(Mutex::new(Vec::new()));
        let worker = harness.worker(recording_sink(&presented));
        let handle = thread::spawn(move || worker.run());

        while presented.lock().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));
        let signalled = Instant::now();
        harness.state.request_quit(StopMode::Immediate);
        harness.clock.wake_all();
        harness.queue.wake_all();

        assert_eq!(handle.join().unwrap(), RenderOutcome::Cancelled);
        assert!(signalled.elapsed() < Duration::from_millis(500));
        assert_eq!(presented.lock().len(), 1);
    }

    #[test]
    fn pause_holds_frames_until_resume() {
        let harness = Harness::new();
        let presented: Presented = Arc::new(Mutex::new(Vec::new()));
        let worker = harness.worker(recording_sink(&presented));
        let handle = thread::spawn(move || worker.run());

        harness.queue.push(rgba_frame(0, 0.0));
        while presented.lock().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }

        harness.state.set_paused(true);
        harness.clock.wake_all();
        harness.queue.push(rgba_frame(1, 0.05));
        thread::sleep(Duration::from_millis(150));
        assert_eq!(presented.lock().len(), 1);
        // Time spent paused does not move the position
        assert_abs_diff_eq!(harness.state.position_secs(), 0.0);

        let resumed = Instant::now();
        harness.state.set_paused(false);
        while harness.state.displayed() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        // Next frame keeps its 50 ms spacing from the last presented one
        let gap = resumed.elapsed();
        assert!(gap >= Duration::from_millis(35), "gap {gap:?}");
        assert!(gap < Duration::from_millis(400), "gap {gap:?}");
        assert_abs_diff_eq!(harness.state.position_secs(), 0.05, epsilon = 1e-6);

        harness.state.request_quit(StopMode::Immediate);
        harness.queue.wake_all();
        handle.join().unwrap();
    }

    #[test]
    fn drain_quit_while_paused_stops_worker() {
        let harness = Harness::new();
        for i in 0..3 {
            harness.queue.push(rgba_frame(i, f64::from(i) * 0.04));
        }
        harness.state.set_paused(true);

        let presented: Presented = Arc::new(Mutex::new(Vec::new()));
        let worker = harness.worker(recording_sink(&presented));
        let handle = thread::spawn(move || worker.run());
        thread::sleep(Duration::from_millis(30));

        let signalled = Instant::now();
        harness.state.request_quit(StopMode::Drain);

        assert_eq!(handle.join().unwrap(), RenderOutcome::Finished);
        assert!(signalled.elapsed() < Duration::from_millis(500));
        assert!(presented.lock().is_empty());
        assert_eq!(harness.queue.len(), 3);
    }
}
