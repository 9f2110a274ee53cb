// SPDX-License-Identifier: MPL-2.0
//! Decode worker: pulls from the source, normalizes and queues frames.
//!
//! The worker is an explicit state machine driven by a single dispatch
//! loop:
//!
//! ```text
//! Opening -> Streaming -> EndOfStream -> LoopReset -> Streaming
//!                 |             |
//!                 +-------------+-----> Stopped
//! ```
//!
//! It runs on its own thread and is the only producer of the frame queue.
//! Quit is checked before each unit is pulled and before each frame is
//! queued; a push rejected on quit ends the worker.

use std::sync::Arc;
use std::time::Duration;

use crate::application::port::{FrameSource, SourceRead};
use crate::config::defaults::PAUSE_POLL_INTERVAL;
use crate::domain::video::{DecodedFrame, FrameOrigin, StopMode};
use crate::error::VideoError;

use super::frame_queue::{FrameQueue, PushOutcome};
use super::normalizer::FrameNormalizer;
use super::state::PlaybackState;
use super::WorkerOutcome;

/// How the decode worker ended.
pub type DecodeOutcome = WorkerOutcome;

/// States of the decode worker.
#[derive(Debug)]
enum DecodeState {
    Opening,
    Streaming,
    EndOfStream,
    LoopReset,
    Stopped(DecodeOutcome),
}

/// Producer side of the pipeline.
pub struct DecodeWorker<S: FrameSource> {
    source: S,
    normalizer: FrameNormalizer,
    queue: Arc<FrameQueue>,
    state: Arc<PlaybackState>,
    loop_playback: bool,
    segment: u64,
    /// Frames queued since the last loop reset.
    queued_in_segment: u64,
}

impl<S: FrameSource> DecodeWorker<S> {
    pub fn new(
        source: S,
        normalizer: FrameNormalizer,
        queue: Arc<FrameQueue>,
        state: Arc<PlaybackState>,
        loop_playback: bool,
    ) -> Self {
        let segment = state.segment();
        Self {
            source,
            normalizer,
            queue,
            state,
            loop_playback,
            segment,
            queued_in_segment: 0,
        }
    }

    /// Runs until end of stream, a fatal error, or quit.
    ///
    /// Unless cancelled, the worker raises quit in drain mode on exit so the
    /// render worker presents what is left and stops.
    pub fn run(mut self) -> DecodeOutcome {
        let mut current = DecodeState::Opening;
        loop {
            current = match current {
                DecodeState::Opening => self.open(),
                DecodeState::Streaming => self.stream(),
                DecodeState::EndOfStream => self.end_of_stream(),
                DecodeState::LoopReset => self.loop_reset(),
                DecodeState::Stopped(outcome) => return self.stop(outcome),
            };
        }
    }

    fn open(&mut self) -> DecodeState {
        let duration = self.source.duration();
        self.state.set_duration(duration);
        tracing::info!(
            duration_secs = duration.map(|d| d.as_secs_f64()),
            loop_playback = self.loop_playback,
            "decode worker started"
        );
        DecodeState::Streaming
    }

    fn stream(&mut self) -> DecodeState {
        if self.state.is_quit() {
            return DecodeState::Stopped(DecodeOutcome::Cancelled);
        }
        match self.source.next_unit() {
            Ok(SourceRead::Unit(unit)) => match self.source.decode(unit) {
                Ok(frames) => self.deliver(frames, DecodeState::Streaming),
                // Only frames are counted as dropped; a unit may carry none
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "skipping undecodable unit");
                    DecodeState::Streaming
                }
                Err(err) => self.fail(err),
            },
            Ok(SourceRead::EndOfStream) => DecodeState::EndOfStream,
            Err(err) => self.fail(err),
        }
    }

    fn end_of_stream(&mut self) -> DecodeState {
        let next = if self.loop_playback {
            DecodeState::LoopReset
        } else {
            DecodeState::Stopped(DecodeOutcome::Finished)
        };
        match self.source.end_of_input() {
            Ok(frames) => self.deliver(frames, next),
            Err(err) => self.fail(err),
        }
    }

    fn loop_reset(&mut self) -> DecodeState {
        if self.state.is_quit() {
            return DecodeState::Stopped(DecodeOutcome::Cancelled);
        }
        if self.queued_in_segment == 0 {
            tracing::warn!("source produced no frames; not looping");
            return DecodeState::Stopped(DecodeOutcome::Finished);
        }
        self.source.flush();
        if let Err(err) = self.source.seek(Duration::ZERO) {
            return self.fail(err);
        }
        self.segment = self.state.begin_segment();
        self.queued_in_segment = 0;
        tracing::info!(segment = self.segment, loops = self.state.loops(), "looping playback");
        DecodeState::Streaming
    }

    fn stop(&self, outcome: DecodeOutcome) -> DecodeOutcome {
        if !matches!(outcome, DecodeOutcome::Cancelled) {
            self.state.request_quit(StopMode::Drain);
            self.queue.wake_all();
        }
        let stats = self.normalizer.stats();
        tracing::info!(
            ?outcome,
            decoded = self.state.decoded(),
            converted = stats.converted,
            passthrough = stats.passthrough,
            failed = stats.failed,
            context_rebuilds = stats.context_rebuilds,
            "decode worker stopped"
        );
        outcome
    }

    fn fail(&self, err: VideoError) -> DecodeState {
        tracing::error!(error = %err, "decode worker failed");
        self.state.set_last_error(err.clone());
        DecodeState::Stopped(DecodeOutcome::Failed(err))
    }

    /// Normalizes and queues frames, returning `next` unless quit interrupts.
    fn deliver(&mut self, frames: Vec<DecodedFrame>, next: DecodeState) -> DecodeState {
        for frame in frames {
            if self.state.is_quit() {
                return DecodeState::Stopped(DecodeOutcome::Cancelled);
            }
            self.state.record_decoded();
            if frame.origin() == FrameOrigin::Foreign {
                self.state.record_foreign();
            }

            let Some(mut frame) = self.normalizer.normalize(frame) else {
                self.state.record_dropped();
                continue;
            };
            frame.set_segment(self.segment);

            if !self.wait_while_paused_and_full() {
                return DecodeState::Stopped(DecodeOutcome::Cancelled);
            }
            if self.queue.push(frame) == PushOutcome::Rejected {
                return DecodeState::Stopped(DecodeOutcome::Cancelled);
            }
            self.queued_in_segment += 1;
        }
        next
    }

    /// Holds the next frame while paused with a full queue, so nothing is
    /// evicted during a pause. Returns false if quit was raised meanwhile.
    fn wait_while_paused_and_full(&self) -> bool {
        loop {
            if self.state.is_quit() {
                return false;
            }
            if !(self.state.is_paused() && self.queue.is_full()) {
                return true;
            }
            std::thread::sleep(PAUSE_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::video::{OverflowPolicy, QueueCapacity, SpeedRange};
    use crate::test_utils::{assert_abs_diff_eq, ScriptedSource};
    use std::thread;
    use std::time::Instant;

    fn setup(capacity: usize, policy: OverflowPolicy) -> (Arc<FrameQueue>, Arc<PlaybackState>) {
        let state = Arc::new(PlaybackState::new(SpeedRange::default(), 1.0));
        let queue = Arc::new(FrameQueue::new(
            QueueCapacity::new(capacity),
            policy,
            Arc::clone(&state),
        ));
        (queue, state)
    }

    fn worker(
        source: ScriptedSource,
        queue: &Arc<FrameQueue>,
        state: &Arc<PlaybackState>,
        loop_playback: bool,
    ) -> DecodeWorker<ScriptedSource> {
        DecodeWorker::new(
            source,
            FrameNormalizer::default(),
            Arc::clone(queue),
            Arc::clone(state),
            loop_playback,
        )
    }

    fn drain_segments(queue: &FrameQueue) -> Vec<(f64, u64)> {
        std::iter::from_fn(|| queue.pop(Duration::ZERO))
            .map(|frame| (frame.pts_secs(), frame.segment()))
            .collect()
    }

    #[test]
    fn finishes_and_raises_drain_quit() {
        let (queue, state) = setup(10, OverflowPolicy::Block);
        let outcome = worker(ScriptedSource::new(5, 0.04), &queue, &state, false).run();

        assert_eq!(outcome, DecodeOutcome::Finished);
        assert_eq!(state.stop_mode(), StopMode::Drain);
        assert_eq!(state.decoded(), 5);
        assert_eq!(queue.len(), 5);
        assert_abs_diff_eq!(state.duration_secs().unwrap(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn drop_oldest_counts_evictions() {
        let (queue, state) = setup(10, OverflowPolicy::DropOldest);
        worker(ScriptedSource::new(15, 0.04), &queue, &state, false).run();

        assert_eq!(state.decoded(), 15);
        assert_eq!(state.dropped(), 5);
        assert_eq!(queue.len(), 10);
    }

    #[test]
    fn decode_error_is_fatal() {
        let (queue, state) = setup(10, OverflowPolicy::Block);
        let mut source = ScriptedSource::new(5, 0.04);
        source.fail_decode_at = Some(2);
        let outcome = worker(source, &queue, &state, false).run();

        assert!(matches!(
            outcome,
            DecodeOutcome::Failed(VideoError::DecodingFailed(_))
        ));
        assert!(matches!(
            state.last_error(),
            Some(VideoError::DecodingFailed(_))
        ));
        assert_eq!(state.stop_mode(), StopMode::Drain);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn loop_reset_starts_new_segment() {
        let (queue, state) = setup(64, OverflowPolicy::Block);
        let stopper = {
            let state = Arc::clone(&state);
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                while state.loops() < 2 {
                    thread::sleep(Duration::from_millis(1));
                }
                state.request_quit(StopMode::Immediate);
                queue.wake_all();
            })
        };
        let outcome = worker(ScriptedSource::new(3, 0.04), &queue, &state, true).run();
        stopper.join().unwrap();

        assert_eq!(outcome, DecodeOutcome::Cancelled);
        let frames = drain_segments(&queue);
        let segments: Vec<u64> = frames.iter().map(|(_, segment)| *segment).collect();
        assert_eq!(&segments[..4], &[0, 0, 0, 1]);
        assert_eq!(frames[3].0, 0.0);
        assert!(segments.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn failed_loop_seek_stops_playback() {
        let (queue, state) = setup(10, OverflowPolicy::Block);
        let mut source = ScriptedSource::new(2, 0.04);
        source.fail_seek = true;
        let outcome = worker(source, &queue, &state, true).run();

        assert!(matches!(
            outcome,
            DecodeOutcome::Failed(VideoError::SeekFailed(_))
        ));
        assert_eq!(state.loops(), 0);
        assert_eq!(state.stop_mode(), StopMode::Drain);
    }

    #[test]
    fn empty_source_does_not_loop_forever() {
        let (queue, state) = setup(10, OverflowPolicy::Block);
        let outcome = worker(ScriptedSource::new(0, 0.04), &queue, &state, true).run();
        assert_eq!(outcome, DecodeOutcome::Finished);
        assert_eq!(state.loops(), 0);
    }

    #[test]
    fn quit_cancels_blocked_producer() {
        let (queue, state) = setup(2, OverflowPolicy::Block);
        let handle = {
            let queue = Arc::clone(&queue);
            let state = Arc::clone(&state);
            thread::spawn(move || worker(ScriptedSource::new(50, 0.04), &queue, &state, false).run())
        };
        while queue.len() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        let signalled = Instant::now();
        state.request_quit(StopMode::Immediate);
        queue.wake_all();

        assert_eq!(handle.join().unwrap(), DecodeOutcome::Cancelled);
        assert!(signalled.elapsed() < Duration::from_millis(500));
        assert_eq!(state.stop_mode(), StopMode::Immediate);
    }

    #[test]
    fn paused_producer_does_not_evict() {
        let (queue, state) = setup(3, OverflowPolicy::DropOldest);
        state.set_paused(true);
        let handle = {
            let queue = Arc::clone(&queue);
            let state = Arc::clone(&state);
            thread::spawn(move || worker(ScriptedSource::new(10, 0.04), &queue, &state, false).run())
        };
        while queue.len() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(40));
        assert_eq!(state.dropped(), 0);
        assert_eq!(state.decoded(), 4);

        state.request_quit(StopMode::Immediate);
        assert_eq!(handle.join().unwrap(), DecodeOutcome::Cancelled);
    }

    #[test]
    fn recoverable_unit_error_is_skipped_without_counting_a_drop() {
        let (queue, state) = setup(10, OverflowPolicy::Block);
        let mut source = ScriptedSource::new(4, 0.04);
        source.skip_unit_at = Some(2);

        let outcome = worker(source, &queue, &state, false).run();

        assert_eq!(outcome, DecodeOutcome::Finished);
        assert_eq!(state.decoded(), 3);
        assert_eq!(state.dropped(), 0);
        assert_eq!(queue.len(), 3);
        assert!(state.last_error().is_none());
    }
}
