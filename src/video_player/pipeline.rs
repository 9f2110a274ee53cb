// SPDX-License-Identifier: MPL-2.0
//! Pipeline assembly: builds the shared state and runs both workers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::application::port::{FrameSink, FrameSource};
use crate::config::PipelineConfig;
use crate::error::{Error, Result, VideoError};

use super::control::PlaybackControl;
use super::decoder::{DecodeOutcome, DecodeWorker};
use super::frame_queue::FrameQueue;
use super::normalizer::FrameNormalizer;
use super::renderer::{RenderOutcome, RenderWorker};
use super::state::{PlaybackState, PlaybackStats};
use super::sync::PlaybackClock;
use super::WorkerOutcome;

const DECODE_THREAD_NAME: &str = "frame-pacer-decode";
const RENDER_THREAD_NAME: &str = "frame-pacer-render";

/// How a playback run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSummary {
    pub decode: DecodeOutcome,
    pub render: RenderOutcome,
    /// Counters after both workers exited, before the queue was drained.
    pub stats: PlaybackStats,
    /// Frames still queued at teardown.
    pub released: usize,
}

/// A running decode/render pipeline.
///
/// Dropping a pipeline that was not joined quits and joins it.
#[derive(Debug)]
pub struct Pipeline {
    control: PlaybackControl,
    queue: Arc<FrameQueue>,
    decode: Option<JoinHandle<DecodeOutcome>>,
    render: Option<JoinHandle<RenderOutcome>>,
}

impl Pipeline {
    /// Validates `config`, builds the pipeline and starts both workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration (nothing is
    /// started) and [`Error::Io`] if a worker thread cannot be spawned.
    pub fn start<S, K>(config: &PipelineConfig, source: S, sink: K) -> Result<Self>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        config.validate()?;
        let speed_range = config.speed_range()?;
        let layout = config.canonical_layout()?;

        let state = Arc::new(PlaybackState::new(speed_range, config.initial_speed));
        state.set_duration(source.duration());
        let queue = Arc::new(FrameQueue::new(
            config.capacity(),
            config.overflow_policy,
            Arc::clone(&state),
        ));
        let clock = Arc::new(PlaybackClock::new(state.speed()));
        let control = PlaybackControl::new(Arc::clone(&state), Arc::clone(&queue), Arc::clone(&clock));

        let decoder = DecodeWorker::new(
            source,
            FrameNormalizer::new(layout),
            Arc::clone(&queue),
            Arc::clone(&state),
            config.loop_playback,
        );
        let renderer = RenderWorker::new(sink, Arc::clone(&queue), clock, Arc::clone(&state));

        tracing::info!(
            capacity = queue.capacity(),
            policy = ?queue.policy(),
            loop_playback = config.loop_playback,
            speed = state.speed().value(),
            format = %layout.format(),
            "starting playback pipeline"
        );

        let decode = spawn_worker(DECODE_THREAD_NAME, &control, move || decoder.run())?;
        let render = match spawn_worker(RENDER_THREAD_NAME, &control, move || renderer.run()) {
            Ok(handle) => handle,
            Err(err) => {
                control.quit();
                let _ = decode.join();
                queue.drain();
                return Err(err);
            }
        };

        Ok(Self {
            control,
            queue,
            decode: Some(decode),
            render: Some(render),
        })
    }

    /// A handle for pausing, changing speed, quitting and reading stats.
    #[must_use]
    pub fn control(&self) -> PlaybackControl {
        self.control.clone()
    }

    /// Waits for both workers to finish and tears the queue down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Video`] with the first fatal error raised during
    /// playback.
    pub fn join(mut self) -> Result<PlaybackSummary> {
        self.finish()
    }

    /// Quits immediately, then joins.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub fn shutdown(self) -> Result<PlaybackSummary> {
        self.control.quit();
        self.join()
    }

    fn finish(&mut self) -> Result<PlaybackSummary> {
        let decode = join_worker(self.decode.take(), DECODE_THREAD_NAME);
        let render = join_worker(self.render.take(), RENDER_THREAD_NAME);
        let stats = self.control.stats();
        let released = self.queue.drain();

        tracing::info!(
            %stats,
            displayed = stats.displayed,
            loops = stats.loops,
            foreign_frames = stats.foreign_frames,
            released,
            "playback finished"
        );

        for outcome in [&decode, &render] {
            if let WorkerOutcome::Failed(err) = outcome {
                return Err(Error::Video(err.clone()));
            }
        }
        Ok(PlaybackSummary {
            decode,
            render,
            stats,
            released,
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.decode.is_some() || self.render.is_some() {
            self.control.quit();
            let _ = self.finish();
        }
    }
}

/// Quits the pipeline if a worker thread unwinds, so its peer never waits
/// on a producer or consumer that is gone.
struct WorkerGuard {
    control: PlaybackControl,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.control.quit();
        }
        self.control.state().worker_exited();
    }
}

fn spawn_worker<T, F>(name: &str, control: &PlaybackControl, work: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    control.state().worker_started();
    let guard = WorkerGuard {
        control: control.clone(),
    };
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _guard = guard;
            work()
        })
        .map_err(|err| {
            // The closure (and its guard) was dropped without running
            tracing::error!(thread = name, error = %err, "failed to spawn worker");
            Error::Io(err.to_string())
        })
}

fn join_worker(handle: Option<JoinHandle<WorkerOutcome>>, name: &str) -> WorkerOutcome {
    match handle.map(JoinHandle::join) {
        Some(Ok(outcome)) => outcome,
        Some(Err(_)) => {
            tracing::error!(thread = name, "worker panicked");
            WorkerOutcome::Failed(VideoError::Other(format!("{name} panicked")))
        }
        None => WorkerOutcome::Cancelled,
    }
}
