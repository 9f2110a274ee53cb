// SPDX-License-Identifier: MPL-2.0
//! Bounded frame queue between the decode and render workers.
//!
//! The queue is the only place frames are handed across threads. Its
//! contents are mutated under a single mutex held just for the duration of
//! `push`/`pop`/`drain`; frames are moved in and out, never shared.
//!
//! # Overflow policies
//!
//! - [`OverflowPolicy::Block`]: the producer waits for a free slot
//!   (backpressure).
//! - [`OverflowPolicy::DropOldest`]: the head is evicted to make room for
//!   the new frame, counting one drop.
//!
//! Every wait is sliced so the quit signal is re-checked at least every
//! `QUIT_POLL_INTERVAL`, and [`FrameQueue::wake_all`] cuts the current slice
//! short.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::state::PlaybackState;
use crate::config::defaults::QUIT_POLL_INTERVAL;
use crate::domain::video::{DecodedFrame, OverflowPolicy, QueueCapacity};

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended without displacing anything.
    Queued,
    /// Appended after evicting the oldest frame.
    QueuedAfterEviction,
    /// Quit was observed while waiting for room; the frame was released.
    Rejected,
}

/// Capacity-limited FIFO of decoded frames.
#[derive(Debug)]
pub struct FrameQueue {
    frames: Mutex<VecDeque<DecodedFrame>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: QueueCapacity,
    policy: OverflowPolicy,
    state: Arc<PlaybackState>,
}

impl FrameQueue {
    /// Creates an empty queue observing `state` for quit and counting drops in it.
    #[must_use]
    pub fn new(capacity: QueueCapacity, policy: OverflowPolicy, state: Arc<PlaybackState>) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.value())),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
            state,
        }
    }

    /// Adds a frame at the tail according to the overflow policy.
    pub fn push(&self, frame: DecodedFrame) -> PushOutcome {
        let capacity = self.capacity.value();
        let mut frames = self.frames.lock();

        let evicted = match self.policy {
            OverflowPolicy::Block => {
                while frames.len() >= capacity {
                    if self.state.is_quit() {
                        drop(frames);
                        tracing::trace!(pts = frame.pts_secs(), "push rejected on quit");
                        return PushOutcome::Rejected;
                    }
                    let _ = self.not_full.wait_for(&mut frames, QUIT_POLL_INTERVAL);
                }
                None
            }
            OverflowPolicy::DropOldest => {
                if frames.len() >= capacity {
                    frames.pop_front()
                } else {
                    None
                }
            }
        };

        frames.push_back(frame);
        debug_assert!(frames.len() <= capacity);
        drop(frames);
        self.not_empty.notify_one();

        match evicted {
            Some(old) => {
                self.state.record_dropped();
                tracing::trace!(pts = old.pts_secs(), "evicted oldest frame");
                PushOutcome::QueuedAfterEviction
            }
            None => PushOutcome::Queued,
        }
    }

    /// Removes the head, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout, or once quit is raised and the queue is
    /// empty. Frames still queued after quit are handed out so a draining
    /// consumer can finish.
    pub fn pop(&self, timeout: Duration) -> Option<DecodedFrame> {
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                drop(frames);
                self.not_full.notify_one();
                return Some(frame);
            }
            if self.state.is_quit() {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let slice = (deadline - now).min(QUIT_POLL_INTERVAL);
            let _ = self.not_empty.wait_for(&mut frames, slice);
        }
    }

    /// Removes and releases every queued frame. Used at teardown.
    ///
    /// Returns the number of frames released.
    pub fn drain(&self) -> usize {
        let released: Vec<DecodedFrame> = self.frames.lock().drain(..).collect();
        self.not_full.notify_all();
        let count = released.len();
        if count > 0 {
            tracing::debug!(count, "released queued frames");
        }
        count
    }

    /// Wakes every producer and consumer blocked on the queue.
    pub fn wake_all(&self) {
        let _frames = self.frames.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.frames.lock().len() >= self.capacity.value()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.value()
    }

    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}
