// SPDX-License-Identifier: GPL-3.0-only

//! Bounded acquisition queue between a sensor and the capture context
//!
//! Sensors push frames from whatever thread they deliver on; the capture
//! context acquires them. Depth and drop policy are explicit: with
//! [`DropPolicy::DropOldest`] a full queue evicts its oldest frame and the
//! consumer always acquires the newest one, discarding anything older. With
//! [`DropPolicy::DropNewest`] a full queue rejects the incoming frame and the
//! consumer takes frames in arrival order.
//!
//! Every frame that leaves the queue without being acquired is released
//! through its [`SensorFrame`] guard, outside the queue lock.

use super::types::{DropPolicy, SensorFrame};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// Result of pushing a frame into the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without displacing anything
    Queued,
    /// Queued after evicting the oldest frame
    EvictedOldest,
    /// The queue was full and the incoming frame was released
    Rejected,
    /// The queue is closed; the frame was released immediately
    Closed,
}

#[derive(Default)]
struct QueueState {
    frames: VecDeque<SensorFrame>,
    closed: bool,
    dropped: u64,
}

/// Bounded frame queue with an explicit drop policy
pub struct FrameQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    depth: usize,
    policy: DropPolicy,
}

impl FrameQueue {
    /// Create a queue holding at most `depth` frames (minimum 1)
    pub fn new(depth: usize, policy: DropPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            depth: depth.max(1),
            policy,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Offer a frame to the queue
    pub fn push(&self, frame: SensorFrame) -> PushOutcome {
        let mut discarded = None;
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                discarded = Some(frame);
                PushOutcome::Closed
            } else if state.frames.len() < self.depth {
                state.frames.push_back(frame);
                PushOutcome::Queued
            } else {
                state.dropped += 1;
                match self.policy {
                    DropPolicy::DropOldest => {
                        discarded = state.frames.pop_front();
                        state.frames.push_back(frame);
                        PushOutcome::EvictedOldest
                    }
                    DropPolicy::DropNewest => {
                        discarded = Some(frame);
                        PushOutcome::Rejected
                    }
                }
            }
        };

        // Release outside the lock
        drop(discarded);

        if matches!(outcome, PushOutcome::Queued | PushOutcome::EvictedOldest) {
            self.available.notify_one();
        }
        trace!(outcome = ?outcome, "Frame offered to acquisition queue");
        outcome
    }

    /// Wait up to `timeout` for a frame and acquire it according to the policy
    ///
    /// Returns `None` on timeout or once the queue is closed and empty.
    pub fn acquire(&self, timeout: Duration) -> Option<SensorFrame> {
        let mut state = self.lock();
        if state.frames.is_empty() && !state.closed {
            state = self
                .available
                .wait_timeout_while(state, timeout, |s| s.frames.is_empty() && !s.closed)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }

        match self.policy {
            DropPolicy::DropOldest => {
                let newest = state.frames.pop_back();
                let stale: Vec<SensorFrame> = state.frames.drain(..).collect();
                state.dropped += stale.len() as u64;
                drop(state);
                if !stale.is_empty() {
                    trace!(count = stale.len(), "Discarding stale frames");
                }
                drop(stale);
                newest
            }
            DropPolicy::DropNewest => state.frames.pop_front(),
        }
    }

    /// Close the queue and release every frame still held
    ///
    /// Frames pushed after this point are released immediately.
    pub fn close(&self) {
        let pending: Vec<SensorFrame> = {
            let mut state = self.lock();
            state.closed = true;
            state.frames.drain(..).collect()
        };
        debug!(pending = pending.len(), "Acquisition queue closed");
        drop(pending);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded by the policy (evicted, rejected or skipped as stale)
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

/// Producer handle a sensor uses to deliver frames
#[derive(Clone)]
pub struct FrameSink {
    queue: Arc<FrameQueue>,
}

impl FrameSink {
    pub fn new(queue: Arc<FrameQueue>) -> Self {
        Self { queue }
    }

    pub fn push(&self, frame: SensorFrame) -> PushOutcome {
        self.queue.push(frame)
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink")
            .field("depth", &self.queue.depth())
            .field("policy", &self.queue.policy())
            .finish()
    }
}
