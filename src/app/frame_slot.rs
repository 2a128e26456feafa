// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot, last-writer-wins hand-off between the capture and render threads

use crate::backends::camera::types::ProcessedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Latest processed frame, replaced on every publish
///
/// The lock only guards swapping an `Arc` in or out, so neither side ever
/// waits on the other's pixel work. A consumer sees either the previous
/// frame or the new one in full, never a mix. Frames published between two
/// consumes are dropped; only the most recent one is visible.
#[derive(Default)]
pub struct SharedFrameSlot {
    latest: Mutex<Option<Arc<ProcessedFrame>>>,
    publishes: AtomicU64,
}

impl SharedFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<ProcessedFrame>>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install `buffer` as the latest frame, discarding any unconsumed one
    pub fn publish(&self, buffer: Vec<u8>, width: u32, height: u32) {
        let frame = Arc::new(ProcessedFrame::new(buffer, width, height));
        let previous = self.lock().replace(frame);
        self.publishes.fetch_add(1, Ordering::Release);
        // Free the superseded frame outside the lock
        drop(previous);
    }

    /// Take the latest frame, leaving the slot empty
    pub fn consume_latest(&self) -> Option<Arc<ProcessedFrame>> {
        self.lock().take()
    }

    /// Dimensions of the unconsumed frame, if any
    pub fn peek_dimensions(&self) -> Option<(u32, u32)> {
        self.lock().as_ref().map(|f| (f.width, f.height))
    }

    /// Drop any unconsumed frame
    pub fn clear(&self) {
        let previous = self.lock().take();
        drop(previous);
    }

    /// Total number of publishes since creation
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SharedFrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFrameSlot")
            .field("pending", &self.peek_dimensions())
            .field("publishes", &self.publish_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot = SharedFrameSlot::new();
        assert!(slot.consume_latest().is_none());
        assert_eq!(slot.peek_dimensions(), None);
        assert_eq!(slot.publish_count(), 0);
    }

    #[test]
    fn test_consume_takes_frame() {
        let slot = SharedFrameSlot::new();
        slot.publish(vec![1; 16], 2, 2);
        assert_eq!(slot.peek_dimensions(), Some((2, 2)));

        let frame = slot.consume_latest().unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert!(slot.consume_latest().is_none());
    }

    #[test]
    fn test_clear() {
        let slot = SharedFrameSlot::new();
        slot.publish(vec![1; 16], 2, 2);
        slot.clear();
        assert!(slot.consume_latest().is_none());
        assert_eq!(slot.publish_count(), 1);
    }

    #[test]
    fn test_concurrent_frames_are_never_mixed() {
        // Each frame is filled with a single byte value; a torn frame would mix values
        let slot = Arc::new(SharedFrameSlot::new());
        let producer_slot = Arc::clone(&slot);

        let producer = std::thread::spawn(move || {
            for value in 0..200u32 {
                producer_slot.publish(vec![value as u8; 64 * 64 * 4], 64, 64);
            }
        });

        let mut seen = 0;
        while !producer.is_finished() || slot.peek_dimensions().is_some() {
            if let Some(frame) = slot.consume_latest() {
                let first = frame.data[0];
                assert!(frame.data.iter().all(|&b| b == first));
                seen += 1;
            }
        }
        producer.join().unwrap();
        assert!(seen >= 1);
        assert_eq!(slot.publish_count(), 200);
    }
}
