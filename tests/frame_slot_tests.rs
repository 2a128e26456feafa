// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the shared frame slot

use camera_pipeline::SharedFrameSlot;
use std::sync::Arc;
use std::thread;

#[test]
fn test_consume_on_empty_slot() {
    let slot = SharedFrameSlot::new();
    assert!(slot.consume_latest().is_none());
}

#[test]
fn test_last_writer_wins() {
    let slot = SharedFrameSlot::new();
    slot.publish(vec![1; 2 * 2 * 4], 2, 2);
    slot.publish(vec![2; 4 * 2 * 4], 4, 2);

    let frame = slot.consume_latest().expect("a frame was published");
    assert_eq!((frame.width, frame.height), (4, 2));
    assert!(frame.data.iter().all(|&b| b == 2));

    // The first frame was discarded, not queued
    assert!(slot.consume_latest().is_none());
    assert_eq!(slot.publish_count(), 2);
}

#[test]
fn test_publish_visible_across_threads() {
    let slot = Arc::new(SharedFrameSlot::new());
    let producer_slot = Arc::clone(&slot);

    thread::spawn(move || producer_slot.publish(vec![7; 16], 2, 2))
        .join()
        .unwrap();

    let frame = slot.consume_latest().unwrap();
    assert_eq!(frame.data, vec![7; 16]);
}

#[test]
fn test_consumer_keeps_frame_after_new_publish() {
    let slot = SharedFrameSlot::new();
    slot.publish(vec![1; 16], 2, 2);
    let held = slot.consume_latest().unwrap();

    slot.publish(vec![2; 16], 2, 2);
    assert!(held.data.iter().all(|&b| b == 1));
    assert!(slot.consume_latest().unwrap().data.iter().all(|&b| b == 2));
}
