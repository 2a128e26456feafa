// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for frame presentation and snapshot export

use camera_pipeline::app::{DrawOutcome, FramePresenter, GpuBackend, SharedFrameSlot};
use camera_pipeline::errors::{PresentError, SnapshotError};
use std::path::PathBuf;
use std::sync::Arc;

/// Backend keeping the last uploaded pixels in memory
#[derive(Default)]
struct MemoryBackend {
    uploaded: Option<(Vec<u8>, u32, u32)>,
    viewport: (u32, u32),
    draws: u32,
}

impl GpuBackend for MemoryBackend {
    fn create_resources(&mut self) -> Result<(), PresentError> {
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn upload(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<(), PresentError> {
        self.uploaded = Some((rgba.to_vec(), width, height));
        Ok(())
    }

    fn draw(&mut self) -> Result<(), PresentError> {
        self.draws += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.uploaded = None;
    }
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "camera-pipeline-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// 3x2 gradient with distinct pixels
fn gradient_frame() -> Vec<u8> {
    (0..3 * 2)
        .flat_map(|i| [i as u8 * 40, 255 - i as u8 * 40, i as u8 * 10, 255])
        .collect()
}

#[test]
fn test_bad_length_is_rejected() {
    let slot = Arc::new(SharedFrameSlot::new());
    let mut presenter = FramePresenter::new(MemoryBackend::default(), Arc::clone(&slot));
    presenter.on_surface_created().unwrap();

    slot.publish(vec![0; 10], 2, 2);
    assert_eq!(
        presenter.on_draw_frame(),
        DrawOutcome::RejectedLength {
            expected: 16,
            actual: 10
        }
    );
    assert!(presenter.backend().uploaded.is_none());
    assert_eq!(presenter.frames_rejected(), 1);
    assert!(matches!(
        presenter.export_snapshot_to(&test_dir("rejected").join("out.png")),
        Err(SnapshotError::NoFrame)
    ));
}

#[test]
fn test_empty_slot_keeps_previous_frame() {
    let slot = Arc::new(SharedFrameSlot::new());
    let mut presenter = FramePresenter::new(MemoryBackend::default(), Arc::clone(&slot));

    slot.publish(gradient_frame(), 3, 2);
    assert_eq!(
        presenter.on_draw_frame(),
        DrawOutcome::Drawn {
            width: 3,
            height: 2
        }
    );
    assert_eq!(presenter.on_draw_frame(), DrawOutcome::SkippedEmpty);

    let (pixels, width, height) = presenter.backend().uploaded.clone().unwrap();
    assert_eq!((width, height), (3, 2));
    assert_eq!(pixels, gradient_frame());
    assert!(presenter.snapshot_handle().latest().is_some());
}

#[test]
fn test_viewport_independent_of_frame_size() {
    let slot = Arc::new(SharedFrameSlot::new());
    let mut presenter = FramePresenter::new(MemoryBackend::default(), Arc::clone(&slot));
    presenter.on_surface_changed(1920, 1080);

    slot.publish(gradient_frame(), 3, 2);
    assert!(matches!(
        presenter.on_draw_frame(),
        DrawOutcome::Drawn { .. }
    ));
    assert_eq!(presenter.backend().viewport, (1920, 1080));
}

#[test]
fn test_two_exports_decode_identically() {
    let dir = test_dir("exports");
    let slot = Arc::new(SharedFrameSlot::new());
    let mut presenter =
        FramePresenter::new(MemoryBackend::default(), Arc::clone(&slot)).with_snapshot_dir(&dir);

    slot.publish(gradient_frame(), 3, 2);
    presenter.on_draw_frame();

    let first = presenter.export_snapshot().unwrap();
    let second = presenter.export_snapshot().unwrap();
    assert_ne!(first, second);

    for path in [&first, &second] {
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("processed_"), "unexpected name {}", name);
        assert!(name.ends_with(".png"), "unexpected name {}", name);
    }

    let decoded_first = image::open(&first).unwrap().to_rgba8();
    let decoded_second = image::open(&second).unwrap().to_rgba8();
    assert_eq!(decoded_first.dimensions(), (3, 2));
    assert_eq!(decoded_first.as_raw(), decoded_second.as_raw());
    assert_eq!(decoded_first.as_raw(), &gradient_frame());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_snapshot_handle_exports_from_other_thread() {
    let dir = test_dir("handle");
    let slot = Arc::new(SharedFrameSlot::new());
    let mut presenter = FramePresenter::new(MemoryBackend::default(), Arc::clone(&slot));
    let handle = presenter.snapshot_handle();

    slot.publish(gradient_frame(), 3, 2);
    presenter.on_draw_frame();

    let target = dir.join("frame.png");
    let exported = std::thread::spawn(move || handle.export_to(&target))
        .join()
        .unwrap()
        .unwrap();
    assert!(exported.exists());

    let _ = std::fs::remove_dir_all(&dir);
}
