// SPDX-License-Identifier: GPL-3.0-only

//! Render execution context
//!
//! Rendering is on demand: nothing is drawn on a clock. The capture side
//! requests a redraw after each publish, and redraw requests coalesce so at
//! most one is pending at a time. The GPU backend is created on the render
//! thread and never leaves it.

use super::frame_slot::SharedFrameSlot;
use super::presenter::{DrawOutcome, FramePresenter, GpuBackend, SnapshotHandle};
use crate::backends::camera::frame_loop::{LoopAction, WorkerThread};
use crate::constants::timing;
use crate::errors::{PresentError, SnapshotError};
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Callback the capture side invokes after each successful publish
pub type RedrawCallback = Arc<dyn Fn() + Send + Sync>;

enum RenderCommand {
    Redraw,
    SurfaceChanged(u32, u32),
    Shutdown,
}

/// Counters updated by the render thread
#[derive(Debug, Default)]
pub struct RenderStats {
    frames_drawn: AtomicU64,
    frames_rejected: AtomicU64,
}

impl RenderStats {
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected.load(Ordering::Relaxed)
    }
}

/// Options for [`spawn_render_loop`]
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Initial viewport
    pub viewport: (u32, u32),
    /// Where [`RenderHandle::snapshot`] writes files
    pub snapshot_dir: PathBuf,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: (
                crate::constants::pipeline::DEFAULT_WIDTH,
                crate::constants::pipeline::DEFAULT_HEIGHT,
            ),
            snapshot_dir: storage::default_snapshot_dir(),
        }
    }
}

struct RenderState<B: GpuBackend> {
    presenter: FramePresenter<B>,
    commands: mpsc::Receiver<RenderCommand>,
    redraw_pending: Arc<AtomicBool>,
    stats: Arc<RenderStats>,
}

impl<B: GpuBackend> RenderState<B> {
    fn draw(&mut self) {
        match self.presenter.on_draw_frame() {
            DrawOutcome::Drawn { width, height } => {
                let drawn = self.stats.frames_drawn.fetch_add(1, Ordering::Relaxed) + 1;
                if drawn % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(frames = drawn, width, height, "Render statistics");
                }
            }
            DrawOutcome::RejectedLength { .. } => {
                self.stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
            }
            outcome => trace!(outcome = ?outcome, "Draw skipped"),
        }
    }
}

/// Handle to the render thread
pub struct RenderHandle {
    commands: mpsc::Sender<RenderCommand>,
    redraw_pending: Arc<AtomicBool>,
    worker: WorkerThread,
    snapshots: SnapshotHandle,
    snapshot_dir: PathBuf,
    stats: Arc<RenderStats>,
}

/// Start the render thread
///
/// `make_backend` runs on the new thread. This call blocks until the backend
/// and its GPU resources exist, and fails if either could not be created.
pub fn spawn_render_loop<B, F>(
    make_backend: F,
    slot: Arc<SharedFrameSlot>,
    options: RenderOptions,
) -> Result<RenderHandle, PresentError>
where
    B: GpuBackend + 'static,
    F: FnOnce() -> Result<B, PresentError> + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);
    let redraw_pending = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(RenderStats::default());
    let snapshots = SnapshotHandle::default();

    let init_pending = Arc::clone(&redraw_pending);
    let init_stats = Arc::clone(&stats);
    let init_snapshots = snapshots.clone();
    let (width, height) = options.viewport;

    let init = move || -> Result<RenderState<B>, String> {
        let built = make_backend().and_then(|backend| {
            let mut presenter =
                FramePresenter::new(backend, slot).with_snapshot_handle(init_snapshots);
            presenter.on_surface_created()?;
            presenter.on_surface_changed(width, height);
            Ok(presenter)
        });

        let report = built.as_ref().map(|_| ()).map_err(|e| e.to_string());
        let _ = ready_tx.send(report.clone());
        report?;

        built
            .map(|presenter| RenderState {
                presenter,
                commands: command_rx,
                redraw_pending: init_pending,
                stats: init_stats,
            })
            .map_err(|e| e.to_string())
    };

    let poll = Duration::from_millis(timing::RENDER_POLL_MS);
    let mut worker = WorkerThread::spawn_with_init(
        "render-loop",
        init,
        move |state: &mut RenderState<B>| match state.commands.recv_timeout(poll) {
            Ok(RenderCommand::Redraw) => {
                // Clear first so a publish during this draw schedules another one
                state.redraw_pending.store(false, Ordering::SeqCst);
                state.draw();
                LoopAction::Continue
            }
            Ok(RenderCommand::SurfaceChanged(width, height)) => {
                state.presenter.on_surface_changed(width, height);
                state.draw();
                LoopAction::Continue
            }
            Ok(RenderCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                LoopAction::Stop
            }
            Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
        },
    )
    .map_err(|e| PresentError::GpuInit(format!("failed to spawn render thread: {}", e)))?;

    match ready_rx.recv_timeout(Duration::from_secs(timing::START_TIMEOUT_SECS)) {
        Ok(Ok(())) => {
            info!(width, height, "Render loop running");
            Ok(RenderHandle {
                commands: command_tx,
                redraw_pending,
                worker,
                snapshots,
                snapshot_dir: options.snapshot_dir,
                stats,
            })
        }
        Ok(Err(message)) => {
            worker.stop();
            Err(PresentError::GpuInit(message))
        }
        Err(_) => {
            worker.stop();
            Err(PresentError::GpuInit(
                "render thread did not report readiness".to_string(),
            ))
        }
    }
}

impl RenderHandle {
    /// Ask for one redraw; requests made while one is pending are merged
    pub fn request_redraw(&self) {
        request_redraw(&self.redraw_pending, &self.commands);
    }

    /// Redraw callback suitable for handing to the capture side
    pub fn redraw_callback(&self) -> RedrawCallback {
        let pending = Arc::clone(&self.redraw_pending);
        let commands = self.commands.clone();
        Arc::new(move || request_redraw(&pending, &commands))
    }

    /// The render target was resized
    pub fn surface_changed(&self, width: u32, height: u32) {
        let _ = self
            .commands
            .send(RenderCommand::SurfaceChanged(width, height));
    }

    /// Export the currently displayed frame into the snapshot directory
    pub fn snapshot(&self) -> Result<PathBuf, SnapshotError> {
        self.snapshots.export_in(&self.snapshot_dir)
    }

    /// Export the currently displayed frame to `path`
    pub fn snapshot_to(&self, path: &Path) -> Result<PathBuf, SnapshotError> {
        self.snapshots.export_to(path)
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the render thread; GPU objects are released on that thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(RenderCommand::Shutdown);
        self.worker.stop();
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn request_redraw(pending: &AtomicBool, commands: &mpsc::Sender<RenderCommand>) {
    if !pending.swap(true, Ordering::SeqCst) && commands.send(RenderCommand::Redraw).is_err() {
        // Render thread gone; allow a later request to retry
        pending.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend recording uploads into shared state so the test thread can see them
    #[derive(Clone, Default)]
    struct SharedLog {
        uploads: Arc<Mutex<Vec<(u32, u32)>>>,
        released: Arc<AtomicBool>,
    }

    struct LoggingBackend {
        log: SharedLog,
    }

    impl GpuBackend for LoggingBackend {
        fn create_resources(&mut self) -> Result<(), PresentError> {
            Ok(())
        }
        fn set_viewport(&mut self, _width: u32, _height: u32) {}
        fn upload(&mut self, _rgba: &[u8], width: u32, height: u32) -> Result<(), PresentError> {
            self.log.uploads.lock().unwrap().push((width, height));
            Ok(())
        }
        fn draw(&mut self) -> Result<(), PresentError> {
            Ok(())
        }
        fn release(&mut self) {
            self.log.released.store(true, Ordering::SeqCst);
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn options() -> RenderOptions {
        RenderOptions {
            viewport: (64, 48),
            snapshot_dir: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_redraw_draws_published_frame() {
        let log = SharedLog::default();
        let backend_log = log.clone();
        let slot = Arc::new(SharedFrameSlot::new());

        let handle = spawn_render_loop(
            move || Ok(LoggingBackend { log: backend_log }),
            Arc::clone(&slot),
            options(),
        )
        .unwrap();

        slot.publish(vec![9; 2 * 2 * 4], 2, 2);
        handle.request_redraw();

        assert!(wait_for(|| handle.stats().frames_drawn() == 1));
        assert_eq!(log.uploads.lock().unwrap().as_slice(), &[(2, 2)]);
        assert!(handle.snapshot_handle().latest().is_some());

        handle.shutdown();
        assert!(log.released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let slot = Arc::new(SharedFrameSlot::new());
        let result = spawn_render_loop(
            || Err::<LoggingBackend, _>(PresentError::GpuInit("no adapter".to_string())),
            slot,
            options(),
        );
        match result {
            Err(PresentError::GpuInit(message)) => assert!(message.contains("no adapter")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("render loop should not start"),
        }
    }

    #[test]
    fn test_redraw_callback_coalesces() {
        let log = SharedLog::default();
        let backend_log = log.clone();
        let slot = Arc::new(SharedFrameSlot::new());
        let handle = spawn_render_loop(
            move || Ok(LoggingBackend { log: backend_log }),
            Arc::clone(&slot),
            options(),
        )
        .unwrap();

        let redraw = handle.redraw_callback();
        for _ in 0..50 {
            redraw();
        }
        slot.publish(vec![1; 16], 2, 2);
        redraw();

        assert!(wait_for(|| handle.stats().frames_drawn() == 1));
        // One frame was published, so exactly one upload happened
        assert_eq!(log.uploads.lock().unwrap().len(), 1);
    }
}
