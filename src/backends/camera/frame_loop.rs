// SPDX-License-Identifier: GPL-3.0-only
//! Dedicated execution contexts for the pipeline
//!
//! Both the capture context (acquire, convert, bridge, publish) and the render
//! context (consume, upload, draw) run as named threads driven by a
//! per-iteration closure. [`WorkerThread`] owns such a thread: it signals
//! stop, joins, and guarantees the closure never runs again once `stop()`
//! has returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Returned by the loop closure to control the thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// A named thread running a loop closure until told to stop
///
/// # Example
///
/// ```ignore
/// let mut worker = WorkerThread::spawn("capture-session", move || {
///     match queue.acquire(poll) {
///         Some(frame) => process(frame),
///         None => {}
///     }
///     LoopAction::Continue
/// });
///
/// // No iteration runs after this returns
/// worker.stop();
/// ```
pub struct WorkerThread {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl WorkerThread {
    /// Spawn a thread calling `loop_fn` until it returns `LoopAction::Stop`
    /// or `stop()` is called
    pub fn spawn<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Spawn a thread that first builds its state with `init_fn`
    ///
    /// State created by `init_fn` lives on the new thread only, which is how
    /// the render context keeps GPU objects off every other thread. If
    /// initialization fails the thread logs the error and exits without
    /// running the loop.
    pub fn spawn_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> std::io::Result<Self>
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting worker thread");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Worker thread started, initializing");

                let mut state = match init_fn() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Worker initialization failed");
                        return;
                    }
                };

                while !thread_stop.load(Ordering::SeqCst) {
                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                // State is dropped here, on the worker thread
                drop(state);
                info!(name = %thread_name, "Worker thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting worker stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and join the thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Join the thread without signalling it
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for worker thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Worker thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "WorkerThread dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerThread::spawn("test-loop", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
        .unwrap();

        worker.join();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_no_iteration_after_stop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerThread::spawn("test-stop", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        worker.stop();
        let after_stop = counter.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_init_state_is_passed_to_loop() {
        let result = Arc::new(AtomicU32::new(0));
        let result_clone = Arc::clone(&result);

        let mut worker = WorkerThread::spawn_with_init(
            "test-init",
            || Ok(42u32),
            move |state| {
                result_clone.store(*state, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_init_failure_skips_loop() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let mut worker = WorkerThread::spawn_with_init(
            "test-fail-init",
            || Err::<(), _>("no device".to_string()),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_stops_thread() {
        let worker = WorkerThread::spawn("test-drop", || {
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        })
        .unwrap();

        assert!(worker.is_running());
        drop(worker);
    }
}
