//! Focus/bounds monitor.
//!
//! A background thread asks a [`FocusProbe`] on a fixed interval whether the
//! target application is in front and where its main window sits, and
//! publishes the answer into a [`SharedFocus`] cell.  The monitor thread is
//! the only writer and the hook thread the only reader, so the hook may see
//! a state up to one poll interval old.
//!
//! Stopping is cooperative: [`FocusMonitorHandle::stop`] raises a flag and
//! unparks the thread, which finishes its current probe and exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use keyshim_core::{FocusState, SharedFocus};
use tracing::{debug, info, warn};

pub mod mock;

#[cfg(target_os = "macos")]
pub mod macos;

/// Errors produced by a focus probe.
#[derive(Debug, thiserror::Error)]
pub enum FocusError {
    #[error("window list unavailable")]
    WindowListUnavailable,
    #[error("focus probe failed: {0}")]
    Probe(String),
}

/// One-shot query of the foreground application and its window.
pub trait FocusProbe: Send {
    fn probe(&mut self) -> Result<FocusState, FocusError>;
}

/// Spawns and owns the monitor thread.
pub struct FocusMonitor;

impl FocusMonitor {
    /// Starts polling `probe` every `interval`.
    ///
    /// The first probe runs before this returns, so the cell is populated
    /// by the time the hook is installed.
    pub fn spawn(
        mut probe: Box<dyn FocusProbe>,
        focus: Arc<SharedFocus>,
        interval: Duration,
    ) -> std::io::Result<FocusMonitorHandle> {
        let mut last = publish_probe(probe.as_mut(), &focus, None);

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("keyshim-focus".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "focus monitor started");
                while thread_running.load(Ordering::SeqCst) {
                    thread::park_timeout(interval);
                    if !thread_running.load(Ordering::SeqCst) {
                        break;
                    }
                    last = publish_probe(probe.as_mut(), &focus, Some(last));
                }
                focus.publish(FocusState::inactive());
                info!("focus monitor stopped");
            })?;

        Ok(FocusMonitorHandle {
            running,
            thread: Some(thread),
        })
    }
}

/// Runs one probe and publishes its result.  A failing probe publishes the
/// inactive state so the hook falls back to passing everything through.
fn publish_probe(
    probe: &mut dyn FocusProbe,
    focus: &SharedFocus,
    previous: Option<FocusState>,
) -> FocusState {
    let state = match probe.probe() {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "focus probe failed, treating target as inactive");
            FocusState::inactive()
        }
    };
    if previous.map(|p| p.target_active) != Some(state.target_active) {
        info!(target_active = state.target_active, "target focus changed");
    } else if previous.map(|p| p.window_bounds) != Some(state.window_bounds) {
        debug!(bounds = ?state.window_bounds, "target window moved");
    }
    focus.publish(state);
    state
}

/// A running monitor.  Dropping the handle stops it.
pub struct FocusMonitorHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FocusMonitorHandle {
    /// Signals the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                warn!("focus monitor thread panicked");
            }
        }
    }
}

impl Drop for FocusMonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
