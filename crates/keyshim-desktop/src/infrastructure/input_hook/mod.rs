//! System-wide input hooks.
//!
//! On macOS this installs a `CGEventTap`; on Windows a `WH_KEYBOARD_LL`
//! hook.  Either way the hook runs on a dedicated thread with its own run
//! loop / message loop, and every event is handed synchronously to a
//! [`HookCallbacks`] value that lives on that thread.
//!
//! # The hook callback is on the system input path
//!
//! The OS waits for the callback before delivering the event anywhere else.
//! A slow callback stalls typing system-wide, and macOS will disable a tap
//! that takes too long.  The callbacks therefore never block: the focus state
//! is read with a non-blocking lock and the decision engine does only table
//! lookups and event posting.
//!
//! # Testability
//!
//! [`PlatformHook`] lets the session run against [`mock::MockHook`], which
//! feeds synthetic events straight into the installed callbacks.

use std::panic;
use std::sync::Arc;
use std::thread::JoinHandle;

use keyshim_core::{Decision, DecisionEngine, InputEvent, SharedFocus};
use tracing::{error, warn};

pub mod mock;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

/// Error type for hook installation and removal.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to install input hook: {0}")]
    InstallFailed(String),
    #[error("input hook thread panicked")]
    ThreadPanicked,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// What the hook thread calls for each intercepted event.
pub trait HookCallbacks: Send {
    /// Decides the fate of a keyboard event.
    fn on_key(&mut self, event: &InputEvent) -> Decision;

    /// Returns a warp target if the pointer at `(x, y)` must be pulled back.
    fn on_mouse_move(&mut self, x: f64, y: f64) -> Option<(f64, f64)>;

    /// Called once on the hook thread right before the hook goes away.
    fn on_uninstall(&mut self) {}
}

/// Installs a system-wide hook that feeds events into callbacks.
pub trait PlatformHook: Send {
    /// Installs the hook.  Returns once the hook is live, or with the error
    /// that prevented it.
    fn install(&self, callbacks: Box<dyn HookCallbacks>) -> Result<HookHandle, HookError>;

    /// Whether this hook delivers mouse-move events to
    /// [`HookCallbacks::on_mouse_move`].
    fn supports_mouse_clip(&self) -> bool {
        false
    }
}

/// A live hook.  Dropping the handle uninstalls it.
pub struct HookHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
    thread: Option<JoinHandle<()>>,
}

impl HookHandle {
    /// `stop` must make the hook thread leave its loop; the thread (if any)
    /// is joined afterwards.
    pub fn new(stop: impl FnOnce() + Send + 'static, thread: Option<JoinHandle<()>>) -> Self {
        Self {
            stop: Some(Box::new(stop)),
            thread,
        }
    }

    /// Removes the hook and waits for its thread to finish.
    pub fn uninstall(mut self) -> Result<(), HookError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), HookError> {
        if let Some(stop) = self.stop.take() {
            stop();
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| HookError::ThreadPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "input hook did not shut down cleanly");
        }
    }
}

/// The production callbacks: the decision engine plus the focus cell it is
/// gated on.
pub struct EngineCallbacks {
    engine: DecisionEngine,
    focus: Arc<SharedFocus>,
    /// Horizontal pointer margin; `None` disables clipping.
    clip_margin: Option<f64>,
}

impl EngineCallbacks {
    pub fn new(engine: DecisionEngine, focus: Arc<SharedFocus>, clip_margin: Option<f64>) -> Self {
        Self {
            engine,
            focus,
            clip_margin,
        }
    }
}

impl HookCallbacks for EngineCallbacks {
    fn on_key(&mut self, event: &InputEvent) -> Decision {
        let focus = self.focus.current();
        self.engine.handle(event, &focus)
    }

    /// A panic while clipping leaves the pointer where it is.
    fn on_mouse_move(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let margin = self.clip_margin?;
        let focus = self.focus.current();
        match panic::catch_unwind(|| focus.clip_pointer(x, y, margin)) {
            Ok(warp) => warp,
            Err(_) => {
                error!(x, y, margin, "pointer clipping panicked; leaving pointer in place");
                None
            }
        }
    }

    fn on_uninstall(&mut self) {
        if let Err(e) = self.engine.release_held() {
            warn!(error = %e, "could not release injected keys on shutdown");
        }
    }
}
