//! Tray/UI bridge.
//!
//! The tray exposes exactly two actions to the user, "View log" and "Quit",
//! and needs one channel back from the session to show errors.  This module
//! defines both directions:
//!
//! - [`SessionControl`] is the handle the tray holds.  Its methods are safe
//!   to call from any thread; `quit()` only posts a message to the session
//!   loop, which owns teardown.
//! - [`TrayUi`] is what the session calls to surface a problem (for example
//!   a target application that could not be launched) without stopping.
//!
//! The native tray menu itself is out of scope; [`LogTrayUi`] is the headless
//! implementation used by the binary, and tests substitute their own.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::session::SessionEvent;

/// Opens a file with the user's default handler for its type.
#[cfg_attr(test, mockall::automock)]
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// [`FileOpener`] backed by the OS shell: `open` on macOS, `start` on
/// Windows and `xdg-open` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileOpener;

impl FileOpener for SystemFileOpener {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        let mut cmd = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        } else {
            Command::new("xdg-open")
        };
        cmd.arg(path).spawn().map(|_| ())
    }
}

/// Where the session reports problems the user should see.
pub trait TrayUi: Send + Sync {
    fn report_error(&self, message: &str);
}

/// Headless [`TrayUi`]: problems go to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrayUi;

impl TrayUi for LogTrayUi {
    fn report_error(&self, message: &str) {
        error!(message, "reported to user");
    }
}

/// Handle through which the tray (or a signal handler) drives the session.
#[derive(Clone)]
pub struct SessionControl {
    tx: Sender<SessionEvent>,
    log_path: PathBuf,
    opener: Arc<dyn FileOpener>,
}

impl SessionControl {
    pub fn new(tx: Sender<SessionEvent>, log_path: PathBuf, opener: Arc<dyn FileOpener>) -> Self {
        Self {
            tx,
            log_path,
            opener,
        }
    }

    /// Asks the session to tear down and exit.  Idempotent; calling it after
    /// the session has ended does nothing.
    pub fn quit(&self) {
        info!("quit requested");
        if self.tx.send(SessionEvent::Quit).is_err() {
            warn!("quit requested after session ended");
        }
    }

    /// Opens the log file with the default viewer.
    pub fn open_log_file(&self) -> std::io::Result<()> {
        info!(path = %self.log_path.display(), "opening log file");
        self.opener.open(&self.log_path)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
