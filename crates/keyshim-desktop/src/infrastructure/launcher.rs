//! Target application launcher (client mode).
//!
//! [`TargetLauncher::launch_and_wait`] starts the target and blocks until it
//! exits, returning its exit code.  It is always called from its own thread
//! so the hook and the tray stay responsive.  [`TargetLauncher::terminate`]
//! may be called from any other thread while the launch is in progress.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failure to start, wait for, or stop the target application.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no target application path configured")]
    MissingPath,

    #[error("cannot find target application at {0}")]
    NotFound(PathBuf),

    #[error("failed to start {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for target application: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to terminate target application: {0}")]
    Terminate(String),
}

/// Starts and stops the target application.
#[cfg_attr(test, mockall::automock)]
pub trait TargetLauncher: Send + Sync {
    /// Launches the target and blocks until it exits.
    fn launch_and_wait(&self) -> Result<i32, LaunchError>;

    /// Stops a running target.  A no-op if nothing is running.
    fn terminate(&self) -> Result<(), LaunchError>;
}

/// Launches the target as a child process.
///
/// On macOS the path is an application bundle started through `open -W`, so
/// the child lives exactly as long as the application.  Termination then
/// goes through the bundle id, because the child is only the `open` process.
pub struct CommandLauncher {
    path: Option<PathBuf>,
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    bundle_id: String,
    child: Mutex<Option<Child>>,
}

impl CommandLauncher {
    pub fn new(path: Option<PathBuf>, bundle_id: impl Into<String>) -> Self {
        Self {
            path,
            bundle_id: bundle_id.into(),
            child: Mutex::new(None),
        }
    }

    fn command(path: &std::path::Path) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg("-W").arg(path);
            cmd
        } else {
            Command::new(path)
        }
    }

    fn lock_child(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TargetLauncher for CommandLauncher {
    fn launch_and_wait(&self) -> Result<i32, LaunchError> {
        let path = self.path.clone().ok_or(LaunchError::MissingPath)?;
        if !path.exists() {
            return Err(LaunchError::NotFound(path));
        }

        let child = Self::command(&path)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), pid = child.id(), "target application launched");
        *self.lock_child() = Some(child);

        // Poll instead of blocking in wait() so terminate() can take the lock.
        loop {
            {
                let mut guard = self.lock_child();
                let Some(child) = guard.as_mut() else {
                    return Ok(-1);
                };
                if let Some(status) = child.try_wait().map_err(LaunchError::Wait)? {
                    guard.take();
                    let code = status.code().unwrap_or(-1);
                    info!(code, "target application exited");
                    return Ok(code);
                }
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn terminate(&self) -> Result<(), LaunchError> {
        #[cfg(target_os = "macos")]
        macos::force_terminate_bundle(&self.bundle_id)?;

        let mut guard = self.lock_child();
        if let Some(child) = guard.as_mut() {
            if let Err(e) = child.kill() {
                if e.kind() != std::io::ErrorKind::InvalidInput {
                    return Err(LaunchError::Terminate(e.to_string()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use std::thread;
    use std::time::Duration;

    use objc2_app_kit::NSRunningApplication;
    use objc2_foundation::NSString;
    use tracing::{info, warn};

    use super::LaunchError;

    const MAX_ATTEMPTS: u32 = 30;
    const RETRY_INTERVAL: Duration = Duration::from_secs(1);

    /// Force-terminates every running instance of `bundle_id`, retrying for
    /// up to thirty seconds.  `isTerminated` is unreliable for force-quit
    /// apps, so liveness is re-queried from the running-application list.
    pub(super) fn force_terminate_bundle(bundle_id: &str) -> Result<(), LaunchError> {
        let id = NSString::from_str(bundle_id);
        for attempt in 0..MAX_ATTEMPTS {
            #[allow(unused_unsafe)]
            let running = unsafe { NSRunningApplication::runningApplicationsWithBundleIdentifier(&id) };
            if running.count() == 0 {
                if attempt > 0 {
                    info!(bundle_id, attempt, "target application terminated");
                }
                return Ok(());
            }
            for app in running.iter() {
                #[allow(unused_unsafe)]
                let _ = unsafe { app.forceTerminate() };
            }
            thread::sleep(RETRY_INTERVAL);
        }
        warn!(bundle_id, "target application survived force-terminate");
        Err(LaunchError::Terminate(format!(
            "{bundle_id} still running after {MAX_ATTEMPTS} attempts"
        )))
    }
}
