//! Session lifecycle.
//!
//! ```text
//! Session::new()            -- config -> remap table + passthrough set (fail fast)
//! Session::run()
//!  ├─ DecisionEngine        -- owns the tables and the injected-key set
//!  ├─ FocusMonitor::spawn   -- background poll thread (macOS)
//!  ├─ PlatformHook::install -- hook thread, calls the engine per event
//!  ├─ client mode: launcher thread runs the target to completion
//!  └─ wait for Quit / TargetExited, then uninstall hook + stop monitor
//! ```
//!
//! The hook handle and the monitor handle both stop their threads when
//! dropped, so every early return out of `run` still tears them down.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use keyshim_core::{
    CharLookup, DecisionEngine, FocusState, KeySynthesizer, KeyTables, PlatformKeymap, SharedFocus,
};
use tracing::{info, info_span, warn};

use crate::infrastructure::focus::{FocusMonitor, FocusProbe};
use crate::infrastructure::input_hook::{EngineCallbacks, PlatformHook};
use crate::infrastructure::launcher::TargetLauncher;
use crate::infrastructure::storage::config::{AppConfig, ConfigFileError, Mode};
use crate::infrastructure::ui_bridge::{FileOpener, SessionControl, TrayUi};

/// Messages that drive the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user (tray or signal) asked to quit.
    Quit,
    /// The target application exited with this code.
    TargetExited(i32),
    /// The target application could not be started.  The hook keeps running.
    LaunchFailed(String),
}

/// Everything a session needs from the operating system.
pub struct PlatformServices {
    pub keymap: Arc<dyn PlatformKeymap>,
    pub synthesizer: Arc<dyn KeySynthesizer>,
    pub hook: Box<dyn PlatformHook>,
    /// `None` on platforms without focus tracking; the target is then
    /// always treated as focused.
    pub focus_probe: Option<Box<dyn FocusProbe>>,
    /// Resolves literal characters in key specs.
    pub char_lookup: Box<dyn CharLookup + Send + Sync>,
    pub launcher: Arc<dyn TargetLauncher>,
    pub opener: Arc<dyn FileOpener>,
    pub ui: Arc<dyn TrayUi>,
}

/// A configured, not yet running session.
pub struct Session {
    config: AppConfig,
    tables: KeyTables,
    services: PlatformServices,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl Session {
    /// Validates the configuration and returns the session together with
    /// the control handle for the tray.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Invalid`] if any remap entry or passthrough
    /// hotkey is malformed.  Nothing has been installed at that point.
    pub fn new(
        config: AppConfig,
        services: PlatformServices,
        log_path: PathBuf,
    ) -> Result<(Self, SessionControl), ConfigFileError> {
        let tables = config.key_tables(services.keymap.as_ref(), services.char_lookup.as_ref())?;
        info!(
            remaps = tables.remaps.len(),
            passthrough = tables.passthrough.len(),
            platform = services.keymap.platform(),
            "key tables built"
        );

        let (tx, rx) = mpsc::channel();
        let control = SessionControl::new(tx.clone(), log_path, Arc::clone(&services.opener));
        Ok((
            Self {
                config,
                tables,
                services,
                tx,
                rx,
            },
            control,
        ))
    }

    /// Runs until quit (server mode) or until the target exits (client
    /// mode).  Returns the process exit code.
    pub fn run(self) -> anyhow::Result<i32> {
        let Session {
            config,
            tables,
            services,
            tx,
            rx,
        } = self;

        let focus = Arc::new(SharedFocus::new(match services.focus_probe {
            Some(_) => FocusState::inactive(),
            None => FocusState::active(None),
        }));

        let engine = DecisionEngine::new(
            tables,
            Arc::clone(&services.keymap),
            Arc::clone(&services.synthesizer),
            info_span!("engine", mode = ?config.mode),
        );

        let monitor = match services.focus_probe {
            Some(probe) => Some(
                FocusMonitor::spawn(probe, Arc::clone(&focus), config.monitor.poll_interval())
                    .context("starting focus monitor")?,
            ),
            None => None,
        };

        let clip_margin = (config.monitor.clip_mouse && services.hook.supports_mouse_clip())
            .then_some(config.monitor.clip_margin_px);
        let hook = services
            .hook
            .install(Box::new(EngineCallbacks::new(engine, Arc::clone(&focus), clip_margin)))
            .context("installing input hook")?;
        info!(mode = ?config.mode, clip_mouse = clip_margin.is_some(), "input handling active");

        if config.mode == Mode::Client {
            let launcher = Arc::clone(&services.launcher);
            let tx = tx.clone();
            thread::Builder::new()
                .name("keyshim-target".to_string())
                .spawn(move || {
                    info!("running target application until it quits");
                    let event = match launcher.launch_and_wait() {
                        Ok(code) => SessionEvent::TargetExited(code),
                        Err(e) => SessionEvent::LaunchFailed(e.to_string()),
                    };
                    let _ = tx.send(event);
                })
                .context("starting launcher thread")?;
        }
        drop(tx);

        let exit_code = loop {
            match rx.recv() {
                Ok(SessionEvent::Quit) => {
                    if config.mode == Mode::Client {
                        if let Err(e) = services.launcher.terminate() {
                            warn!(error = %e, "failed to stop target application");
                        }
                    }
                    break 0;
                }
                Ok(SessionEvent::TargetExited(code)) => {
                    info!(code, "target application terminated, exiting");
                    break code;
                }
                Ok(SessionEvent::LaunchFailed(message)) => {
                    services.ui.report_error(&message);
                }
                // Every sender is gone: nothing can ever ask us to stop.
                Err(_) => break 0,
            }
        };

        if let Err(e) = hook.uninstall() {
            warn!(error = %e, "input hook did not shut down cleanly");
        }
        if let Some(monitor) = monitor {
            monitor.stop();
        }
        info!(exit_code, "session ended");
        Ok(exit_code)
    }
}
