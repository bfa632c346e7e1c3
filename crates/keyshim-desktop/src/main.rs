//! keyshim entry point.
//!
//! Wires the configuration, the platform adapters and the session together,
//! then waits for the session to end.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ logging::init()          -- stderr + temp-dir log file
//!  └─ load_config()            -- TOML document, fail fast
//!  └─ platform_services()      -- native hook, injector, focus probe
//!  └─ Session::new()           -- key tables, fail fast
//!  └─ spawn_blocking(Session::run)
//!       ├─ Ctrl-C              -> SessionControl::quit()
//!       └─ returns the exit code (the target's, in client mode)
//! ```
//!
//! The session itself is synchronous: the hook and the monitor live on
//! their own OS threads, so it runs on Tokio's blocking pool while the
//! async side only waits for a shutdown signal.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use keyshim_desktop::application::session::Session;
use keyshim_desktop::infrastructure::{self, logging, storage::config};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Command-line arguments for the `keyshim` binary.
#[derive(Debug, Parser)]
#[command(
    name = "keyshim",
    about = "Keyboard remapper for remote-desktop sessions",
    version
)]
struct Cli {
    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long)]
    debug: bool,

    /// Configuration document.  Defaults to the platform config directory.
    config: Option<PathBuf>,

    /// Target application to launch in client mode.  Overrides `[target].path`.
    target_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let log_path = logging::init(cli.debug)?;

    info!(version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "keyshim starting");

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()?,
    };
    let mut cfg = config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(path) = cli.target_path {
        cfg.target.path = Some(path);
    }
    info!(path = %config_path.display(), mode = ?cfg.mode, "configuration loaded");

    let services = infrastructure::platform_services(&cfg)?;
    let (session, control) = Session::new(cfg, services, log_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let mut run = tokio::task::spawn_blocking(move || session.run());

    let exit_code = tokio::select! {
        result = &mut run => result.context("session thread panicked")??,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("shutdown signal received");
                    control.quit();
                }
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
            run.await.context("session thread panicked")??
        }
    };

    info!(exit_code, "keyshim stopped");
    Ok(ExitCode::from(u8::try_from(exit_code).unwrap_or(1)))
}
