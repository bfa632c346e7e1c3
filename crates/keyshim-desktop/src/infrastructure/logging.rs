//! Tracing subscriber setup.
//!
//! Events go to two sinks: stderr for whoever launched the binary, and a
//! plain-text file in the temp directory that the tray's "View log" action
//! opens.  `RUST_LOG` overrides the level; otherwise it is `info`, or
//! `debug` with `--debug`.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "keyshim.log";

/// Location of the log file.
pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE_NAME)
}

fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber and returns the log file path.
///
/// # Errors
///
/// Fails if the log file cannot be created or a subscriber is already set.
pub fn init(debug: bool) -> anyhow::Result<PathBuf> {
    let path = log_file_path();
    let file = File::create(&path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("tracing subscriber already initialised")?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_lives_in_temp_dir() {
        let path = log_file_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_default_level_follows_debug_flag() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
    }
}
