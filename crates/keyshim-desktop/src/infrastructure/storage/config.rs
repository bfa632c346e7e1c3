//! TOML configuration document for keyshim.
//!
//! The document lives at the path given on the command line, or else at the
//! platform default:
//! - Windows:  `%APPDATA%\keyshim\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/keyshim/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/keyshim/config.toml`
//!
//! Example:
//!
//! ```toml
//! mode = "client"
//!
//! remap_keys = [
//!     { from = "cmd", to = "ctrl" },
//!     { from = "f13", to = "ctrl" },
//! ]
//! passthrough_hotkeys = ["cmd+q", "cmd+tab"]
//!
//! [monitor]
//! poll_interval_ms = 250
//! clip_margin_px = 50
//! ```
//!
//! # Serde default values
//!
//! Everything except `mode` is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take `some_fn()` when absent.  Unknown
//! `mode` values are rejected at parse time.
//!
//! Unlike a settings file this document is never written back, and a missing
//! file is an error: the remapper refuses to start without an explicit table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use keyshim_core::{build_tables, CharLookup, ConfigError, KeyTables, PlatformKeymap, RemapEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration document operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A remap entry or passthrough hotkey is malformed.
    #[error("invalid key configuration: {0}")]
    Invalid(#[from] ConfigError),

    /// A `[monitor]` value is out of range.
    #[error("invalid monitor setting {field}: {reason}")]
    Monitor { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Which side of a remote-desktop session this machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The hook runs until the user quits.
    Server,
    /// The hook runs for as long as the launched target application runs.
    Client,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub mode: Mode,
    /// Ordered `{from, to}` pairs.  A repeated `from` takes the last `to`.
    #[serde(default)]
    pub remap_keys: Vec<RemapEntry>,
    /// Hotkeys delivered verbatim, bypassing remapping.
    #[serde(default)]
    pub passthrough_hotkeys: Vec<String>,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// The application launched in client mode and tracked for focus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// Window owner name as reported by the window server.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_bundle_id")]
    pub bundle_id: String,
    /// Application bundle or executable to launch.
    #[serde(default = "default_target_path")]
    pub path: Option<PathBuf>,
}

/// Focus polling and mouse clipping settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Horizontal slack, in points, allowed outside the target window.
    #[serde(default = "default_clip_margin_px")]
    pub clip_margin_px: f64,
    #[serde(default = "default_true")]
    pub clip_mouse: bool,
    /// Windows at or below this height are ignored (toolbars, popups).
    #[serde(default = "default_min_window_height")]
    pub min_window_height: f64,
    /// Windows at or below this alpha are ignored (fade-in, hidden).
    #[serde(default = "default_min_window_alpha")]
    pub min_window_alpha: f64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_app_name() -> String {
    "Moonlight".to_string()
}
fn default_bundle_id() -> String {
    "com.moonlight-stream.Moonlight".to_string()
}
fn default_target_path() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from("/Applications/Moonlight.app"))
    } else {
        None
    }
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_clip_margin_px() -> f64 {
    50.0
}
fn default_true() -> bool {
    true
}
fn default_min_window_height() -> f64 {
    50.0
}
fn default_min_window_alpha() -> f64 {
    0.5
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            bundle_id: default_bundle_id(),
            path: default_target_path(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            clip_margin_px: default_clip_margin_px(),
            clip_mouse: default_true(),
            min_window_height: default_min_window_height(),
            min_window_alpha: default_min_window_alpha(),
        }
    }
}

/// Shortest accepted focus poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rejects values the focus monitor and pointer clipping cannot work
    /// with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Monitor`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(monitor_error(
                "poll_interval_ms",
                format!("{} is below the minimum of {MIN_POLL_INTERVAL_MS}", self.poll_interval_ms),
            ));
        }
        for (field, value) in [
            ("clip_margin_px", self.clip_margin_px),
            ("min_window_height", self.min_window_height),
            ("min_window_alpha", self.min_window_alpha),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(monitor_error(field, format!("{value} is not a non-negative number")));
            }
        }
        Ok(())
    }
}

fn monitor_error(field: &'static str, reason: String) -> ConfigFileError {
    ConfigFileError::Monitor { field, reason }
}

impl AppConfig {
    /// A configuration with no remaps and no passthrough hotkeys.
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            remap_keys: Vec::new(),
            passthrough_hotkeys: Vec::new(),
            target: TargetConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }

    /// Parses a document from TOML text and validates the monitor section.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(content)?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Materialises the remap table and passthrough set for one platform.
    /// The monitor section is checked again since the document may have
    /// been built in code.
    pub fn key_tables(
        &self,
        keymap: &dyn PlatformKeymap,
        chars: &dyn CharLookup,
    ) -> Result<KeyTables, ConfigFileError> {
        self.monitor.validate()?;
        Ok(build_tables(&self.remap_keys, &self.passthrough_hotkeys, keymap, chars)?)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the config document.
///
/// # Errors
///
/// Returns [`ConfigFileError::NoPlatformConfigDir`] if the base directory
/// cannot be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigFileError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigFileError::NoPlatformConfigDir)
}

/// Loads and parses the document at `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read (including
/// when it does not exist), [`ConfigFileError::Parse`] if the TOML is
/// malformed or `mode` is missing, and [`ConfigFileError::Monitor`] for an
/// out-of-range `[monitor]` value.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml(&content)
}

/// Resolves the platform config base directory including the `keyshim` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("keyshim"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyshim"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("keyshim")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
