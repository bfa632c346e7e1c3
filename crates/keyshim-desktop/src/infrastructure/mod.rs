//! Infrastructure layer for the desktop application.
//!
//! Contains OS-facing adapters: the input hooks, key injection, focus
//! tracking, target launch, configuration loading, logging and the tray
//! bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyshim_core`; `keyshim_core` never depends on it.
//!
//! # Sub-modules
//!
//! - **`input_hook`** – `PlatformHook` implementations (`CGEventTap`,
//!   `WH_KEYBOARD_LL`) plus `MockHook`.
//! - **`input_synthesis`** – `KeySynthesizer` implementations (`CGEventPost`,
//!   `SendInput`).
//! - **`focus`** – the focus/bounds monitor thread and its probes.
//! - **`launcher`** – starts and stops the target application.
//! - **`storage`** – TOML configuration document.
//! - **`logging`** – tracing subscriber with a log file.
//! - **`ui_bridge`** – tray actions and error reporting.
//!
//! [`platform_services`] picks the right adapters at compile time.

pub mod focus;
pub mod input_hook;
pub mod input_synthesis;
pub mod launcher;
pub mod logging;
pub mod storage;
pub mod ui_bridge;

use crate::application::session::PlatformServices;
use input_hook::HookError;
use storage::config::AppConfig;

/// Builds the native adapters for this platform.
///
/// # Errors
///
/// Returns [`HookError::UnsupportedPlatform`] on platforms without an input
/// hook implementation.
#[cfg(target_os = "macos")]
pub fn platform_services(config: &AppConfig) -> Result<PlatformServices, HookError> {
    use std::sync::Arc;

    use keyshim_core::{MacosKeymap, PhysicalKey, PlatformKeymap};

    let target = &config.target;
    Ok(PlatformServices {
        keymap: Arc::new(MacosKeymap),
        synthesizer: Arc::new(input_synthesis::macos::MacosKeySynthesizer::new()),
        hook: Box::new(input_hook::macos::MacosEventTap::new(config.monitor.clip_mouse)),
        focus_probe: Some(Box::new(focus::macos::MacosFocusProbe::new(
            target.bundle_id.clone(),
            target.app_name.clone(),
            config.monitor.min_window_height,
            config.monitor.min_window_alpha,
        ))),
        char_lookup: Box::new(|ch: char| -> Option<PhysicalKey> { MacosKeymap.char_key(ch) }),
        launcher: Arc::new(launcher::CommandLauncher::new(
            target.path.clone(),
            target.bundle_id.clone(),
        )),
        opener: Arc::new(ui_bridge::SystemFileOpener),
        ui: Arc::new(ui_bridge::LogTrayUi),
    })
}

/// Builds the native adapters for this platform.
///
/// # Errors
///
/// Returns [`HookError::UnsupportedPlatform`] on platforms without an input
/// hook implementation.
#[cfg(target_os = "windows")]
pub fn platform_services(config: &AppConfig) -> Result<PlatformServices, HookError> {
    use std::sync::Arc;

    use keyshim_core::WindowsKeymap;

    Ok(PlatformServices {
        keymap: Arc::new(WindowsKeymap),
        synthesizer: Arc::new(input_synthesis::windows::WindowsKeySynthesizer::new()),
        hook: Box::new(input_hook::windows::WindowsKeyboardHook::new()),
        focus_probe: None,
        char_lookup: Box::new(input_hook::windows::vk_char_lookup),
        launcher: Arc::new(launcher::CommandLauncher::new(
            config.target.path.clone(),
            config.target.bundle_id.clone(),
        )),
        opener: Arc::new(ui_bridge::SystemFileOpener),
        ui: Arc::new(ui_bridge::LogTrayUi),
    })
}

/// Builds the native adapters for this platform.
///
/// # Errors
///
/// Always returns [`HookError::UnsupportedPlatform`]: there is no input hook
/// for this platform.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn platform_services(_config: &AppConfig) -> Result<PlatformServices, HookError> {
    Err(HookError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}
