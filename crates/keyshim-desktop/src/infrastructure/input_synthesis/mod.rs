//! Key injection backends.
//!
//! Each backend implements [`keyshim_core::KeySynthesizer`] on top of the
//! OS injection API and stamps every event with [`INJECTED_MARKER`] so the
//! input hook can tell our own events apart from everything else.
//!
//! The correct backend is selected at compile time using `#[cfg(target_os)]`.
//! Tests use the recording [`MockKeySynthesizer`].

pub use keyshim_core::engine::mock::MockKeySynthesizer;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

/// Stamp carried by every synthetic event we post ("KSHM").
///
/// macOS stores it in the `EVENT_SOURCE_USER_DATA` field, Windows in
/// `dwExtraInfo`.
pub const INJECTED_MARKER: i64 = 0x4B53_484D;
