//! keyshim desktop library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does keyshim do? (for beginners)
//!
//! When you control one computer from another through a remote-desktop
//! client, keyboard shortcuts rarely survive the trip: a Mac's `Cmd+C`
//! arrives on a Windows host as `Win+C`.  keyshim sits underneath the
//! remote-desktop client and fixes that at the keyboard level:
//!
//! 1. It installs a system-wide keyboard hook (`CGEventTap` on macOS,
//!    `WH_KEYBOARD_LL` on Windows).
//! 2. For every key event it asks the decision engine in `keyshim_core`
//!    whether to pass the event on, strip some modifier bits, or swallow it
//!    and inject replacement keys.
//! 3. On macOS it only does so while the remote-desktop window is focused,
//!    and keeps the pointer from wandering out of that window.
//! 4. In client mode it launches the remote-desktop application and exits
//!    when it does.

/// Application layer: the session lifecycle.
pub mod application;

/// Infrastructure layer: OS adapters, configuration, logging and the tray bridge.
pub mod infrastructure;
