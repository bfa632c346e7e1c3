//! The keystroke injection seam.
//!
//! The engine never talks to the OS directly.  It emits replacement keys
//! through a [`KeySynthesizer`]; the desktop crate supplies the real
//! `CGEventPost` / `SendInput` implementations and tests supply a recorder.

use thiserror::Error;

use crate::domain::key::PhysicalKey;

/// Errors that can occur while injecting a synthetic key event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The OS rejected or failed to deliver the event.
    #[error("platform injection failed: {0}")]
    Platform(String),

    /// The key code cannot be expressed on this platform.
    #[error("key {0} cannot be injected on this platform")]
    UnmappedKey(PhysicalKey),
}

/// One synthetic key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keystroke {
    pub key: PhysicalKey,
    pub down: bool,
}

impl Keystroke {
    pub fn down(key: PhysicalKey) -> Self {
        Self { key, down: true }
    }

    pub fn up(key: PhysicalKey) -> Self {
        Self { key, down: false }
    }
}

/// Injects key events at the OS level.
///
/// Implementations must mark their events so the platform hook recognises
/// and ignores them; otherwise every synthetic key would be fed back into
/// the engine.
pub trait KeySynthesizer: Send + Sync {
    /// Emits a key-down event for `key`.
    fn emit_key_down(&self, key: PhysicalKey) -> Result<(), SynthesisError>;

    /// Emits a key-up event for `key`.
    fn emit_key_up(&self, key: PhysicalKey) -> Result<(), SynthesisError>;

    /// Emits `stroke`.
    fn emit(&self, stroke: Keystroke) -> Result<(), SynthesisError> {
        if stroke.down {
            self.emit_key_down(stroke.key)
        } else {
            self.emit_key_up(stroke.key)
        }
    }
}
