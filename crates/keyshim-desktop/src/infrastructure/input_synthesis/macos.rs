//! macOS CoreGraphics key injection.
//!
//! Uses `CGEventCreateKeyboardEvent` and `CGEventPost` to inject events at
//! the `kCGHIDEventTap` level, the same level as physical keyboard input.
//!
//! # Modifier flags on synthetic events
//!
//! A synthetic key event carries whatever flags we give it; the system does
//! not merge in the modifiers we injected earlier.  The synthesizer therefore
//! tracks which modifier keys it is holding and stamps their flag bits on
//! every event it posts, so an injected `ctrl` followed by the physical `c`
//! reads as ctrl+c.
//!
//! # Accessibility permission
//!
//! Posting events requires the **Accessibility** permission (System Settings
//! → Privacy & Security → Accessibility).  Without it the post silently
//! does nothing.

#![cfg(target_os = "macos")]

use std::sync::atomic::{AtomicU64, Ordering};

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use keyshim_core::{KeySynthesizer, MacosKeymap, PhysicalKey, PlatformKeymap, SynthesisError};
use tracing::trace;

use super::INJECTED_MARKER;

/// [`KeySynthesizer`] backed by `CGEventPost`.
#[derive(Debug, Default)]
pub struct MacosKeySynthesizer {
    /// Flag bits of the modifier keys we currently hold down.
    held_flags: AtomicU64,
}

impl MacosKeySynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn post(&self, key: PhysicalKey, down: bool) -> Result<(), SynthesisError> {
        let flags = self.track_modifier(key, down);

        let source = CGEventSource::new(CGEventSourceStateID::Private)
            .map_err(|()| SynthesisError::Platform("CGEventSourceCreate failed".to_string()))?;
        let event = CGEvent::new_keyboard_event(source, key.code(), down)
            .map_err(|()| SynthesisError::Platform("CGEventCreateKeyboardEvent failed".to_string()))?;

        event.set_flags(CGEventFlags::from_bits_truncate(flags));
        event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, INJECTED_MARKER);
        event.post(CGEventTapLocation::HID);

        trace!(%key, down, flags, "posted key event");
        Ok(())
    }

    /// Updates the held-modifier bits for `key` and returns the flags to
    /// stamp on its event.
    fn track_modifier(&self, key: PhysicalKey, down: bool) -> u64 {
        let Some(modifier) = MacosKeymap.modifier_of(key) else {
            return self.held_flags.load(Ordering::SeqCst);
        };
        let mask = MacosKeymap.modifier_mask(modifier).bits();
        if down {
            self.held_flags.fetch_or(mask, Ordering::SeqCst) | mask
        } else {
            self.held_flags.fetch_and(!mask, Ordering::SeqCst) & !mask
        }
    }
}

impl KeySynthesizer for MacosKeySynthesizer {
    fn emit_key_down(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        self.post(key, true)
    }

    fn emit_key_up(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        self.post(key, false)
    }
}
