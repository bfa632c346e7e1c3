//! Windows key injection via the SendInput API.
//!
//! Events are injected by virtual-key code.  `SendInput` derives the scan
//! code itself, and extended keys (navigation cluster, right-hand modifiers,
//! Windows keys) need `KEYEVENTF_EXTENDEDKEY` so they are not mistaken for
//! their numpad or left-hand twins.

#![cfg(target_os = "windows")]

use keyshim_core::{KeySynthesizer, PhysicalKey, SynthesisError};
use tracing::trace;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, VIRTUAL_KEY,
};

use super::INJECTED_MARKER;

/// VK codes that must be sent with `KEYEVENTF_EXTENDEDKEY`.
const EXTENDED_VKS: &[u16] = &[
    0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, // nav
    0x2D, 0x2E, // Insert, Delete
    0x5B, 0x5C, // Win keys
    0xA3, 0xA5, // Right Ctrl, Right Alt
];

/// [`KeySynthesizer`] backed by `SendInput`.
#[derive(Debug, Default)]
pub struct WindowsKeySynthesizer;

impl WindowsKeySynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl KeySynthesizer for WindowsKeySynthesizer {
    fn emit_key_down(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        send_key(key, false)
    }

    fn emit_key_up(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        send_key(key, true)
    }
}

fn send_key(key: PhysicalKey, key_up: bool) -> Result<(), SynthesisError> {
    if key.code() > 0xFF {
        return Err(SynthesisError::UnmappedKey(key));
    }

    let mut flags = KEYBD_EVENT_FLAGS(0);
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    if EXTENDED_VKS.contains(&key.code()) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(key.code()),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECTED_MARKER as usize,
            },
        },
    };

    // SAFETY: input is a valid KEYBDINPUT structure on the stack.
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(SynthesisError::Platform(format!(
            "SendInput injected {sent} of 1 events: {}",
            windows::core::Error::from_win32()
        )));
    }

    trace!(%key, key_up, "sent key event");
    Ok(())
}
