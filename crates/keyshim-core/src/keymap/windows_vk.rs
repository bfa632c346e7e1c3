//! Windows Virtual-Key (VK) vocabulary.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! They are "virtual" because they represent *logical* keys rather than
//! physical scan codes: pressing the letter A on any keyboard layout always
//! produces `VK_A = 0x41`.  Punctuation keys (`VK_OEM_*`) are the exception;
//! their meaning depends on the active layout, which is why the desktop
//! adapter prefers a live `VkKeyScanW` lookup over [`WindowsKeymap::char_key`].
//!
//! # Modifier flags
//!
//! A low-level keyboard hook event carries no modifier flag word.  The hook
//! adapter reads the live key state and packs it into [`RawFlags`] using the
//! `FLAG_*` bits defined here.

use super::{lookup_char, lookup_name, reverse_char, reverse_name, PlatformKeymap};
use crate::domain::key::{Modifier, PhysicalKey, RawFlags};

pub const FLAG_CTRL: u64 = 1 << 0;
pub const FLAG_ALT: u64 = 1 << 1;
pub const FLAG_WIN: u64 = 1 << 2;
pub const FLAG_SHIFT: u64 = 1 << 3;

const VK_SHIFT: u16 = 0x10;
const VK_CONTROL: u16 = 0x11;
const VK_MENU: u16 = 0x12;
const VK_LWIN: u16 = 0x5B;
const VK_RWIN: u16 = 0x5C;
const VK_LSHIFT: u16 = 0xA0;
const VK_RSHIFT: u16 = 0xA1;
const VK_LCONTROL: u16 = 0xA2;
const VK_RCONTROL: u16 = 0xA3;
const VK_LMENU: u16 = 0xA4;
const VK_RMENU: u16 = 0xA5;

/// Named keys.  The first entry for a code is its canonical name.
const NAMED_KEYS: &[(&str, u16)] = &[
    ("ctrl_l", VK_LCONTROL),
    ("ctrl", VK_LCONTROL),
    ("ctrl_r", VK_RCONTROL),
    ("shift_l", VK_LSHIFT),
    ("shift", VK_LSHIFT),
    ("shift_r", VK_RSHIFT),
    ("alt_l", VK_LMENU),
    ("alt", VK_LMENU),
    ("alt_r", VK_RMENU),
    ("alt_gr", VK_RMENU),
    ("cmd_l", VK_LWIN),
    ("cmd", VK_LWIN),
    ("cmd_r", VK_RWIN),
    ("caps_lock", 0x14),
    ("backspace", 0x08),
    ("tab", 0x09),
    ("enter", 0x0D),
    ("pause", 0x13),
    ("esc", 0x1B),
    ("space", 0x20),
    ("page_up", 0x21),
    ("page_down", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("left", 0x25),
    ("up", 0x26),
    ("right", 0x27),
    ("down", 0x28),
    ("print_screen", 0x2C),
    ("insert", 0x2D),
    ("delete", 0x2E),
    ("menu", 0x5D),
    ("f1", 0x70),
    ("f2", 0x71),
    ("f3", 0x72),
    ("f4", 0x73),
    ("f5", 0x74),
    ("f6", 0x75),
    ("f7", 0x76),
    ("f8", 0x77),
    ("f9", 0x78),
    ("f10", 0x79),
    ("f11", 0x7A),
    ("f12", 0x7B),
    ("f13", 0x7C),
    ("f14", 0x7D),
    ("f15", 0x7E),
    ("f16", 0x7F),
    ("f17", 0x80),
    ("f18", 0x81),
    ("f19", 0x82),
    ("f20", 0x83),
    ("f21", 0x84),
    ("f22", 0x85),
    ("f23", 0x86),
    ("f24", 0x87),
    ("num_lock", 0x90),
    ("scroll_lock", 0x91),
    ("media_volume_mute", 0xAD),
    ("media_volume_down", 0xAE),
    ("media_volume_up", 0xAF),
    ("media_next", 0xB0),
    ("media_previous", 0xB1),
    ("media_play_pause", 0xB3),
];

/// US-layout `VK_OEM_*` punctuation.
const OEM_CHARS: &[(char, u16)] = &[
    (';', 0xBA),
    ('=', 0xBB),
    (',', 0xBC),
    ('-', 0xBD),
    ('.', 0xBE),
    ('/', 0xBF),
    ('`', 0xC0),
    ('[', 0xDB),
    ('\\', 0xDC),
    (']', 0xDD),
    ('\'', 0xDE),
];

/// Key vocabulary for Windows low-level keyboard hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsKeymap;

impl PlatformKeymap for WindowsKeymap {
    fn platform(&self) -> &'static str {
        "windows"
    }

    fn named_key(&self, name: &str) -> Option<PhysicalKey> {
        lookup_name(NAMED_KEYS, name)
    }

    fn key_name(&self, key: PhysicalKey) -> Option<&'static str> {
        // The generic VK_SHIFT/VK_CONTROL/VK_MENU codes have no name of their
        // own; render them as the left-hand key.
        match self.modifier_of(key) {
            Some(modifier) => reverse_name(NAMED_KEYS, self.canonical_modifier_code(key, modifier)),
            None => reverse_name(NAMED_KEYS, key),
        }
    }

    fn key_char(&self, key: PhysicalKey) -> Option<char> {
        match key.code() {
            code @ 0x41..=0x5A => char::from_u32(u32::from(code - 0x41) + u32::from('a')),
            code @ 0x30..=0x39 => char::from_u32(u32::from(code)),
            _ => reverse_char(OEM_CHARS, key),
        }
    }

    fn char_key(&self, ch: char) -> Option<PhysicalKey> {
        match ch {
            'a'..='z' => Some(PhysicalKey::new(ch as u16 - 'a' as u16 + 0x41)),
            '0'..='9' => Some(PhysicalKey::new(ch as u16)),
            _ => lookup_char(OEM_CHARS, ch),
        }
    }

    fn modifier_of(&self, key: PhysicalKey) -> Option<Modifier> {
        match key.code() {
            VK_CONTROL | VK_LCONTROL | VK_RCONTROL => Some(Modifier::Ctrl),
            VK_MENU | VK_LMENU | VK_RMENU => Some(Modifier::Alt),
            VK_LWIN | VK_RWIN => Some(Modifier::Cmd),
            VK_SHIFT | VK_LSHIFT | VK_RSHIFT => Some(Modifier::Shift),
            _ => None,
        }
    }

    fn modifier_key(&self, modifier: Modifier) -> PhysicalKey {
        PhysicalKey::new(match modifier {
            Modifier::Ctrl => VK_LCONTROL,
            Modifier::Alt => VK_LMENU,
            Modifier::Cmd => VK_LWIN,
            Modifier::Shift => VK_LSHIFT,
        })
    }

    fn modifier_mask(&self, modifier: Modifier) -> RawFlags {
        RawFlags(match modifier {
            Modifier::Ctrl => FLAG_CTRL,
            Modifier::Alt => FLAG_ALT,
            Modifier::Cmd => FLAG_WIN,
            Modifier::Shift => FLAG_SHIFT,
        })
    }
}

impl WindowsKeymap {
    fn canonical_modifier_code(&self, key: PhysicalKey, modifier: Modifier) -> PhysicalKey {
        match key.code() {
            VK_SHIFT | VK_CONTROL | VK_MENU => self.modifier_key(modifier),
            _ => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_map_to_uppercase_ascii_vk_codes() {
        assert_eq!(WindowsKeymap.char_key('a'), Some(PhysicalKey::new(0x41)));
        assert_eq!(WindowsKeymap.char_key('z'), Some(PhysicalKey::new(0x5A)));
        assert_eq!(WindowsKeymap.key_char(PhysicalKey::new(0x51)), Some('q'));
    }

    #[test]
    fn test_digits_map_to_ascii_vk_codes() {
        for ch in '0'..='9' {
            let key = WindowsKeymap.char_key(ch).expect("digit must map");
            assert_eq!(key.code(), ch as u16);
            assert_eq!(WindowsKeymap.key_char(key), Some(ch));
        }
    }

    #[test]
    fn test_oem_punctuation_round_trips() {
        for &(ch, _) in OEM_CHARS {
            let key = WindowsKeymap.char_key(ch).expect("punctuation must map");
            assert_eq!(WindowsKeymap.key_char(key), Some(ch));
        }
    }

    #[test]
    fn test_generic_modifier_vk_codes_are_recognised() {
        assert_eq!(WindowsKeymap.modifier_of(PhysicalKey::new(VK_CONTROL)), Some(Modifier::Ctrl));
        assert_eq!(WindowsKeymap.modifier_of(PhysicalKey::new(VK_RMENU)), Some(Modifier::Alt));
        assert_eq!(WindowsKeymap.modifier_of(PhysicalKey::new(0x41)), None);
    }

    #[test]
    fn test_generic_shift_renders_as_left_shift() {
        assert_eq!(WindowsKeymap.key_name(PhysicalKey::new(VK_SHIFT)), Some("shift_l"));
    }

    #[test]
    fn test_function_keys_f1_to_f24_are_contiguous() {
        for n in 1..=24u16 {
            let name = format!("f{n}");
            assert_eq!(WindowsKeymap.named_key(&name), Some(PhysicalKey::new(0x6F + n)));
        }
    }
}
