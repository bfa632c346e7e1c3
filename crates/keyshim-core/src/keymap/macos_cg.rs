//! macOS `CGKeyCode` vocabulary.
//!
//! CGKeyCode values are defined in Carbon Events.h (HIToolbox framework):
//! /System/Library/Frameworks/Carbon.framework/Versions/A/Frameworks/HIToolbox.framework/Headers/Events.h
//!
//! Letter and digit codes are ANSI key *positions*, not ASCII values; the
//! character table below is only correct for a US layout.

use super::{lookup_char, lookup_name, reverse_char, reverse_name, PlatformKeymap};
use crate::domain::key::{Modifier, PhysicalKey, RawFlags};

// CGEventFlags modifier bits (CGEventTypes.h).
pub const FLAG_MASK_SHIFT: u64 = 0x0002_0000;
pub const FLAG_MASK_CONTROL: u64 = 0x0004_0000;
pub const FLAG_MASK_ALTERNATE: u64 = 0x0008_0000;
pub const FLAG_MASK_COMMAND: u64 = 0x0010_0000;
pub const FLAG_MASK_ALPHA_SHIFT: u64 = 0x0001_0000;
pub const FLAG_MASK_SECONDARY_FN: u64 = 0x0080_0000;

const KVK_CONTROL: u16 = 0x3B;
const KVK_RIGHT_CONTROL: u16 = 0x3E;
const KVK_SHIFT: u16 = 0x38;
const KVK_RIGHT_SHIFT: u16 = 0x3C;
const KVK_OPTION: u16 = 0x3A;
const KVK_RIGHT_OPTION: u16 = 0x3D;
const KVK_COMMAND: u16 = 0x37;
const KVK_RIGHT_COMMAND: u16 = 0x36;
const KVK_CAPS_LOCK: u16 = 0x39;
const KVK_FUNCTION: u16 = 0x3F;

/// Named keys.  The first entry for a code is its canonical name.
const NAMED_KEYS: &[(&str, u16)] = &[
    // Modifiers (side-specific names come first so they render canonically)
    ("ctrl_l", KVK_CONTROL),
    ("ctrl", KVK_CONTROL),
    ("ctrl_r", KVK_RIGHT_CONTROL),
    ("shift_l", KVK_SHIFT),
    ("shift", KVK_SHIFT),
    ("shift_r", KVK_RIGHT_SHIFT),
    ("alt_l", KVK_OPTION),
    ("alt", KVK_OPTION),
    ("alt_r", KVK_RIGHT_OPTION),
    ("alt_gr", KVK_RIGHT_OPTION),
    ("cmd_l", KVK_COMMAND),
    ("cmd", KVK_COMMAND),
    ("cmd_r", KVK_RIGHT_COMMAND),
    ("caps_lock", KVK_CAPS_LOCK),
    ("fn", KVK_FUNCTION),
    // Control keys
    ("enter", 0x24),  // kVK_Return
    ("esc", 0x35),    // kVK_Escape
    ("backspace", 0x33), // kVK_Delete
    ("tab", 0x30),
    ("space", 0x31),
    ("insert", 0x72), // kVK_Help
    ("home", 0x73),
    ("page_up", 0x74),
    ("delete", 0x75), // kVK_ForwardDelete
    ("end", 0x77),
    ("page_down", 0x79),
    // Arrow keys
    ("left", 0x7B),
    ("right", 0x7C),
    ("down", 0x7D),
    ("up", 0x7E),
    // Function keys
    ("f1", 0x7A),
    ("f2", 0x78),
    ("f3", 0x63),
    ("f4", 0x76),
    ("f5", 0x60),
    ("f6", 0x61),
    ("f7", 0x62),
    ("f8", 0x64),
    ("f9", 0x65),
    ("f10", 0x6D),
    ("f11", 0x67),
    ("f12", 0x6F),
    ("f13", 0x69),
    ("f14", 0x6B),
    ("f15", 0x71),
    ("f16", 0x6A),
    ("f17", 0x40),
    ("f18", 0x4F),
    ("f19", 0x50),
    ("f20", 0x5A),
    // Media
    ("media_volume_up", 0x48),
    ("media_volume_down", 0x49),
    ("media_volume_mute", 0x4A),
];

/// US-ANSI characters.
const ANSI_CHARS: &[(char, u16)] = &[
    ('a', 0x00),
    ('s', 0x01),
    ('d', 0x02),
    ('f', 0x03),
    ('h', 0x04),
    ('g', 0x05),
    ('z', 0x06),
    ('x', 0x07),
    ('c', 0x08),
    ('v', 0x09),
    ('b', 0x0B),
    ('q', 0x0C),
    ('w', 0x0D),
    ('e', 0x0E),
    ('r', 0x0F),
    ('y', 0x10),
    ('t', 0x11),
    ('1', 0x12),
    ('2', 0x13),
    ('3', 0x14),
    ('4', 0x15),
    ('6', 0x16),
    ('5', 0x17),
    ('=', 0x18),
    ('9', 0x19),
    ('7', 0x1A),
    ('-', 0x1B),
    ('8', 0x1C),
    ('0', 0x1D),
    (']', 0x1E),
    ('o', 0x1F),
    ('u', 0x20),
    ('[', 0x21),
    ('i', 0x22),
    ('p', 0x23),
    ('l', 0x25),
    ('j', 0x26),
    ('\'', 0x27),
    ('k', 0x28),
    (';', 0x29),
    ('\\', 0x2A),
    (',', 0x2B),
    ('/', 0x2C),
    ('n', 0x2D),
    ('m', 0x2E),
    ('.', 0x2F),
    ('`', 0x32),
];

/// Key vocabulary for macOS event taps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacosKeymap;

impl PlatformKeymap for MacosKeymap {
    fn platform(&self) -> &'static str {
        "macos"
    }

    fn named_key(&self, name: &str) -> Option<PhysicalKey> {
        lookup_name(NAMED_KEYS, name)
    }

    fn key_name(&self, key: PhysicalKey) -> Option<&'static str> {
        reverse_name(NAMED_KEYS, key)
    }

    fn key_char(&self, key: PhysicalKey) -> Option<char> {
        reverse_char(ANSI_CHARS, key)
    }

    fn char_key(&self, ch: char) -> Option<PhysicalKey> {
        lookup_char(ANSI_CHARS, ch)
    }

    fn modifier_of(&self, key: PhysicalKey) -> Option<Modifier> {
        match key.code() {
            KVK_CONTROL | KVK_RIGHT_CONTROL => Some(Modifier::Ctrl),
            KVK_OPTION | KVK_RIGHT_OPTION => Some(Modifier::Alt),
            KVK_COMMAND | KVK_RIGHT_COMMAND => Some(Modifier::Cmd),
            KVK_SHIFT | KVK_RIGHT_SHIFT => Some(Modifier::Shift),
            _ => None,
        }
    }

    fn modifier_key(&self, modifier: Modifier) -> PhysicalKey {
        PhysicalKey::new(match modifier {
            Modifier::Ctrl => KVK_CONTROL,
            Modifier::Alt => KVK_OPTION,
            Modifier::Cmd => KVK_COMMAND,
            Modifier::Shift => KVK_SHIFT,
        })
    }

    fn modifier_mask(&self, modifier: Modifier) -> RawFlags {
        RawFlags(match modifier {
            Modifier::Ctrl => FLAG_MASK_CONTROL,
            Modifier::Alt => FLAG_MASK_ALTERNATE,
            Modifier::Cmd => FLAG_MASK_COMMAND,
            Modifier::Shift => FLAG_MASK_SHIFT,
        })
    }

    fn state_mask(&self, key: PhysicalKey) -> Option<RawFlags> {
        match key.code() {
            KVK_CAPS_LOCK => Some(RawFlags(FLAG_MASK_ALPHA_SHIFT)),
            KVK_FUNCTION => Some(RawFlags(FLAG_MASK_SECONDARY_FN)),
            _ => self.modifier_of(key).map(|m| self.modifier_mask(m)),
        }
    }
}
