//! Platform key vocabularies.
//!
//! Each supported OS names its keys differently.  A [`PlatformKeymap`] is the
//! single place that knows, for one platform:
//!
//! - which key code a named key token (`f13`, `ctrl_r`, `page_up`, ...) means,
//! - which codes are modifier keys and which flag bit each modifier sets,
//! - a fallback US-ANSI character table used when no live keyboard-layout
//!   lookup is available.
//!
//! The tables are plain data, so both keymaps compile and are tested on every
//! host even though only one of them is used at runtime.

pub mod macos_cg;
pub mod windows_vk;

pub use macos_cg::MacosKeymap;
pub use windows_vk::WindowsKeymap;

use crate::domain::key::{Modifier, ModifierState, PhysicalKey, RawFlags};

/// Key vocabulary and modifier layout for one platform.
pub trait PlatformKeymap: Send + Sync {
    /// Short human-readable platform name used in log output.
    fn platform(&self) -> &'static str;

    /// Resolves a named key token (already lowercased, without angle brackets).
    fn named_key(&self, name: &str) -> Option<PhysicalKey>;

    /// Canonical name of `key`, if it has one.  Never returns a bare modifier
    /// token, so the result can always stand as the key of a hotkey spec.
    fn key_name(&self, key: PhysicalKey) -> Option<&'static str>;

    /// Character produced by `key` on a US-ANSI layout, if any.
    fn key_char(&self, key: PhysicalKey) -> Option<char>;

    /// Key for `ch` on a US-ANSI layout.
    fn char_key(&self, ch: char) -> Option<PhysicalKey>;

    /// Modifier category `key` belongs to, for either the left or right key.
    fn modifier_of(&self, key: PhysicalKey) -> Option<Modifier>;

    /// The left-hand key used when a modifier has to be synthesised.
    fn modifier_key(&self, modifier: Modifier) -> PhysicalKey;

    /// Flag bit reported while `modifier` is held.
    fn modifier_mask(&self, modifier: Modifier) -> RawFlags;

    /// Flag bit that is set while `key` is held or locked.  Covers the four
    /// modifier categories plus any platform extras (fn, caps lock).
    fn state_mask(&self, key: PhysicalKey) -> Option<RawFlags> {
        self.modifier_of(key).map(|m| self.modifier_mask(m))
    }

    /// Decodes the four modifier categories from a raw flag word.
    fn modifiers_from_flags(&self, flags: RawFlags) -> ModifierState {
        let mut state = ModifierState::NONE;
        for modifier in Modifier::ALL {
            if flags.contains(self.modifier_mask(modifier)) {
                state.insert(modifier);
            }
        }
        state
    }

    /// Encodes a modifier state as a raw flag word.
    fn flags_from_modifiers(&self, modifiers: ModifierState) -> RawFlags {
        modifiers
            .iter()
            .fold(RawFlags::EMPTY, |flags, m| flags.union(self.modifier_mask(m)))
    }
}

/// Looks up a code in a `(name, code)` table.
fn lookup_name(table: &[(&'static str, u16)], name: &str) -> Option<PhysicalKey> {
    table
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|&(_, code)| PhysicalKey::new(code))
}

/// Reverse lookup; the first entry for a code is its canonical name.
fn reverse_name(table: &[(&'static str, u16)], key: PhysicalKey) -> Option<&'static str> {
    table
        .iter()
        .find(|&&(_, code)| code == key.code())
        .map(|&(name, _)| name)
}

fn lookup_char(table: &[(char, u16)], ch: char) -> Option<PhysicalKey> {
    table
        .iter()
        .find(|&&(entry, _)| entry == ch)
        .map(|&(_, code)| PhysicalKey::new(code))
}

fn reverse_char(table: &[(char, u16)], key: PhysicalKey) -> Option<char> {
    table
        .iter()
        .find(|&&(_, code)| code == key.code())
        .map(|&(ch, _)| ch)
}
