//! Key and modifier primitives shared by every layer of the engine.
//!
//! A [`PhysicalKey`] is whatever integer the operating system uses to name a
//! key (a `CGKeyCode` on macOS, a virtual-key code on Windows).  The engine
//! never interprets the number itself; all knowledge about what a code means
//! lives in a [`crate::keymap::PlatformKeymap`].

use std::fmt;

/// An opaque platform key code identifying a key independent of modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalKey(u16);

impl PhysicalKey {
    /// Wraps a raw platform key code.
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the raw platform key code.
    pub const fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// One of the four modifier categories tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Alt,
    /// Command on macOS, the Windows key elsewhere.
    Cmd,
    Shift,
}

impl Modifier {
    /// All modifiers in canonical order.
    ///
    /// This order is used for serialising hotkeys and for the press sequence
    /// when a passthrough hotkey is replayed.
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Cmd, Modifier::Shift];

    /// The token used for this modifier in key-spec strings.
    pub const fn token(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Cmd => "cmd",
            Modifier::Shift => "shift",
        }
    }

    /// Parses a modifier token (`ctrl`, `alt`, `cmd`, `shift`).  Case-sensitive;
    /// callers lowercase first.
    pub fn from_token(token: &str) -> Option<Self> {
        Modifier::ALL.into_iter().find(|m| m.token() == token)
    }
}

/// Which of the four modifier categories are held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierState {
    pub ctrl: bool,
    pub alt: bool,
    pub cmd: bool,
    pub shift: bool,
}

impl ModifierState {
    /// No modifiers held.
    pub const NONE: ModifierState = ModifierState {
        ctrl: false,
        alt: false,
        cmd: false,
        shift: false,
    };

    /// Returns `true` if `modifier` is held.
    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Cmd => self.cmd,
            Modifier::Shift => self.shift,
        }
    }

    /// Marks `modifier` as held.
    pub fn insert(&mut self, modifier: Modifier) {
        match modifier {
            Modifier::Ctrl => self.ctrl = true,
            Modifier::Alt => self.alt = true,
            Modifier::Cmd => self.cmd = true,
            Modifier::Shift => self.shift = true,
        }
    }

    /// Builder form of [`ModifierState::insert`].
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    /// Held modifiers in canonical order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }

    /// Returns `true` if no modifier is held.
    pub fn is_empty(&self) -> bool {
        *self == ModifierState::NONE
    }
}

/// Raw modifier flag bits as delivered by the OS hook.
///
/// On macOS these are `CGEventFlags` bits.  Windows has no flag word on a
/// keyboard hook event, so the adapter composes one from the live key state
/// using the bit layout defined by [`crate::keymap::WindowsKeymap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawFlags(pub u64);

impl RawFlags {
    pub const EMPTY: RawFlags = RawFlags(0);

    /// Returns the raw bit pattern.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if every bit of `mask` is set.
    pub const fn contains(self, mask: RawFlags) -> bool {
        mask.0 != 0 && self.0 & mask.0 == mask.0
    }

    /// Returns these flags with every bit of `mask` cleared.
    pub const fn without(self, mask: RawFlags) -> RawFlags {
        RawFlags(self.0 & !mask.0)
    }

    /// Returns the union of both bit sets.
    pub const fn union(self, other: RawFlags) -> RawFlags {
        RawFlags(self.0 | other.0)
    }
}
