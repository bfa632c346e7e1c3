//! # keyshim-core
//!
//! Platform-independent heart of keyshim, a keyboard remapper that sits
//! between the physical keyboard and one target application (typically a
//! game-streaming client) and rewrites keys only while that application has
//! focus.
//!
//! This crate has zero dependencies on OS APIs.  Everything that touches the
//! OS (hooks, injection, window queries) lives in `keyshim-desktop` and talks
//! to this crate through the [`KeySynthesizer`] trait and the normalised
//! [`InputEvent`] type.
//!
//! # Architecture overview (for beginners)
//!
//! - **`domain`** – Plain data: key and modifier primitives, hotkey parsing,
//!   the remap table and passthrough set built from configuration, the
//!   injected-key bookkeeping, and the focus state shared with the monitor.
//!
//! - **`keymap`** – Per-platform key vocabularies.  They know which integer
//!   code a name like `f13` means on macOS or Windows, and which flag bit
//!   each modifier sets.
//!
//! - **`engine`** – The [`DecisionEngine`], which looks at one key event at a
//!   time and decides whether to pass it through, strip some of its
//!   modifier flags, or swallow it and inject replacement keys.

pub mod domain;
pub mod engine;
pub mod keymap;

pub use domain::focus::{ClipRegion, FocusState, SharedFocus, WindowBounds};
pub use domain::hotkey::{
    parse_hotkey, parse_single, AnsiCharLookup, CharLookup, HotkeyTuple, KeySpecError,
};
pub use domain::injected::InjectedKeySet;
pub use domain::key::{Modifier, ModifierState, PhysicalKey, RawFlags};
pub use domain::tables::{build_tables, ConfigError, KeyTables, PassthroughSet, RemapEntry, RemapTable};
pub use engine::{
    Decision, DecisionEngine, EventKind, HookFault, InputEvent, KeySynthesizer, Keystroke,
    SynthesisError,
};
pub use keymap::{MacosKeymap, PlatformKeymap, WindowsKeymap};
