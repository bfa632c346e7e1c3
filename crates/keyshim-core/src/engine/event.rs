//! Normalised keyboard event model.

use crate::domain::key::{PhysicalKey, RawFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    /// A modifier (or other flag-only key) changed state.  macOS reports
    /// these separately from ordinary key presses; Windows never does.
    FlagsChanged,
}

/// One keyboard event as seen by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub key: PhysicalKey,
    /// Live modifier flags at the time of the event.
    pub flags: RawFlags,
}

impl InputEvent {
    pub fn new(kind: EventKind, key: PhysicalKey, flags: RawFlags) -> Self {
        Self { kind, key, flags }
    }

    pub fn key_down(key: PhysicalKey, flags: RawFlags) -> Self {
        Self::new(EventKind::KeyDown, key, flags)
    }

    pub fn key_up(key: PhysicalKey, flags: RawFlags) -> Self {
        Self::new(EventKind::KeyUp, key, flags)
    }

    pub fn flags_changed(key: PhysicalKey, flags: RawFlags) -> Self {
        Self::new(EventKind::FlagsChanged, key, flags)
    }
}
