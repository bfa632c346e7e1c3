//! Remap table and passthrough set, materialised from configuration.
//!
//! Both tables are built once before the input hook is installed and are
//! read-only afterwards.  [`build_tables`] either returns both complete
//! tables or an error; a partially built table never escapes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hotkey::{parse_hotkey, parse_single, CharLookup, HotkeyTuple, KeySpecError};
use super::key::PhysicalKey;
use crate::keymap::PlatformKeymap;

/// One `{from, to}` pair from the `remap_keys` configuration list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapEntry {
    pub from: String,
    pub to: String,
}

impl RemapEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A malformed remap entry or passthrough hotkey.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remap_keys[{index}] ({from:?} -> {to:?}): {source}")]
    Remap {
        index: usize,
        from: String,
        to: String,
        #[source]
        source: KeySpecError,
    },

    #[error("passthrough_hotkeys[{index}]: {source}")]
    Passthrough {
        index: usize,
        #[source]
        source: KeySpecError,
    },
}

/// Source key to target key.  Each source appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: HashMap<PhysicalKey, PhysicalKey>,
}

impl RemapTable {
    /// Target for `source`, or `None` if the key is not remapped.
    pub fn get(&self, source: PhysicalKey) -> Option<PhysicalKey> {
        self.entries.get(&source).copied()
    }

    pub fn contains(&self, source: PhysicalKey) -> bool {
        self.entries.contains_key(&source)
    }

    /// All remapped source keys, in no particular order.
    pub fn sources(&self) -> impl Iterator<Item = PhysicalKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hotkeys that bypass remapping and are replayed verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassthroughSet {
    hotkeys: HashSet<HotkeyTuple>,
}

impl PassthroughSet {
    pub fn contains(&self, hotkey: &HotkeyTuple) -> bool {
        self.hotkeys.contains(hotkey)
    }

    pub fn len(&self) -> usize {
        self.hotkeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotkeys.is_empty()
    }
}

/// The two read-only tables the decision engine runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTables {
    pub remaps: RemapTable,
    pub passthrough: PassthroughSet,
}

/// Canonicalises every remap entry and passthrough spec.
///
/// When several entries share a `from` key, the last one wins.  This matches
/// reading the list top to bottom and letting later lines override earlier
/// ones.
pub fn build_tables(
    remap_entries: &[RemapEntry],
    passthrough_specs: &[String],
    keymap: &dyn PlatformKeymap,
    chars: &dyn CharLookup,
) -> Result<KeyTables, ConfigError> {
    let mut entries = HashMap::with_capacity(remap_entries.len());
    for (index, entry) in remap_entries.iter().enumerate() {
        let wrap = |source| ConfigError::Remap {
            index,
            from: entry.from.clone(),
            to: entry.to.clone(),
            source,
        };
        let from = parse_single(&entry.from, keymap, chars).map_err(wrap)?;
        let to = parse_single(&entry.to, keymap, chars).map_err(wrap)?;
        if let Some(previous) = entries.insert(from, to) {
            tracing::debug!(from = %entry.from, %previous, %to, "duplicate remap source, later entry wins");
        }
    }

    let mut hotkeys = HashSet::with_capacity(passthrough_specs.len());
    for (index, spec) in passthrough_specs.iter().enumerate() {
        let tuple = parse_hotkey(spec, keymap, chars)
            .map_err(|source| ConfigError::Passthrough { index, source })?;
        hotkeys.insert(tuple);
    }

    Ok(KeyTables {
        remaps: RemapTable { entries },
        passthrough: PassthroughSet { hotkeys },
    })
}
