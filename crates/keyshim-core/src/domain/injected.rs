//! Bookkeeping of keys the engine itself is holding down.
//!
//! When a remap synthesises a key-down, the key is remembered here until the
//! matching key-up.  A passthrough hotkey first releases everything still
//! held so the target never sees a stuck synthetic key.
//!
//! The set is owned by the decision engine and only touched from the hook
//! callback, so it needs no locking.

use std::collections::BTreeSet;

use super::key::PhysicalKey;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InjectedKeySet {
    // Ordered so release sequences are deterministic.
    down: BTreeSet<PhysicalKey>,
}

impl InjectedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_down(&mut self, key: PhysicalKey) {
        self.down.insert(key);
    }

    pub fn mark_up(&mut self, key: PhysicalKey) {
        self.down.remove(&key);
    }

    pub fn contains(&self, key: PhysicalKey) -> bool {
        self.down.contains(&key)
    }

    /// Returns every key currently marked down and clears the set.
    pub fn release_all(&mut self) -> Vec<PhysicalKey> {
        std::mem::take(&mut self.down).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.down.len()
    }

    pub fn is_empty(&self) -> bool {
        self.down.is_empty()
    }
}
