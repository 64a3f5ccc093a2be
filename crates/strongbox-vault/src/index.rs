//! Key index.
//!
//! Maps lookup keys of one namespace to their storage slots, enforces key
//! uniqueness, and iterates in key order so a single `list` call sees a
//! stable sequence. Slots whose blobs could not be read when the index was
//! built are tracked separately so operations on them report corruption
//! instead of pretending the key is absent.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, VaultError};
use crate::types::{LookupKey, SecretClass, SlotId};

#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    entries: BTreeMap<LookupKey, SlotId>,
    unreadable: BTreeSet<SlotId>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`. Fails with `DuplicateEntry` if it is already live.
    pub fn insert(&mut self, key: LookupKey) -> Result<&SlotId> {
        use std::collections::btree_map::Entry;

        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Err(VaultError::DuplicateEntry(occupied.key().to_string())),
            Entry::Vacant(vacant) => {
                let slot = vacant.key().slot_id();
                Ok(vacant.insert(slot))
            }
        }
    }

    pub fn get(&self, key: &LookupKey) -> Option<&SlotId> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &LookupKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop `key`, returning its slot if it was live.
    pub fn remove(&mut self, key: &LookupKey) -> Option<SlotId> {
        self.entries.remove(key)
    }

    pub fn mark_unreadable(&mut self, slot: SlotId) {
        self.unreadable.insert(slot);
    }

    pub fn is_unreadable(&self, slot: &SlotId) -> bool {
        self.unreadable.contains(slot)
    }

    /// Forget an unreadable slot once it has been removed or overwritten.
    pub fn clear_unreadable(&mut self, slot: &SlotId) -> bool {
        self.unreadable.remove(slot)
    }

    pub fn unreadable(&self) -> impl Iterator<Item = &SlotId> {
        self.unreadable.iter()
    }

    /// Live keys of `class`, in key order.
    pub fn iter_class(&self, class: SecretClass) -> impl Iterator<Item = (&LookupKey, &SlotId)> {
        self.entries.iter().filter(move |(key, _)| key.class() == class)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LookupKey, &SlotId)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.unreadable.clear();
    }
}
