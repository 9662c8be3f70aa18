//! Component mask and mask-to-entity index.
//! The mask is a single u64 word - direct bitwise ops, no allocation.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::handle::EntityId;

/// Width of [`ComponentMask`]; type tags must stay below this.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Fixed-width bitset of component type tags an entity currently has.
///
/// Packs to a u64 (`to_bits`) for use as the mask-index key. Widening the
/// key type is required before raising [`MAX_COMPONENT_TYPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ComponentMask(u64);

impl ComponentMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Set the bit for `type_id`.
    ///
    /// # Panics
    /// Panics if `type_id >= MAX_COMPONENT_TYPES`.
    pub fn set(&mut self, type_id: u16) {
        assert!((type_id as usize) < MAX_COMPONENT_TYPES);
        self.0 |= 1 << type_id;
    }

    /// Clear the bit for `type_id`.
    pub fn clear(&mut self, type_id: u16) {
        assert!((type_id as usize) < MAX_COMPONENT_TYPES);
        self.0 &= !(1 << type_id);
    }

    pub fn contains(&self, type_id: u16) -> bool {
        (type_id as usize) < MAX_COMPONENT_TYPES && (self.0 & (1 << type_id)) != 0
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains_all(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Builder-style set, for composing query masks.
    pub fn with(mut self, type_id: u16) -> Self {
        self.set(type_id);
        self
    }

    /// Returns iterator over set type tags
    pub fn ones(&self) -> OnesIter {
        OnesIter { word: self.0 }
    }
}

pub struct OnesIter {
    word: u64,
}

impl Iterator for OnesIter {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.word == 0 {
            return None;
        }
        let trailing = self.word.trailing_zeros();
        self.word &= !(1 << trailing); // Clear the bit we just found
        Some(trailing as u16)
    }
}

/// Multimap from packed component mask to the entities carrying it.
///
/// Maintained incrementally: every mask change on an entity removes the
/// old-mask entry and inserts the new one, so each live entity appears
/// under exactly one key at all times.
#[derive(Debug, Clone, Default)]
pub struct MaskIndex {
    entries: AHashMap<u64, SmallVec<[EntityId; 4]>>,
}

impl MaskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entity` under `mask`.
    pub fn insert(&mut self, mask: ComponentMask, entity: EntityId) {
        self.entries.entry(mask.to_bits()).or_default().push(entity);
    }

    /// Remove `entity` from under `mask`. Returns false if it was not there.
    pub fn remove(&mut self, mask: ComponentMask, entity: EntityId) -> bool {
        let key = mask.to_bits();
        let Some(ids) = self.entries.get_mut(&key) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|&id| id == entity) else {
            return false;
        };
        ids.swap_remove(pos);
        if ids.is_empty() {
            self.entries.remove(&key);
        }
        true
    }

    /// Move `entity` from its old mask key to its new one.
    pub fn update(&mut self, old: ComponentMask, new: ComponentMask, entity: EntityId) {
        if old == new {
            return;
        }
        self.remove(old, entity);
        self.insert(new, entity);
    }

    /// Entities whose mask is exactly `mask`.
    pub fn entities_with_mask(&self, mask: ComponentMask) -> &[EntityId] {
        self.entries
            .get(&mask.to_bits())
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Entities whose mask contains every bit of `required`.
    ///
    /// Walks the distinct mask keys, not the entities, so the cost scales
    /// with how many component combinations exist.
    pub fn entities_with_all(&self, required: ComponentMask) -> Vec<EntityId> {
        let mut out = Vec::new();
        for (&key, ids) in &self.entries {
            if ComponentMask::from_bits(key).contains_all(required) {
                out.extend_from_slice(ids);
            }
        }
        out
    }

    /// Number of distinct mask keys currently indexed.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of indexed entities.
    pub fn entity_count(&self) -> usize {
        self.entries.values().map(|ids| ids.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
