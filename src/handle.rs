// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Generational handles
//!
//! A `Handle` is a 64-bit reference into a [`HandleMap`](crate::HandleMap):
//! a sparse-array index, a per-slot generation counter, a store type tag,
//! and a free flag, packed into one integer for cheap comparison and for
//! crossing the C boundary.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Largest representable type tag (15 bits).
pub const MAX_TYPE_ID: u16 = 0x7FFF;

/// Type tag reserved for entity stores.
pub const ENTITY_TYPE_ID: u16 = 0;

/// Entity identifier. The `type_id` field is always [`ENTITY_TYPE_ID`].
pub type EntityId = Handle;

/// Component identifier. The `type_id` field names the store holding it.
pub type ComponentId = Handle;

/// Generational handle to an item in a [`HandleMap`](crate::HandleMap).
///
/// Packed layout (used for ordering, hashing, and FFI):
///
/// ```text
/// bit 63      bits 48..=62   bits 32..=47   bits 0..=31
/// [free:1]    [type_id:15]   [generation:16] [index:32]
/// ```
///
/// Ordering compares the packed value, so handles sort by free flag, then
/// type tag, then generation, then index. Free slots group together and
/// live handles group by store.
///
/// A live handle always carries `free == false` and a nonzero generation;
/// the all-zero value is [`Handle::null`] and is never issued by any store.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u16,
    pub(crate) type_id: u16,
    pub(crate) free: bool,
}

impl Handle {
    /// The reserved null handle (all fields zero).
    pub const fn null() -> Self {
        Self {
            index: 0,
            generation: 0,
            type_id: 0,
            free: false,
        }
    }

    /// Build a live handle. Callers outside the store layer should never
    /// need this; handles are issued by `insert`.
    pub(crate) const fn new(index: u32, generation: u16, type_id: u16) -> Self {
        Self {
            index,
            generation,
            type_id,
            free: false,
        }
    }

    /// Sparse-array index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at the time this handle was issued.
    pub const fn generation(&self) -> u16 {
        self.generation
    }

    /// Tag of the store this handle belongs to.
    pub const fn type_id(&self) -> u16 {
        self.type_id
    }

    /// Free flag. Always `false` for handles issued to callers; set only on
    /// the inner ids a store threads its free list through.
    pub const fn is_free(&self) -> bool {
        self.free
    }

    /// True for the reserved all-zero handle.
    ///
    /// Stores start generations at 1, so no issued handle ever compares
    /// equal to null. Stale handles are *not* null; use
    /// [`HandleMap::is_valid`](crate::HandleMap::is_valid) for liveness.
    pub const fn is_null(&self) -> bool {
        self.to_bits() == 0
    }

    /// Pack into the 64-bit wire representation.
    pub const fn to_bits(&self) -> u64 {
        ((self.free as u64) << 63)
            | (((self.type_id & MAX_TYPE_ID) as u64) << 48)
            | ((self.generation as u64) << 32)
            | (self.index as u64)
    }

    /// Unpack from the 64-bit wire representation.
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u16,
            type_id: ((bits >> 48) as u16) & MAX_TYPE_ID,
            free: (bits >> 63) != 0,
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Eq for Handle {}

impl PartialOrd for Handle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Handle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bits().cmp(&other.to_bits())
    }
}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("type_id", &self.type_id)
            .field("free", &self.free)
            .finish()
    }
}
