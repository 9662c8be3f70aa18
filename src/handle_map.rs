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

//! Dense/sparse generational storage
//!
//! [`HandleMap`] keeps live items contiguous for cache-friendly per-frame
//! iteration while handing callers stable 64-bit [`Handle`]s. Removal
//! swap-pops the dense array; a sparse indirection array absorbs the
//! reshuffling so outstanding handles keep resolving. [`HandleIndex`] is the
//! sparse side on its own, shared by every store type in the crate so the
//! allocate/free/swap-fixup sequence exists exactly once.

use smallvec::SmallVec;

use crate::error::{EcsError, Result};
use crate::handle::Handle;

/// Sparse-slot index marking the end of the embedded free list.
pub const FREE_LIST_END: u32 = u32::MAX;

/// Dense-to-sparse back-pointer, parallel to the dense item array.
///
/// Invariant: `sparse[meta[d].sparse_index].index == d` for every live
/// dense index `d`. The pair is fixed up together on every swap-pop.
#[derive(Debug, Clone, Copy)]
struct DenseMeta {
    sparse_index: u32,
}

/// Outcome of freeing a slot: which dense index was vacated and whether the
/// dense tail was swapped into it. Item storage mirrors this with its own
/// `swap_remove`.
#[derive(Debug, Clone, Copy)]
pub struct Removal {
    pub dense_index: usize,
    pub swapped: bool,
}

/// The sparse half of a [`HandleMap`]: stable slots, generation counters,
/// and a FIFO free list threaded through the slot array itself.
///
/// Generations are 16 bits and a slot's counter wraps after 65536 reuse
/// cycles, at which point a handle old enough to span the whole cycle could
/// alias a fresh one. The counter skips 0 on wrap so the null handle stays
/// unambiguous.
#[derive(Debug, Clone)]
pub struct HandleIndex {
    /// Inner ids. Active: `index` is the dense position. Free: `index` is
    /// the next free sparse slot, or `FREE_LIST_END` at the tail.
    sparse: Vec<Handle>,
    meta: Vec<DenseMeta>,
    free_front: u32,
    free_back: u32,
    type_id: u16,
}

impl HandleIndex {
    pub fn new(type_id: u16) -> Self {
        Self::with_capacity(type_id, 0)
    }

    pub fn with_capacity(type_id: u16, capacity: usize) -> Self {
        Self {
            sparse: Vec::with_capacity(capacity),
            meta: Vec::with_capacity(capacity),
            free_front: FREE_LIST_END,
            free_back: FREE_LIST_END,
            type_id,
        }
    }

    /// Tag stamped into every handle this index issues.
    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    /// Number of live slots (equals the dense length).
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Allocate a slot for the next dense position and issue its handle.
    ///
    /// Recycles the oldest freed slot first (FIFO); grows the sparse array
    /// only when no freed slot remains. Fresh slots start at generation 1 so
    /// no issued handle is ever the all-zero null value.
    pub fn alloc(&mut self) -> Handle {
        let dense_index = self.meta.len() as u32;

        let outer = if self.free_front == FREE_LIST_END {
            let sparse_index = self.sparse.len() as u32;
            self.sparse.push(Handle::new(dense_index, 1, self.type_id));
            Handle::new(sparse_index, 1, self.type_id)
        } else {
            let sparse_index = self.free_front;
            let slot = &mut self.sparse[sparse_index as usize];
            // The embedded next-free pointer must be read before the slot
            // is repurposed to point at the dense tail.
            self.free_front = slot.index;
            slot.free = false;
            slot.index = dense_index;
            let generation = slot.generation;
            if self.free_front == FREE_LIST_END {
                self.free_back = FREE_LIST_END;
            }
            Handle::new(sparse_index, generation, self.type_id)
        };

        self.meta.push(DenseMeta {
            sparse_index: outer.index,
        });
        outer
    }

    /// Free the slot behind `handle`.
    ///
    /// Bumps the slot generation (invalidating every copy of the handle),
    /// links the slot onto the free-list tail, and swap-pops the meta array.
    /// Returns which dense index was vacated so item storage can mirror the
    /// swap. Fails without mutating anything if the handle does not
    /// validate.
    pub fn free(&mut self, handle: Handle) -> Result<Removal> {
        let dense_index = self.dense_index_of(handle)?;
        let sparse_index = handle.index;

        let slot = &mut self.sparse[sparse_index as usize];
        slot.free = true;
        slot.generation = next_generation(slot.generation);
        slot.index = FREE_LIST_END;

        if self.free_back == FREE_LIST_END {
            self.free_front = sparse_index;
        } else {
            self.sparse[self.free_back as usize].index = sparse_index;
        }
        self.free_back = sparse_index;

        let last = self.meta.len() - 1;
        let swapped = dense_index != last;
        if swapped {
            self.meta.swap(dense_index, last);
            // The tail item now lives at dense_index; repoint its slot.
            let moved_sparse = self.meta[dense_index].sparse_index;
            self.sparse[moved_sparse as usize].index = dense_index as u32;
        }
        self.meta.pop();

        Ok(Removal {
            dense_index,
            swapped,
        })
    }

    /// Resolve a handle to its dense index, applying all three validity
    /// checks: type tag, generation, bounds.
    pub fn dense_index_of(&self, handle: Handle) -> Result<usize> {
        if handle.type_id != self.type_id {
            return Err(EcsError::TypeMismatch {
                expected: self.type_id,
                actual: handle.type_id,
            });
        }
        let slot = self
            .sparse
            .get(handle.index as usize)
            .ok_or(EcsError::IndexOutOfRange)?;
        if slot.free || handle.free || slot.generation != handle.generation {
            return Err(EcsError::StaleHandle);
        }
        let dense_index = slot.index as usize;
        if dense_index >= self.meta.len() {
            return Err(EcsError::IndexOutOfRange);
        }
        Ok(dense_index)
    }

    /// Resolve without validation. Hot-loop fast path.
    ///
    /// # Safety
    /// `handle` must be valid for this index (`is_valid` returned true and
    /// no erase has happened since).
    pub unsafe fn dense_index_unchecked(&self, handle: Handle) -> usize {
        self.sparse.get_unchecked(handle.index as usize).index as usize
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.dense_index_of(handle).is_ok()
    }

    /// Reconstruct the outer handle of the item at a dense index.
    ///
    /// # Panics
    /// Panics if `dense_index` is out of bounds.
    pub fn handle_at_dense(&self, dense_index: usize) -> Handle {
        let sparse_index = self.meta[dense_index].sparse_index;
        let slot = self.sparse[sparse_index as usize];
        Handle::new(sparse_index, slot.generation, self.type_id)
    }

    /// Free every live slot, recycling them in dense order.
    pub fn clear(&mut self) {
        for d in 0..self.meta.len() {
            let sparse_index = self.meta[d].sparse_index;
            let slot = &mut self.sparse[sparse_index as usize];
            slot.free = true;
            slot.generation = next_generation(slot.generation);
            slot.index = FREE_LIST_END;

            if self.free_back == FREE_LIST_END {
                self.free_front = sparse_index;
            } else {
                self.sparse[self.free_back as usize].index = sparse_index;
            }
            self.free_back = sparse_index;
        }
        self.meta.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.sparse.reserve(additional);
        self.meta.reserve(additional);
    }
}

/// Bump a slot generation, skipping 0 on wraparound.
fn next_generation(generation: u16) -> u16 {
    match generation.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}

/// Generational map from [`Handle`]s to densely stored items.
///
/// Insert, erase, and lookup are O(1); iteration walks a contiguous array
/// in dense order (not insertion order) and is invalidated by any insert or
/// erase. Not internally synchronized: mutate from one phase at a time.
#[derive(Debug, Clone)]
pub struct HandleMap<T> {
    index: HandleIndex,
    items: Vec<T>,
}

impl<T> HandleMap<T> {
    /// Create an empty map issuing handles tagged `type_id`.
    pub fn new(type_id: u16) -> Self {
        Self {
            index: HandleIndex::new(type_id),
            items: Vec::new(),
        }
    }

    pub fn with_capacity(type_id: u16, capacity: usize) -> Self {
        Self {
            index: HandleIndex::with_capacity(type_id, capacity),
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn type_id(&self) -> u16 {
        self.index.type_id()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.index.reserve(additional);
        self.items.reserve(additional);
    }

    /// Insert an item, returning its handle.
    pub fn insert(&mut self, item: T) -> Handle {
        let handle = self.index.alloc();
        self.items.push(item);
        handle
    }

    /// Erase the item behind `handle`.
    ///
    /// Returns the number of items removed: 1, or 0 if the handle is
    /// invalid. The invalid path mutates nothing.
    pub fn erase(&mut self, handle: Handle) -> usize {
        match self.index.free(handle) {
            Ok(removal) => {
                self.items.swap_remove(removal.dense_index);
                1
            }
            Err(_) => 0,
        }
    }

    /// Checked lookup.
    pub fn get(&self, handle: Handle) -> Result<&T> {
        let dense_index = self.index.dense_index_of(handle)?;
        Ok(&self.items[dense_index])
    }

    /// Checked mutable lookup.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T> {
        let dense_index = self.index.dense_index_of(handle)?;
        Ok(&mut self.items[dense_index])
    }

    /// Unchecked lookup. Hot-loop fast path.
    ///
    /// # Safety
    /// `handle` must be valid for this map (`is_valid` returned true and no
    /// erase has happened since).
    pub unsafe fn get_unchecked(&self, handle: Handle) -> &T {
        let dense_index = self.index.dense_index_unchecked(handle);
        self.items.get_unchecked(dense_index)
    }

    /// Unchecked mutable lookup.
    ///
    /// # Safety
    /// Same contract as [`HandleMap::get_unchecked`].
    pub unsafe fn get_unchecked_mut(&mut self, handle: Handle) -> &mut T {
        let dense_index = self.index.dense_index_unchecked(handle);
        self.items.get_unchecked_mut(dense_index)
    }

    /// True if the handle still resolves: matching type tag, matching
    /// generation, in-bounds dense index.
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.index.is_valid(handle)
    }

    /// Outer handle of the item at a dense index.
    ///
    /// # Panics
    /// Panics if `dense_index >= len()`.
    pub fn handle_at_dense(&self, dense_index: usize) -> Handle {
        self.index.handle_at_dense(dense_index)
    }

    /// Dense items as a slice, in dense order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Iterate `(handle, item)` pairs in dense order.
    pub fn iter_with_handles(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(d, item)| (self.index.handle_at_dense(d), item))
    }

    /// Erase all items. Slots are recycled in dense order and every
    /// outstanding handle is invalidated.
    pub fn clear(&mut self) {
        self.index.clear();
        self.items.clear();
    }

    /// Insert `count` default-constructed items, returning their handles.
    pub fn insert_batch(&mut self, count: usize) -> Vec<Handle>
    where
        T: Default,
    {
        self.reserve(count);
        (0..count).map(|_| self.insert(T::default())).collect()
    }

    /// Erase a batch of handles, returning how many were live.
    ///
    /// Handles are sorted and deduplicated first (handle ordering groups
    /// duplicates adjacently), so a handle appearing twice in the batch is
    /// erased once rather than once plus a stale miss.
    pub fn erase_batch(&mut self, handles: &[Handle]) -> usize {
        let mut sorted: SmallVec<[Handle; 16]> = SmallVec::from_slice(handles);
        sorted.sort();
        sorted.dedup();
        sorted.iter().map(|&h| self.erase(h)).sum()
    }

    #[cfg(feature = "parallel")]
    /// Parallel iteration over the dense items.
    pub fn par_items(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        use rayon::prelude::*;
        self.items.par_iter()
    }

    #[cfg(feature = "parallel")]
    /// Parallel mutable iteration over the dense items.
    pub fn par_items_mut(&mut self) -> rayon::slice::IterMut<'_, T>
    where
        T: Send,
    {
        use rayon::prelude::*;
        self.items.par_iter_mut()
    }
}

impl<'a, T> IntoIterator for &'a HandleMap<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut HandleMap<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE_A: u16 = 7;
    const TYPE_B: u16 = 8;

    #[test]
    fn test_insert_round_trip() {
        let mut map = HandleMap::new(TYPE_A);
        let h = map.insert(42u32);
        assert_eq!(h.index(), 0);
        assert_eq!(h.generation(), 1);
        assert_eq!(h.type_id(), TYPE_A);
        assert!(!h.is_free());
        assert_eq!(*map.get(h).unwrap(), 42);
    }

    #[test]
    fn test_basic_lifecycle() {
        let mut map = HandleMap::new(TYPE_A);
        let h1 = map.insert(42u32);
        let h2 = map.insert(7u32);
        assert_eq!((h1.index(), h1.generation()), (0, 1));
        assert_eq!((h2.index(), h2.generation()), (1, 1));

        assert_eq!(map.erase(h1), 1);

        // Slot 0 is recycled with its generation bumped.
        let h3 = map.insert(99u32);
        assert_eq!((h3.index(), h3.generation()), (0, 2));
        assert_eq!(*map.get(h2).unwrap(), 7);
        assert_eq!(*map.get(h3).unwrap(), 99);
        assert!(!map.is_valid(h1));
    }

    #[test]
    fn test_stale_handle_detected() {
        let mut map = HandleMap::new(TYPE_A);
        let h = map.insert(1u32);
        assert_eq!(map.erase(h), 1);
        assert!(!map.is_valid(h));
        assert_eq!(map.get(h), Err(EcsError::StaleHandle));
        // Erasing again is a counted no-op, not an error.
        assert_eq!(map.erase(h), 0);
    }

    #[test]
    fn test_type_mismatch_detected() {
        let mut map_a = HandleMap::new(TYPE_A);
        let map_b = HandleMap::<u32>::new(TYPE_B);
        let h = map_a.insert(1u32);
        assert_eq!(
            map_b.get(h),
            Err(EcsError::TypeMismatch {
                expected: TYPE_B,
                actual: TYPE_A
            })
        );
        assert!(!map_b.is_valid(h));
    }

    #[test]
    fn test_foreign_index_out_of_range() {
        let map = HandleMap::<u32>::new(TYPE_A);
        let h = Handle::new(12, 1, TYPE_A);
        assert_eq!(map.get(h), Err(EcsError::IndexOutOfRange));
    }

    #[test]
    fn test_swap_pop_keeps_survivors_resolving() {
        let mut map = HandleMap::new(TYPE_A);
        let handles: Vec<_> = (0..10u32).map(|v| map.insert(v)).collect();

        // Erase a middle item: the tail moves into its dense slot.
        assert_eq!(map.erase(handles[3]), 1);
        assert_eq!(map.len(), 9);
        assert!(!map.items().contains(&3));

        for (i, &h) in handles.iter().enumerate() {
            if i == 3 {
                assert!(!map.is_valid(h));
            } else {
                assert_eq!(*map.get(h).unwrap(), i as u32);
            }
        }
    }

    #[test]
    fn test_erase_last_item_no_swap() {
        let mut map = HandleMap::new(TYPE_A);
        let h1 = map.insert(1u32);
        let h2 = map.insert(2u32);
        assert_eq!(map.erase(h2), 1);
        assert_eq!(*map.get(h1).unwrap(), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_free_list_fifo_reuse() {
        let mut map = HandleMap::new(TYPE_A);
        let a = map.insert(0u32);
        let b = map.insert(1u32);
        let _c = map.insert(2u32);

        map.erase(a);
        map.erase(b);

        // Oldest freed slot comes back first.
        let first = map.insert(10u32);
        let second = map.insert(11u32);
        assert_eq!(first.index(), a.index());
        assert_eq!(second.index(), b.index());
        assert_eq!(first.generation(), 2);
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_free_list_drains_then_grows() {
        let mut map = HandleMap::new(TYPE_A);
        let a = map.insert(0u32);
        map.erase(a);
        let b = map.insert(1u32);
        assert_eq!(b.index(), 0);
        // Free list is now empty; the next insert must grow the sparse array.
        let c = map.insert(2u32);
        assert_eq!(c.index(), 1);
        assert_eq!(c.generation(), 1);
    }

    #[test]
    fn test_dense_iteration_order() {
        let mut map = HandleMap::new(TYPE_A);
        let handles: Vec<_> = (0..5u32).map(|v| map.insert(v)).collect();
        map.erase(handles[0]);
        // Swap-pop moved the tail into dense slot 0.
        assert_eq!(map.items(), &[4, 1, 2, 3]);

        let pairs: Vec<_> = map.iter_with_handles().map(|(h, &v)| (h, v)).collect();
        for (h, v) in pairs {
            assert_eq!(*map.get(h).unwrap(), v);
        }
    }

    #[test]
    fn test_handle_at_dense_round_trip() {
        let mut map = HandleMap::new(TYPE_A);
        for v in 0..6u32 {
            map.insert(v);
        }
        for d in 0..map.len() {
            let h = map.handle_at_dense(d);
            assert_eq!(*map.get(h).unwrap(), map.items()[d]);
        }
    }

    #[test]
    fn test_insert_batch_and_erase_batch() {
        let mut map = HandleMap::<u64>::new(TYPE_A);
        let handles = map.insert_batch(8);
        assert_eq!(map.len(), 8);

        // Duplicate handle in the batch counts once.
        let batch = [handles[1], handles[4], handles[1]];
        assert_eq!(map.erase_batch(&batch), 2);
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut map = HandleMap::new(TYPE_A);
        let handles: Vec<_> = (0..4u32).map(|v| map.insert(v)).collect();
        map.clear();
        assert!(map.is_empty());
        for h in handles {
            assert!(!map.is_valid(h));
        }
        // Cleared slots are reusable.
        let h = map.insert(9u32);
        assert!(h.index() < 4);
        assert_eq!(h.generation(), 2);
    }

    #[test]
    fn test_generation_wrap_skips_zero() {
        assert_eq!(next_generation(u16::MAX), 1);
        assert_eq!(next_generation(1), 2);
    }

    #[test]
    fn test_interleaved_churn_invariants() {
        // Deterministic interleaving of inserts and erases; after every
        // operation each surviving handle must still resolve to its value
        // and the dense arrays must stay mutually consistent.
        let mut map = HandleMap::new(TYPE_A);
        let mut live: Vec<(Handle, u32)> = Vec::new();
        let mut next = 0u32;

        for step in 0..200usize {
            if step % 3 != 2 || live.is_empty() {
                let h = map.insert(next);
                live.push((h, next));
                next += 1;
            } else {
                // pseudo-arbitrary victim
                let victim = (step * 7919) % live.len();
                let (h, _) = live.swap_remove(victim);
                assert_eq!(map.erase(h), 1);
            }

            assert_eq!(map.len(), live.len());
            for &(h, v) in &live {
                assert_eq!(*map.get(h).unwrap(), v);
            }
            for d in 0..map.len() {
                let h = map.handle_at_dense(d);
                assert_eq!(*map.get(h).unwrap(), map.items()[d]);
            }
        }
    }
}
