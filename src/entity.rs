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

//! Entity records.

use smallvec::SmallVec;

use crate::handle::ComponentId;
use crate::mask::ComponentMask;

/// Inline capacity of an entity's component list; spills to the heap past this.
pub const INLINE_COMPONENTS: usize = 8;

/// An entity: a component-type mask plus the ids of its attached component
/// instances.
///
/// The list can hold several components of the same type; the mask bit for
/// a type clears only when the last instance of that type detaches.
/// Entities never own component payloads - those live in the per-type
/// stores, which back-reference the entity.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    mask: ComponentMask,
    components: SmallVec<[ComponentId; INLINE_COMPONENTS]>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// Attached component ids, in attach order (disturbed by detaches).
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn has_component_type(&self, type_id: u16) -> bool {
        self.mask.contains(type_id)
    }

    /// Ids of attached components with the given type tag.
    pub fn components_of_type(&self, type_id: u16) -> impl Iterator<Item = ComponentId> + '_ {
        self.components
            .iter()
            .copied()
            .filter(move |id| id.type_id() == type_id)
    }

    /// Record an attached component. Returns true if the mask changed
    /// (first instance of its type).
    pub(crate) fn attach(&mut self, id: ComponentId) -> bool {
        let first_of_type = !self.mask.contains(id.type_id());
        self.components.push(id);
        if first_of_type {
            self.mask.set(id.type_id());
        }
        first_of_type
    }

    /// Remove one attached component id.
    ///
    /// Returns `None` if the id was not attached; otherwise whether the
    /// mask changed (last instance of its type detached).
    pub(crate) fn detach(&mut self, id: ComponentId) -> Option<bool> {
        let pos = self.components.iter().position(|&c| c == id)?;
        self.components.swap_remove(pos);
        let last_of_type = !self.components.iter().any(|c| c.type_id() == id.type_id());
        if last_of_type {
            self.mask.clear(id.type_id());
        }
        Some(last_of_type)
    }

    /// Remove every attached component of one type, returning their ids.
    /// The mask bit clears iff any were attached.
    pub(crate) fn detach_type(
        &mut self,
        type_id: u16,
    ) -> SmallVec<[ComponentId; INLINE_COMPONENTS]> {
        let mut removed = SmallVec::new();
        self.components.retain(|id| {
            if id.type_id() == type_id {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.mask.clear(type_id);
        }
        removed
    }

    /// Drain the whole component list (entity teardown). Mask resets.
    pub(crate) fn detach_all(&mut self) -> SmallVec<[ComponentId; INLINE_COMPONENTS]> {
        self.mask = ComponentMask::empty();
        std::mem::take(&mut self.components)
    }
}
