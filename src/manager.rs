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

//! Entity manager
//!
//! Owns the entity store, the per-type component stores, and the mask
//! index, and keeps the three consistent through every mutation. All state
//! is held by value and passed by reference - cross-module access goes
//! through an `&mut EntityManager`, never a global.
//!
//! Not internally synchronized: callers serialize mutation externally
//! (one frame phase at a time).

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::handle::{ComponentId, EntityId, ENTITY_TYPE_ID};
use crate::handle_map::HandleMap;
use crate::mask::{ComponentMask, MaskIndex};
use crate::store::{BlobStore, Component, ComponentRecord, ComponentRegistry};

/// Central entity/component storage.
pub struct EntityManager {
    entities: HandleMap<Entity>,
    registry: ComponentRegistry,
    mask_index: MaskIndex,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(entity_capacity: usize) -> Self {
        Self {
            entities: HandleMap::with_capacity(ENTITY_TYPE_ID, entity_capacity),
            registry: ComponentRegistry::new(),
            mask_index: MaskIndex::new(),
        }
    }

    // ---- entities ----

    /// Create an empty entity.
    ///
    /// The entity is indexed under the empty mask immediately, so every
    /// live entity has exactly one mask-index entry from birth to death.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.entities.insert(Entity::new());
        self.mask_index.insert(ComponentMask::empty(), id);
        id
    }

    /// Destroy an entity and cascade: every attached component is erased
    /// from its store and the mask-index entry is removed before the entity
    /// record itself goes away. Returns false if the handle is invalid.
    pub fn destroy_entity(&mut self, entity_id: EntityId) -> bool {
        let Ok(entity) = self.entities.get_mut(entity_id) else {
            return false;
        };
        let mask = entity.mask();
        let components = entity.detach_all();

        #[cfg(feature = "profiling")]
        let _span = info_span!(
            "manager.destroy_entity",
            components = components.len()
        )
        .entered();

        for id in components {
            self.registry.erase_component(id);
        }
        self.mask_index.remove(mask, entity_id);
        self.entities.erase(entity_id);
        true
    }

    pub fn is_valid_entity(&self, entity_id: EntityId) -> bool {
        self.entities.is_valid(entity_id)
    }

    /// Checked entity lookup.
    pub fn entity(&self, entity_id: EntityId) -> Result<&Entity> {
        self.entities.get(entity_id).map_err(|_| EcsError::InvalidEntity)
    }

    /// Current component mask of an entity.
    pub fn mask_of(&self, entity_id: EntityId) -> Result<ComponentMask> {
        Ok(self.entity(entity_id)?.mask())
    }

    /// Ids of the components attached to an entity.
    pub fn components_of(&self, entity_id: EntityId) -> Result<&[ComponentId]> {
        Ok(self.entity(entity_id)?.components())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entity ids, in dense order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter_with_handles().map(|(id, _)| id)
    }

    // ---- typed components ----

    /// Register component type `T` ahead of time (otherwise registration
    /// happens on first attach). Returns its type tag.
    pub fn register_component<T: Component>(&mut self, capacity: usize) -> Result<u16> {
        self.registry.register::<T>(capacity)
    }

    /// Type tag assigned to `T`, if registered.
    pub fn component_type_id<T: Component>(&self) -> Option<u16> {
        self.registry.typed_id::<T>()
    }

    /// Attach a component to an entity, updating its mask and the mask
    /// index. Registers `T` on first use.
    pub fn add_component<T: Component>(
        &mut self,
        entity_id: EntityId,
        component: T,
    ) -> Result<ComponentId> {
        if !self.entities.is_valid(entity_id) {
            return Err(EcsError::InvalidEntity);
        }
        self.registry.register::<T>(0)?;
        let id = self.registry.store_mut::<T>()?.insert(entity_id, component);
        self.attach_to_entity(entity_id, id)?;
        Ok(id)
    }

    /// Checked component lookup.
    pub fn get_component<T: Component>(&self, id: ComponentId) -> Result<&T> {
        let record = self.registry.store::<T>()?.get(id)?;
        Ok(&record.component)
    }

    /// Checked mutable component lookup.
    pub fn get_component_mut<T: Component>(&mut self, id: ComponentId) -> Result<&mut T> {
        let record = self.registry.store_mut::<T>()?.get_mut(id)?;
        Ok(&mut record.component)
    }

    /// Owning entity of a component, if the id is live.
    pub fn component_owner(&self, id: ComponentId) -> Option<EntityId> {
        self.registry.owner_of(id)
    }

    pub fn is_valid_component(&self, id: ComponentId) -> bool {
        self.registry.is_valid_component(id)
    }

    /// Detach one component from its owning entity and erase it from its
    /// store, updating the mask index if the entity's mask changed.
    ///
    /// Returns false if the component's store does not exist or the id is
    /// stale; expected-failure paths never error.
    pub fn remove_component(&mut self, id: ComponentId) -> bool {
        let Some(owner) = self.registry.owner_of(id) else {
            return false;
        };
        if self.registry.erase_component(id) == 0 {
            return false;
        }
        if let Ok(entity) = self.entities.get_mut(owner) {
            let old_mask = entity.mask();
            if entity.detach(id) == Some(true) {
                let new_mask = entity.mask();
                self.mask_index.update(old_mask, new_mask, owner);
            }
        }
        true
    }

    /// Remove every component of one type from an entity, cascading into
    /// the component store and the mask index.
    ///
    /// Returns false if the entity handle is invalid or no store exists for
    /// the type tag.
    pub fn remove_components_of_type(&mut self, type_id: u16, entity_id: EntityId) -> bool {
        if self.registry.store_by_id(type_id).is_none() {
            return false;
        }
        let Ok(entity) = self.entities.get_mut(entity_id) else {
            return false;
        };
        let old_mask = entity.mask();
        let removed = entity.detach_type(type_id);
        let new_mask = entity.mask();

        for id in &removed {
            self.registry.erase_component(*id);
        }
        if !removed.is_empty() {
            self.mask_index.update(old_mask, new_mask, entity_id);
        }
        true
    }

    /// Dense store for `T`, for cache-friendly bulk iteration.
    pub fn components<T: Component>(&self) -> Result<&HandleMap<ComponentRecord<T>>> {
        Ok(self.registry.store::<T>()?.map())
    }

    /// Dense store for `T`, mutable.
    pub fn components_mut<T: Component>(&mut self) -> Result<&mut HandleMap<ComponentRecord<T>>> {
        Ok(self.registry.store_mut::<T>()?.map_mut())
    }

    // ---- data components ----

    /// Create a store for runtime-registered fixed-size records, sized to
    /// the smallest bucket holding `component_size` bytes. Returns the
    /// absolute type tag to pass to [`EntityManager::add_data_component`].
    pub fn create_data_store(
        &mut self,
        runtime_type_id: u16,
        component_size: usize,
        capacity: usize,
    ) -> Result<u16> {
        let type_id = self
            .registry
            .create_data_store(runtime_type_id, component_size, capacity)?;

        #[cfg(feature = "profiling")]
        tracing::debug!(type_id, component_size, "created data component store");

        Ok(type_id)
    }

    /// Attach a zero-filled data component to an entity.
    pub fn add_data_component(&mut self, type_id: u16, entity_id: EntityId) -> Result<ComponentId> {
        if !self.entities.is_valid(entity_id) {
            return Err(EcsError::InvalidEntity);
        }
        let id = self.registry.data_store_mut(type_id)?.insert_zeroed(entity_id);
        self.attach_to_entity(entity_id, id)?;
        Ok(id)
    }

    /// Payload bytes of a data component.
    pub fn data_component(&self, id: ComponentId) -> Result<&[u8]> {
        self.registry.data_store(id.type_id())?.payload(id)
    }

    /// Mutable payload bytes of a data component.
    pub fn data_component_mut(&mut self, id: ComponentId) -> Result<&mut [u8]> {
        self.registry.data_store_mut(id.type_id())?.payload_mut(id)
    }

    /// Data-component store behind a type tag, for bulk iteration.
    pub fn data_components(&self, type_id: u16) -> Result<&BlobStore> {
        self.registry.data_store(type_id)
    }

    // ---- mask queries ----

    /// Entities whose mask is exactly `mask`.
    pub fn entities_with_mask(&self, mask: ComponentMask) -> &[EntityId] {
        self.mask_index.entities_with_mask(mask)
    }

    /// Entities carrying at least the capability set `required`.
    pub fn entities_with_all(&self, required: ComponentMask) -> Vec<EntityId> {
        self.mask_index.entities_with_all(required)
    }

    // ---- internal ----

    /// Record a freshly inserted component on its entity and keep the mask
    /// index in step. The component is already in its store.
    fn attach_to_entity(&mut self, entity_id: EntityId, id: ComponentId) -> Result<()> {
        let entity = self
            .entities
            .get_mut(entity_id)
            .map_err(|_| EcsError::InvalidEntity)?;
        let old_mask = entity.mask();
        if entity.attach(id) {
            let new_mask = entity.mask();
            self.mask_index.update(old_mask, new_mask, entity_id);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn mask_index(&self) -> &MaskIndex {
        &self.mask_index
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
