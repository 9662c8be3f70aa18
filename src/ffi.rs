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

//! C API
//!
//! Handles cross this boundary as raw `u64` values, bit-for-bit the packed
//! [`Handle`] layout (index in the low 32 bits, then generation:16,
//! type_id:15, free:1). The all-zero value is the failure sentinel - no
//! store ever issues it. Managers cross as opaque pointers owned by the
//! caller; there is no process-wide instance in this crate, so an embedding
//! that wants one keeps it on its own side of the boundary.

use std::ffi::c_void;

use crate::handle::Handle;
use crate::manager::EntityManager;

/// Sentinel returned by store-creation calls on failure.
pub const HANDLE_ECS_INVALID_STORE: u16 = u16::MAX;

/// Allocate a manager. Free with [`handle_ecs_manager_free`].
#[no_mangle]
pub extern "C" fn handle_ecs_manager_new() -> *mut c_void {
    Box::into_raw(Box::new(EntityManager::new())) as *mut c_void
}

/// Free a manager allocated by [`handle_ecs_manager_new`].
///
/// # Safety
/// `manager` must be a pointer returned by `handle_ecs_manager_new` that
/// has not already been freed, or null (a no-op).
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_manager_free(manager: *mut c_void) {
    if !manager.is_null() {
        drop(Box::from_raw(manager as *mut EntityManager));
    }
}

/// Create an entity. Returns the packed entity handle, or 0 if `manager`
/// is null.
///
/// # Safety
/// `manager` must be null or a live pointer from `handle_ecs_manager_new`,
/// with no other thread touching it during the call.
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_entity_create(manager: *mut c_void) -> u64 {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return 0;
    };
    manager.create_entity().to_bits()
}

/// Destroy an entity and all of its components. Returns true on success.
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_entity_destroy(manager: *mut c_void, entity: u64) -> bool {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return false;
    };
    manager.destroy_entity(Handle::from_bits(entity))
}

/// True if the packed entity handle still resolves.
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_entity_is_valid(manager: *const c_void, entity: u64) -> bool {
    let Some(manager) = (manager as *const EntityManager).as_ref() else {
        return false;
    };
    manager.is_valid_entity(Handle::from_bits(entity))
}

/// Create a data-component store. Returns the absolute type tag, or
/// [`HANDLE_ECS_INVALID_STORE`] on failure (duplicate slot, bad size).
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_data_store_create(
    manager: *mut c_void,
    runtime_type_id: u16,
    component_size: usize,
    capacity: usize,
) -> u16 {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return HANDLE_ECS_INVALID_STORE;
    };
    manager
        .create_data_store(runtime_type_id, component_size, capacity)
        .unwrap_or(HANDLE_ECS_INVALID_STORE)
}

/// Attach a zero-filled data component to an entity. Returns the packed
/// component handle, or 0 on failure (stale entity, missing store).
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_data_component_add(
    manager: *mut c_void,
    type_id: u16,
    entity: u64,
) -> u64 {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return 0;
    };
    manager
        .add_data_component(type_id, Handle::from_bits(entity))
        .map(|id| id.to_bits())
        .unwrap_or(0)
}

/// Pointer to a data component's payload bytes, or null if the handle does
/// not resolve. The pointer is invalidated by any insert or erase on the
/// same store.
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_data_component_get(
    manager: *mut c_void,
    component: u64,
) -> *mut u8 {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return std::ptr::null_mut();
    };
    match manager.data_component_mut(Handle::from_bits(component)) {
        Ok(payload) => payload.as_mut_ptr(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Payload size in bytes of a data-component store (the bucket size), or 0
/// if no store exists under the tag.
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_data_component_size(
    manager: *const c_void,
    type_id: u16,
) -> usize {
    let Some(manager) = (manager as *const EntityManager).as_ref() else {
        return 0;
    };
    manager
        .data_components(type_id)
        .map(|store| store.stride())
        .unwrap_or(0)
}

/// Detach and erase one component. Returns true if the handle was live.
///
/// # Safety
/// Same contract as [`handle_ecs_entity_create`].
#[no_mangle]
pub unsafe extern "C" fn handle_ecs_component_remove(
    manager: *mut c_void,
    component: u64,
) -> bool {
    let Some(manager) = (manager as *mut EntityManager).as_mut() else {
        return false;
    };
    manager.remove_component(Handle::from_bits(component))
}
