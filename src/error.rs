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

//! Error types

use std::fmt;

/// Storage error type
///
/// The first three variants are handle-validation failures and occur in
/// steady state; the registry variants occur only during store setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Handle generation does not match the slot generation (slot was reused)
    StaleHandle,

    /// Handle type tag does not match the store's tag
    TypeMismatch { expected: u16, actual: u16 },

    /// Handle resolves outside the store's arrays (corrupted or foreign handle)
    IndexOutOfRange,

    /// Entity handle is stale or was never issued
    InvalidEntity,

    /// Component handle did not resolve in its store
    ComponentNotFound,

    /// No store registered under this type tag
    StoreNotFound(u16),

    /// Component type was never registered
    TypeNotRegistered(&'static str),

    /// A store already exists under this type tag
    DuplicateStore(u16),

    /// Requested data-component size does not fit any bucket
    ComponentSizeOutOfRange(usize),

    /// Type tag falls outside the registry's fixed range
    TypeIdOutOfRange(u16),

    /// No type tags left in the typed range
    TypeRangeExhausted,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::StaleHandle => write!(f, "Stale handle: slot generation has advanced"),
            EcsError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: store tag {expected}, handle tag {actual}")
            }
            EcsError::IndexOutOfRange => write!(f, "Handle index out of range"),
            EcsError::InvalidEntity => write!(f, "Invalid entity ID"),
            EcsError::ComponentNotFound => write!(f, "Component not found"),
            EcsError::StoreNotFound(type_id) => {
                write!(f, "No component store for type tag {type_id}")
            }
            EcsError::TypeNotRegistered(name) => {
                write!(f, "Component type not registered: {name}")
            }
            EcsError::DuplicateStore(type_id) => {
                write!(f, "Component store already exists for type tag {type_id}")
            }
            EcsError::ComponentSizeOutOfRange(size) => {
                write!(f, "Data component size {size} exceeds the largest bucket")
            }
            EcsError::TypeIdOutOfRange(type_id) => {
                write!(f, "Type tag {type_id} outside registry range")
            }
            EcsError::TypeRangeExhausted => write!(f, "No free type tags remain"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
