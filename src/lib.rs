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

//! handle_ecs - generational handle-based entity/component storage
//!
//! Items live in dense arrays for cache-friendly per-frame iteration;
//! callers hold stable 64-bit handles validated by generation and type tag
//! on every use. Built on a sparse indirection layer with an embedded FIFO
//! free list, so slots recycle without ever silently aliasing old
//! references.

pub mod entity;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod handle_map;
pub mod manager;
pub mod mask;
pub mod prelude;
pub mod store;


pub use entity::*;
pub use error::*;
pub use handle::*;
pub use handle_map::*;
pub use manager::*;
pub use mask::*;
pub use store::*;
