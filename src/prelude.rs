//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use handle_ecs::prelude::*;
//! ```

pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::handle::{ComponentId, EntityId, Handle};
pub use crate::handle_map::HandleMap;
pub use crate::manager::EntityManager;
pub use crate::mask::ComponentMask;
pub use crate::store::{Component, ComponentRecord};
