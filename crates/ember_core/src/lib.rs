//! # Ember Core
//!
//! The entity-component store at the heart of the Ember engine.
//!
//! ## Architecture Rules
//!
//! 1. **Sparse-set pools** - each component type lives in its own
//!    dense-packed pool keyed by entity index
//! 2. **Generational entities** - recycled indices bump a generation
//!    counter so stale handles are detectable
//! 3. **Synchronous lifecycle events** - every create/destroy/add/remove
//!    emits on the engine bus inside the mutating call
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::Registry;
//!
//! let mut registry = Registry::new();
//! let entity = registry.create();
//! registry.add(entity, Position { x: 1.0, y: 2.0 });
//! for (entity, (pos,)) in registry.view::<(Position,)>().iter() {
//!     // ...
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ecs;
pub mod events;

pub use ecs::entity::Entity;
pub use ecs::error::{EcsError, EcsResult};
pub use ecs::group::Group;
pub use ecs::pool::ComponentInfo;
pub use ecs::registry::Registry;
pub use ecs::type_registry::TypeKey;
pub use ecs::view::{Component, ComponentTuple, TypeList, View};
pub use events::{ComponentAdded, ComponentRemoved, EntityCreated, EntityDestroyed};
