//! Lifecycle events emitted by the store.
//!
//! Ordering contract, relied on by subscribers and covered by tests:
//! - [`EntityCreated`] and [`ComponentAdded`] fire *after* the storage
//!   mutation, so handlers observe the entity/component as present.
//! - [`EntityDestroyed`] and [`ComponentRemoved`] fire *before* the
//!   storage mutation, so handlers observe the pre-removal state.

use std::fmt;
use std::marker::PhantomData;

use crate::ecs::entity::Entity;

/// A fresh entity was allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityCreated {
    /// The new entity.
    pub entity: Entity,
}

/// An entity is about to be destroyed.
///
/// Emitted while the entity and all its components are still intact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityDestroyed {
    /// The doomed entity.
    pub entity: Entity,
}

/// A component of type `T` was attached to an entity.
pub struct ComponentAdded<T> {
    /// The entity that gained the component.
    pub entity: Entity,
    marker: PhantomData<fn() -> T>,
}

impl<T> ComponentAdded<T> {
    pub(crate) fn new(entity: Entity) -> Self {
        Self {
            entity,
            marker: PhantomData,
        }
    }
}

impl<T> Clone for ComponentAdded<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentAdded<T> {}

impl<T> fmt::Debug for ComponentAdded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentAdded")
            .field("entity", &self.entity)
            .field("component", &core::any::type_name::<T>())
            .finish()
    }
}

/// A component of type `T` is about to be detached from an entity.
///
/// Emitted while the component is still present in its pool.
pub struct ComponentRemoved<T> {
    /// The entity that is losing the component.
    pub entity: Entity,
    marker: PhantomData<fn() -> T>,
}

impl<T> ComponentRemoved<T> {
    pub(crate) fn new(entity: Entity) -> Self {
        Self {
            entity,
            marker: PhantomData,
        }
    }
}

impl<T> Clone for ComponentRemoved<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentRemoved<T> {}

impl<T> fmt::Debug for ComponentRemoved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRemoved")
            .field("entity", &self.entity)
            .field("component", &core::any::type_name::<T>())
            .finish()
    }
}
