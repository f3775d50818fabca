//! # System Registry
//!
//! Type-keyed lookup for engine systems: "give me the current ECS store"
//! without a global singleton. Systems are shared `Rc<RefCell<_>>`
//! handles so bus subscribers can hold them too.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Type-keyed map of engine systems.
#[derive(Default)]
pub struct SystemRegistry {
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the system of type `S`.
    pub fn register<S: 'static>(&mut self, system: Rc<RefCell<S>>) {
        self.entries.insert(TypeId::of::<S>(), system);
    }

    /// Looks up the system of type `S`.
    #[must_use]
    pub fn get<S: 'static>(&self) -> Option<Rc<RefCell<S>>> {
        let entry = Rc::clone(self.entries.get(&TypeId::of::<S>())?);
        entry.downcast::<RefCell<S>>().ok()
    }

    /// Removes the system of type `S`, returning whether it existed.
    pub fn remove<S: 'static>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<S>()).is_some()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
