//! # Views
//!
//! Lazy, non-owning cursors over entities possessing a set of included
//! component types and none of an excluded set.
//!
//! Iteration walks the shortest included pool and probes the rest, so
//! cost is proportional to the smallest pool. Views borrow the registry
//! for their lifetime; structural mutation while a view is alive is a
//! compile error rather than a runtime invalidation.

use std::marker::PhantomData;

use crate::ecs::entity::Entity;
use crate::ecs::registry::Registry;
use crate::ecs::type_registry::TypeKey;

/// Marker for component types storable in the registry.
///
/// Components are plain `'static` value types; references and borrowed
/// data are rejected by the type system itself.
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// A (possibly empty) compile-time list of component types.
///
/// Implemented for `()` and for tuples of components up to arity four.
/// Used where emptiness is legal: exclusion filters and group `get`
/// lists.
pub trait TypeList: 'static {
    /// Stable keys of the listed types, in tuple order.
    fn keys() -> Vec<TypeKey>;

    /// Registers pools for the listed types, returning their dense type
    /// indices.
    fn ensure(registry: &mut Registry) -> Vec<usize>;

    /// True if `entity` has every listed component.
    fn all_in(registry: &Registry, entity: Entity) -> bool;

    /// True if `entity` has at least one listed component.
    fn any_in(registry: &Registry, entity: Entity) -> bool;
}

/// A non-empty list of component types that can be fetched as a tuple of
/// shared references.
///
/// The empty tuple deliberately does not implement this trait, so empty
/// include packs are rejected at compile time.
pub trait ComponentTuple: TypeList {
    /// Tuple of shared references produced per entity.
    type Refs<'a>;

    /// Fetches every listed component for `entity`, or `None` if any is
    /// missing.
    fn fetch(registry: &Registry, entity: Entity) -> Option<Self::Refs<'_>>;
}

impl TypeList for () {
    fn keys() -> Vec<TypeKey> {
        Vec::new()
    }

    fn ensure(_registry: &mut Registry) -> Vec<usize> {
        Vec::new()
    }

    fn all_in(_registry: &Registry, _entity: Entity) -> bool {
        true
    }

    fn any_in(_registry: &Registry, _entity: Entity) -> bool {
        false
    }
}

macro_rules! impl_component_tuple {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> TypeList for ($($ty,)+) {
            fn keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$ty>()),+]
            }

            fn ensure(registry: &mut Registry) -> Vec<usize> {
                vec![$(registry.ensure_pool::<$ty>()),+]
            }

            fn all_in(registry: &Registry, entity: Entity) -> bool {
                $(registry.contains_component_by_key(TypeKey::of::<$ty>(), entity))&&+
            }

            fn any_in(registry: &Registry, entity: Entity) -> bool {
                $(registry.contains_component_by_key(TypeKey::of::<$ty>(), entity))||+
            }
        }

        impl<$($ty: Component),+> ComponentTuple for ($($ty,)+) {
            type Refs<'a> = ($(&'a $ty,)+);

            fn fetch(registry: &Registry, entity: Entity) -> Option<Self::Refs<'_>> {
                Some(($(registry.peek::<$ty>(entity)?,)+))
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);

/// Lazy cursor over entities with every `I` component and no `X`
/// component.
///
/// Created by [`Registry::view`] / [`Registry::view_filtered`].
pub struct View<'a, I: ComponentTuple, X: TypeList = ()> {
    registry: &'a Registry,
    _marker: PhantomData<fn() -> (I, X)>,
}

impl<'a, I: ComponentTuple, X: TypeList> View<'a, I, X> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            _marker: PhantomData,
        }
    }

    /// Iterates matching entities with their component references.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, I::Refs<'a>)> + 'a {
        let registry = self.registry;
        registry
            .shortest_dense(&I::keys())
            .into_iter()
            .flat_map(|dense| dense.iter().copied())
            .filter(move |&entity| !X::any_in(registry, entity))
            .filter_map(move |entity| I::fetch(registry, entity).map(|refs| (entity, refs)))
    }

    /// True if `entity` matches the view's include/exclude predicate.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        I::all_in(self.registry, entity) && !X::any_in(self.registry, entity)
    }

    /// Calls `f` for every matching entity.
    pub fn each(&self, mut f: impl FnMut(Entity, I::Refs<'a>)) {
        for (entity, refs) in self.iter() {
            f(entity, refs);
        }
    }
}
