//! # Registry
//!
//! The entity-component store: entity allocator, type-erased component
//! pools, views, owned groups and lifecycle events.
//!
//! The registry is single-threaded; every mutation emits its lifecycle
//! event synchronously on the store's bus. Handlers receive the event by
//! reference and must not re-enter the registry that emitted it.

use std::rc::Rc;

use ember_shared::EventBus;

use crate::ecs::entity::{Entity, EntityAllocator};
use crate::ecs::error::EcsResult;
use crate::ecs::group::{Group, GroupDef};
use crate::ecs::pool::{ComponentInfo, ErasedPool, Pool};
use crate::ecs::type_registry::{TypeKey, TypeSequence};
use crate::ecs::view::{Component, ComponentTuple, TypeList, View};
use crate::events::{ComponentAdded, EntityCreated, EntityDestroyed};

/// The entity-component store.
///
/// Owns all component pools exclusively. Component types get a dense,
/// stable integer on first use via the store's type sequence; pools are
/// stored type-erased and projected back through the generic operations.
pub struct Registry {
    bus: Rc<EventBus>,
    allocator: EntityAllocator,
    types: TypeSequence,
    pools: Vec<Option<Box<dyn ErasedPool>>>,
    groups: Vec<GroupDef>,
}

impl Registry {
    /// Creates a store with its own private event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bus(Rc::new(EventBus::new()))
    }

    /// Creates a store emitting lifecycle events on `bus`.
    #[must_use]
    pub fn with_bus(bus: Rc<EventBus>) -> Self {
        Self {
            bus,
            allocator: EntityAllocator::default(),
            types: TypeSequence::default(),
            pools: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// The bus lifecycle events are emitted on.
    #[must_use]
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Allocates a fresh entity and emits [`EntityCreated`].
    pub fn create(&mut self) -> Entity {
        let entity = self.allocator.create();
        self.bus.emit(&EntityCreated { entity });
        entity
    }

    /// Allocates the exact entity named by `hint`, adopting its index and
    /// generation.
    ///
    /// # Errors
    ///
    /// [`crate::EcsError::EntityAlreadyExists`] if the hinted index slot
    /// is live.
    pub fn create_at(&mut self, hint: Entity) -> EcsResult<Entity> {
        let entity = self.allocator.create_at(hint)?;
        self.bus.emit(&EntityCreated { entity });
        Ok(entity)
    }

    /// Bulk-allocates `count` entities, one [`EntityCreated`] each, in
    /// order.
    pub fn create_many(&mut self, count: usize) -> Vec<Entity> {
        (0..count).map(|_| self.create()).collect()
    }

    /// True if `entity` is alive in this store with a matching
    /// generation.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.allocator.contains(entity)
    }

    /// Total entity slots ever allocated (alive or recyclable).
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    /// True if no slot was ever allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocator.len() == 0
    }

    /// Number of currently alive entities.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.allocator.alive()
    }

    /// Pre-allocates entity slot capacity.
    pub fn reserve(&mut self, additional: usize) {
        self.allocator.reserve(additional);
    }

    /// Destroys an entity.
    ///
    /// Emits [`EntityDestroyed`] first (the entity is still intact), then
    /// [`crate::ComponentRemoved`] per component before each erase, then
    /// frees the slot and bumps its generation.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    pub fn destroy(&mut self, entity: Entity) {
        assert!(
            self.contains(entity),
            "destroy called with a stale or null entity: {entity:?}"
        );
        self.bus.emit(&EntityDestroyed { entity });
        self.remove_all_components(entity);
        self.allocator.destroy(entity);
    }

    /// Destroys every entity in `entities`, with the per-entity event
    /// contract of [`Registry::destroy`].
    pub fn destroy_many(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.destroy(entity);
        }
    }

    /// Destroys all alive entities.
    pub fn clear(&mut self) {
        let all: Vec<Entity> = self.allocator.iter_alive().collect();
        self.destroy_many(all);
    }

    /// Calls `f` for every alive entity.
    pub fn each(&self, mut f: impl FnMut(Entity)) {
        for entity in self.allocator.iter_alive() {
            f(entity);
        }
    }

    /// Calls `f` for every alive entity that has zero components.
    pub fn each_orphans(&self, mut f: impl FnMut(Entity)) {
        for entity in self.allocator.iter_alive() {
            let orphan = !self
                .pools
                .iter()
                .flatten()
                .any(|pool| pool.contains_index(entity.index()));
            if orphan {
                f(entity);
            }
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches a component to `entity`, returning a mutable reference to
    /// it. Emits [`ComponentAdded`] after the storage mutation.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null, or already has a `T`.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> &mut T {
        assert!(
            self.contains(entity),
            "add called with a stale or null entity: {entity:?}"
        );
        let type_index = self.ensure_pool::<T>();
        let inserted = self.typed_pool_mut::<T>(type_index).insert(entity, component);
        assert!(
            inserted,
            "component {} already present on {entity:?}",
            core::any::type_name::<T>()
        );
        self.refresh_groups_on_add(entity, type_index);
        self.bus.emit(&ComponentAdded::<T>::new(entity));
        self.typed_pool_mut::<T>(type_index)
            .get_mut(entity.index())
            .expect("component just inserted")
    }

    /// Returns a shared reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null, or has no `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        assert!(
            self.contains(entity),
            "get called with a stale or null entity: {entity:?}"
        );
        self.peek::<T>(entity).unwrap_or_else(|| {
            panic!(
                "missing component {} on {entity:?}",
                core::any::type_name::<T>()
            )
        })
    }

    /// Returns a mutable reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null, or has no `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        assert!(
            self.contains(entity),
            "get_mut called with a stale or null entity: {entity:?}"
        );
        let Some(type_index) = self.types.get(TypeKey::of::<T>()) else {
            panic!(
                "missing component {} on {entity:?}",
                core::any::type_name::<T>()
            )
        };
        self.typed_pool_mut::<T>(type_index)
            .get_mut(entity.index())
            .unwrap_or_else(|| {
                panic!(
                    "missing component {} on {entity:?}",
                    core::any::type_name::<T>()
                )
            })
    }

    /// Returns a tuple of shared references to every listed component.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null, or any listed component is
    /// missing.
    #[must_use]
    pub fn get_components<S: ComponentTuple>(&self, entity: Entity) -> S::Refs<'_> {
        assert!(
            self.contains(entity),
            "get_components called with a stale or null entity: {entity:?}"
        );
        S::fetch(self, entity)
            .unwrap_or_else(|| panic!("missing components on {entity:?}"))
    }

    /// Returns `entity`'s `T` if present.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    #[must_use]
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        assert!(
            self.contains(entity),
            "try_get called with a stale or null entity: {entity:?}"
        );
        self.peek::<T>(entity)
    }

    /// Returns `entity`'s `T` mutably if present.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        assert!(
            self.contains(entity),
            "try_get_mut called with a stale or null entity: {entity:?}"
        );
        let type_index = self.types.get(TypeKey::of::<T>())?;
        self.typed_pool_mut::<T>(type_index).get_mut(entity.index())
    }

    /// True if `entity` has every listed component.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    #[must_use]
    pub fn has<S: ComponentTuple>(&self, entity: Entity) -> bool {
        assert!(
            self.contains(entity),
            "has called with a stale or null entity: {entity:?}"
        );
        S::all_in(self, entity)
    }

    /// True if `entity` has at least one of the listed components.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    #[must_use]
    pub fn any<S: ComponentTuple>(&self, entity: Entity) -> bool {
        assert!(
            self.contains(entity),
            "any called with a stale or null entity: {entity:?}"
        );
        S::any_in(self, entity)
    }

    /// Detaches `entity`'s `T` if present, emitting
    /// [`crate::ComponentRemoved`] before the erase. Returns whether a
    /// component was removed.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> bool {
        assert!(
            self.contains(entity),
            "remove called with a stale or null entity: {entity:?}"
        );
        match self.types.get(TypeKey::of::<T>()) {
            Some(type_index) => self.remove_by_type_index(entity, type_index),
            None => false,
        }
    }

    /// Detaches every listed component from `entity`, fanning out
    /// per type with the event contract of [`Registry::remove`].
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    pub fn remove_components<S: ComponentTuple>(&mut self, entity: Entity) {
        assert!(
            self.contains(entity),
            "remove_components called with a stale or null entity: {entity:?}"
        );
        for key in S::keys() {
            if let Some(type_index) = self.types.get(key) {
                self.remove_by_type_index(entity, type_index);
            }
        }
    }

    /// Removes every listed component type from every entity carrying
    /// it, fanning out explicitly per type and per entity.
    pub fn clear_type<S: ComponentTuple>(&mut self) {
        for key in S::keys() {
            let Some(type_index) = self.types.get(key) else {
                continue;
            };
            let holders: Vec<Entity> = match &self.pools[type_index] {
                Some(pool) => pool.dense().to_vec(),
                None => continue,
            };
            for entity in holders {
                self.remove_by_type_index(entity, type_index);
            }
        }
    }

    /// Number of components of type `T` currently stored.
    #[must_use]
    pub fn len_of<T: Component>(&self) -> usize {
        self.types
            .get(TypeKey::of::<T>())
            .and_then(|type_index| self.pools.get(type_index)?.as_deref())
            .map_or(0, ErasedPool::len)
    }

    /// Pre-allocates pool capacity for every listed component type.
    pub fn reserve_components<S: ComponentTuple>(&mut self, additional: usize) {
        for type_index in S::ensure(self) {
            if let Some(pool) = self.pools[type_index].as_mut() {
                pool.reserve(additional);
            }
        }
    }

    /// Calls `f` with the [`ComponentInfo`] of every component type on
    /// `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is stale or null.
    pub fn visit(&self, entity: Entity, mut f: impl FnMut(ComponentInfo)) {
        assert!(
            self.contains(entity),
            "visit called with a stale or null entity: {entity:?}"
        );
        for pool in self.pools.iter().flatten() {
            if pool.contains_index(entity.index()) {
                f(pool.info());
            }
        }
    }

    /// Calls `f` with the [`ComponentInfo`] of every registered component
    /// type.
    pub fn visit_types(&self, mut f: impl FnMut(ComponentInfo)) {
        for pool in self.pools.iter().flatten() {
            f(pool.info());
        }
    }

    // =========================================================================
    // Views and groups
    // =========================================================================

    /// Returns a view over entities with every `I` component.
    #[must_use]
    pub fn view<I: ComponentTuple>(&self) -> View<'_, I> {
        View::new(self)
    }

    /// Returns a view over entities with every `I` component and none of
    /// the `X` components.
    #[must_use]
    pub fn view_filtered<I: ComponentTuple, X: TypeList>(&self) -> View<'_, I, X> {
        View::new(self)
    }

    /// Iterates `(entity, &mut T)` over a single pool.
    pub fn view_mut<T: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        let pool: Option<&mut Pool<T>> = match self.types.get(TypeKey::of::<T>()) {
            Some(type_index) => self.pools[type_index]
                .as_mut()
                .and_then(|pool| pool.as_any_mut().downcast_mut::<Pool<T>>()),
            None => None,
        };
        pool.into_iter().flat_map(|pool| pool.iter_mut())
    }

    /// Returns (creating on first use) the owned group over `O`, with
    /// required-but-not-owned types `G` and excluded types `X`.
    ///
    /// Creation re-sorts the owned pools so matching entities occupy a
    /// contiguous prefix; afterwards ordinary adds and removes maintain
    /// the prefix with O(1) boundary swaps.
    ///
    /// # Panics
    ///
    /// Panics on single-component groups (`owned + get < 2` types) and
    /// when an owned pool already belongs to a different group.
    pub fn group<O: ComponentTuple, G: TypeList, X: TypeList>(&mut self) -> Group<'_> {
        let owned = O::ensure(self);
        let get = G::ensure(self);
        let exclude = X::ensure(self);

        assert!(
            owned.len() + get.len() >= 2,
            "a group needs at least two component types; use a view for single-type iteration"
        );

        if let Some(index) = self
            .groups
            .iter()
            .position(|def| def.owned == owned && def.get == get && def.exclude == exclude)
        {
            return Group::new(self, index);
        }

        for def in &self.groups {
            for type_index in &owned {
                assert!(
                    !def.owned.contains(type_index),
                    "component pool is already owned by another group"
                );
            }
        }

        let index = self.groups.len();
        self.groups.push(GroupDef {
            owned,
            get,
            exclude,
            len: 0,
        });
        self.rebuild_group(index);
        Group::new(self, index)
    }

    // =========================================================================
    // Crate-internal plumbing
    // =========================================================================

    /// Registers (if needed) the pool for `T` and returns its dense type
    /// index.
    pub(crate) fn ensure_pool<T: Component>(&mut self) -> usize {
        let type_index = self.types.index_for(TypeKey::of::<T>());
        if type_index >= self.pools.len() {
            self.pools.resize_with(type_index + 1, || None);
        }
        if self.pools[type_index].is_none() {
            self.pools[type_index] = Some(Box::new(Pool::<T>::new(type_index)));
        }
        type_index
    }

    /// Fetches `entity`'s `T` without liveness assertions. Used by view
    /// iteration, where entities come from live dense arrays.
    pub(crate) fn peek<T: Component>(&self, entity: Entity) -> Option<&T> {
        let type_index = self.types.get(TypeKey::of::<T>())?;
        self.pools
            .get(type_index)?
            .as_ref()?
            .as_any()
            .downcast_ref::<Pool<T>>()?
            .get(entity.index())
    }

    pub(crate) fn contains_component_by_key(&self, key: TypeKey, entity: Entity) -> bool {
        self.erased_pool_by_key(key)
            .is_some_and(|pool| pool.contains_index(entity.index()))
    }

    /// Dense array of the smallest pool among `keys`, or `None` if any
    /// pool is missing (the intersection is necessarily empty).
    pub(crate) fn shortest_dense(&self, keys: &[TypeKey]) -> Option<&[Entity]> {
        let mut lead: Option<&dyn ErasedPool> = None;
        for key in keys {
            let pool = self.erased_pool_by_key(*key)?;
            match lead {
                Some(current) if pool.len() >= current.len() => {}
                _ => lead = Some(pool),
            }
        }
        lead.map(ErasedPool::dense)
    }

    pub(crate) fn group_len(&self, group_index: usize) -> usize {
        self.groups[group_index].len
    }

    /// The prefix of the group's first owned pool: exactly the matching
    /// entities, in partition order.
    pub(crate) fn group_prefix(&self, group_index: usize) -> &[Entity] {
        let def = &self.groups[group_index];
        let first = def.owned[0];
        let pool = self.pools[first].as_deref().expect("owned pool exists");
        &pool.dense()[..def.len]
    }

    fn erased_pool_by_key(&self, key: TypeKey) -> Option<&dyn ErasedPool> {
        let type_index = self.types.get(key)?;
        self.pools.get(type_index)?.as_deref()
    }

    fn typed_pool_mut<T: Component>(&mut self, type_index: usize) -> &mut Pool<T> {
        self.pools[type_index]
            .as_mut()
            .expect("pool registered")
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .expect("pool type matches its index")
    }

    /// Emits the typed removal event, fixes group prefixes, then erases.
    fn remove_by_type_index(&mut self, entity: Entity, type_index: usize) -> bool {
        let present = self.pools[type_index]
            .as_ref()
            .is_some_and(|pool| pool.contains_index(entity.index()));
        if !present {
            return false;
        }

        self.pools[type_index]
            .as_ref()
            .expect("pool present")
            .emit_removed(entity, &self.bus);
        self.refresh_groups_before_remove(entity, type_index);
        self.pools[type_index]
            .as_mut()
            .expect("pool present")
            .remove_silent(entity);
        self.refresh_groups_after_remove(entity, type_index);
        true
    }

    fn remove_all_components(&mut self, entity: Entity) {
        for type_index in 0..self.pools.len() {
            self.remove_by_type_index(entity, type_index);
        }
    }

    // =========================================================================
    // Group maintenance
    // =========================================================================

    fn group_matches(&self, group_index: usize, entity: Entity) -> bool {
        let def = &self.groups[group_index];
        let has_all = def
            .owned
            .iter()
            .chain(&def.get)
            .all(|&type_index| self.pool_contains(type_index, entity));
        let has_excluded = def
            .exclude
            .iter()
            .any(|&type_index| self.pool_contains(type_index, entity));
        has_all && !has_excluded
    }

    fn pool_contains(&self, type_index: usize, entity: Entity) -> bool {
        self.pools
            .get(type_index)
            .and_then(Option::as_deref)
            .is_some_and(|pool| pool.contains_index(entity.index()))
    }

    fn group_prefix_contains(&self, group_index: usize, entity: Entity) -> bool {
        let def = &self.groups[group_index];
        let first = def.owned[0];
        self.pools[first]
            .as_deref()
            .and_then(|pool| pool.dense_index(entity))
            .is_some_and(|position| position < def.len)
    }

    fn group_swap_in(&mut self, group_index: usize, entity: Entity) {
        let boundary = self.groups[group_index].len;
        let owned = self.groups[group_index].owned.clone();
        for type_index in owned {
            let pool = self.pools[type_index].as_mut().expect("owned pool exists");
            let position = pool.dense_index(entity).expect("matching entity is in every owned pool");
            pool.swap_dense(position, boundary);
        }
        self.groups[group_index].len = boundary + 1;
    }

    fn group_swap_out(&mut self, group_index: usize, entity: Entity) {
        let boundary = self.groups[group_index].len - 1;
        let owned = self.groups[group_index].owned.clone();
        for type_index in owned {
            let pool = self.pools[type_index].as_mut().expect("owned pool exists");
            let position = pool.dense_index(entity).expect("prefix entity is in every owned pool");
            pool.swap_dense(position, boundary);
        }
        self.groups[group_index].len = boundary;
    }

    fn refresh_groups_on_add(&mut self, entity: Entity, type_index: usize) {
        for group_index in 0..self.groups.len() {
            let (relevant, excluded) = {
                let def = &self.groups[group_index];
                (
                    def.owned.contains(&type_index)
                        || def.get.contains(&type_index)
                        || def.exclude.contains(&type_index),
                    def.exclude.contains(&type_index),
                )
            };
            if !relevant {
                continue;
            }
            if excluded {
                if self.group_prefix_contains(group_index, entity) {
                    self.group_swap_out(group_index, entity);
                }
            } else if !self.group_prefix_contains(group_index, entity)
                && self.group_matches(group_index, entity)
            {
                self.group_swap_in(group_index, entity);
            }
        }
    }

    /// Runs before a component is erased: an entity losing a required
    /// component leaves the prefix.
    fn refresh_groups_before_remove(&mut self, entity: Entity, type_index: usize) {
        for group_index in 0..self.groups.len() {
            let required = {
                let def = &self.groups[group_index];
                def.owned.contains(&type_index) || def.get.contains(&type_index)
            };
            if required && self.group_prefix_contains(group_index, entity) {
                self.group_swap_out(group_index, entity);
            }
        }
    }

    /// Runs after a component is erased: an entity losing an *excluded*
    /// component may now match.
    fn refresh_groups_after_remove(&mut self, entity: Entity, type_index: usize) {
        for group_index in 0..self.groups.len() {
            let was_excluded = self.groups[group_index].exclude.contains(&type_index);
            if was_excluded
                && !self.group_prefix_contains(group_index, entity)
                && self.group_matches(group_index, entity)
            {
                self.group_swap_in(group_index, entity);
            }
        }
    }

    /// Partitions the owned pools of a freshly created group.
    fn rebuild_group(&mut self, group_index: usize) {
        let def = self.groups[group_index].clone();
        let lead = def
            .owned
            .iter()
            .copied()
            .min_by_key(|&type_index| {
                self.pools[type_index].as_deref().map_or(0, ErasedPool::len)
            })
            .expect("group has at least one owned pool");

        let candidates: Vec<Entity> = self.pools[lead]
            .as_deref()
            .map_or_else(Vec::new, |pool| pool.dense().to_vec());

        let mut boundary = 0usize;
        for entity in candidates {
            if !self.group_matches(group_index, entity) {
                continue;
            }
            for &type_index in &def.owned {
                let pool = self.pools[type_index].as_mut().expect("owned pool exists");
                let position = pool
                    .dense_index(entity)
                    .expect("matching entity is in every owned pool");
                pool.swap_dense(position, boundary);
            }
            boundary += 1;
        }
        self.groups[group_index].len = boundary;
        tracing::debug!(
            group = group_index,
            prefix = boundary,
            "group partition established"
        );
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pos {
        x: i32,
        y: i32,
    }

    #[derive(Debug, PartialEq)]
    struct Vel {
        x: i32,
        y: i32,
    }

    #[derive(Debug, PartialEq)]
    struct Frozen;

    #[test]
    fn test_create_and_get() {
        let mut registry = Registry::new();
        let entity = registry.create();

        registry.add(entity, Pos { x: 1, y: 2 });
        registry.add(entity, Vel { x: 3, y: 4 });

        assert_eq!(registry.get::<Pos>(entity), &Pos { x: 1, y: 2 });
        let (pos, vel) = registry.get_components::<(Pos, Vel)>(entity);
        assert_eq!(pos, &Pos { x: 1, y: 2 });
        assert_eq!(vel, &Vel { x: 3, y: 4 });
    }

    #[test]
    fn test_view_intersection() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Pos { x: 1, y: 2 });
        registry.add(entity, Vel { x: 3, y: 4 });

        let loner = registry.create();
        registry.add(loner, Pos { x: 9, y: 9 });

        let collected: Vec<_> = registry.view::<(Pos, Vel)>().iter().collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].0, entity);

        registry.remove::<Vel>(entity);
        assert_eq!(registry.view::<(Pos, Vel)>().iter().count(), 0);
        assert_eq!(registry.view::<(Pos,)>().iter().count(), 2);
    }

    #[test]
    fn test_view_exclusion() {
        let mut registry = Registry::new();
        let moving = registry.create();
        registry.add(moving, Pos { x: 0, y: 0 });
        registry.add(moving, Vel { x: 1, y: 1 });

        let frozen = registry.create();
        registry.add(frozen, Pos { x: 0, y: 0 });
        registry.add(frozen, Vel { x: 0, y: 0 });
        registry.add(frozen, Frozen);

        let unfrozen: Vec<_> = registry
            .view_filtered::<(Pos, Vel), (Frozen,)>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        assert_eq!(unfrozen, vec![moving]);
    }

    #[test]
    fn test_generation_recycling() {
        let mut registry = Registry::new();
        let first = registry.create();
        registry.destroy(first);
        let second = registry.create();

        assert_ne!(first, second);
        assert!(!registry.contains(first));
        assert!(registry.contains(second));
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn test_double_add_panics() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Pos { x: 0, y: 0 });
        registry.add(entity, Pos { x: 1, y: 1 });
    }

    #[test]
    #[should_panic(expected = "stale or null entity")]
    fn test_stale_entity_panics() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.destroy(entity);
        registry.get::<Pos>(entity);
    }

    #[test]
    fn test_has_and_any() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Pos { x: 0, y: 0 });

        assert!(registry.has::<(Pos,)>(entity));
        assert!(!registry.has::<(Pos, Vel)>(entity));
        assert!(registry.any::<(Pos, Vel)>(entity));
        assert!(!registry.any::<(Vel, Frozen)>(entity));
    }

    #[test]
    fn test_visit_and_orphans() {
        let mut registry = Registry::new();
        let carried = registry.create();
        registry.add(carried, Pos { x: 0, y: 0 });
        let orphan = registry.create();

        let mut names = Vec::new();
        registry.visit(carried, |info| names.push(info.name));
        assert_eq!(names.len(), 1);

        let mut orphans = Vec::new();
        registry.each_orphans(|entity| orphans.push(entity));
        assert_eq!(orphans, vec![orphan]);
    }

    #[test]
    fn test_view_mut() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Pos { x: 1, y: 1 });

        for (_, pos) in registry.view_mut::<Pos>() {
            pos.x += 10;
        }
        assert_eq!(registry.get::<Pos>(entity).x, 11);
    }

    #[test]
    fn test_clear_type_fans_out() {
        let mut registry = Registry::new();
        for _ in 0..3 {
            let entity = registry.create();
            registry.add(entity, Pos { x: 0, y: 0 });
            registry.add(entity, Vel { x: 0, y: 0 });
        }

        registry.clear_type::<(Pos, Vel)>();
        assert_eq!(registry.len_of::<Pos>(), 0);
        assert_eq!(registry.len_of::<Vel>(), 0);
        assert_eq!(registry.alive(), 3);
    }
}
