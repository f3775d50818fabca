//! # Owned Groups
//!
//! A group partitions its owned pools so that matching entities occupy a
//! contiguous prefix of each owned pool's dense array.
//!
//! Invariant: at any observable point the prefix lengths of all owned
//! pools are equal, and every entity in the prefix has all owned and
//! `get` components and none of the excluded ones. Creation re-sorts the
//! owned pools once; afterwards ordinary inserts and removes maintain
//! the prefix with O(1) boundary swaps.

use crate::ecs::entity::Entity;
use crate::ecs::registry::Registry;

/// Definition of an owned group, stored by the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GroupDef {
    /// Dense type indices of owned pools, in creation order.
    pub(crate) owned: Vec<usize>,
    /// Required-but-not-owned type indices.
    pub(crate) get: Vec<usize>,
    /// Excluded type indices.
    pub(crate) exclude: Vec<usize>,
    /// Current prefix length, equal across all owned pools.
    pub(crate) len: usize,
}

/// Handle to a materialized owned group.
///
/// Created by [`Registry::group`]. Iteration walks the prefix of the
/// first owned pool, so cost is proportional to the number of matching
/// entities.
pub struct Group<'a> {
    registry: &'a Registry,
    index: usize,
}

impl<'a> Group<'a> {
    pub(crate) fn new(registry: &'a Registry, index: usize) -> Self {
        Self { registry, index }
    }

    /// Number of entities currently matching the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.group_len(self.index)
    }

    /// True if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the matching entities in partition order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + 'a {
        self.registry.group_prefix(self.index).iter().copied()
    }

    /// True if `entity` is inside the group's prefix.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.registry.group_prefix(self.index).contains(&entity)
    }

    /// Calls `f` for every matching entity.
    pub fn each(&self, mut f: impl FnMut(Entity)) {
        for entity in self.iter() {
            f(entity);
        }
    }
}
