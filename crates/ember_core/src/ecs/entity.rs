//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into component pools (lower 20 bits)
//! - A generation counter for safe reuse (upper 12 bits)

use crate::ecs::error::EcsError;

/// Unique identifier for an entity.
///
/// The ID packs into 32 bits:
/// - Lower 20 bits: Index into component pools
/// - Upper 12 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Number of bits used for the index portion.
    pub const INDEX_BITS: u32 = 20;
    /// Mask extracting the index portion.
    pub const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;
    /// Mask extracting the generation portion (after shifting).
    pub const GENERATION_MASK: u32 = (1 << (32 - Self::INDEX_BITS)) - 1;

    /// Null/invalid entity.
    pub const NULL: Self = Self(u32::MAX);

    /// Composes an entity from index and generation.
    #[inline]
    #[must_use]
    pub const fn compose(index: u32, generation: u32) -> Self {
        Self(((generation & Self::GENERATION_MASK) << Self::INDEX_BITS) | (index & Self::INDEX_MASK))
    }

    /// Returns the index portion.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    /// Returns the generation portion.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> Self::INDEX_BITS) & Self::GENERATION_MASK
    }

    /// Checks if this is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    /// Returns the raw packed value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Reconstructs an entity from a raw packed value.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

/// One allocator slot. The generation survives the slot being freed so
/// the next occupant hands out a fresh entity value.
#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    generation: u16,
    alive: bool,
}

/// Entity allocator with free-list reuse.
///
/// Slots are never shrunk; destroying an entity bumps its slot's
/// generation and returns the index to the free list.
#[derive(Default)]
pub(crate) struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityAllocator {
    /// Allocates a fresh entity, reusing a free slot when available.
    ///
    /// # Panics
    ///
    /// Panics if every representable index is in use.
    pub(crate) fn create(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            self.alive += 1;
            return Entity::compose(index, u32::from(slot.generation));
        }

        let index = self.slots.len() as u32;
        assert!(index < Entity::INDEX_MASK, "entity index space exhausted");
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.alive += 1;
        Entity::compose(index, 0)
    }

    /// Allocates the exact slot named by `hint`, adopting its generation.
    ///
    /// Grows the slot table if the hinted index is beyond it; the
    /// intermediate slots become free.
    pub(crate) fn create_at(&mut self, hint: Entity) -> Result<Entity, EcsError> {
        let index = hint.index();
        assert!(index < Entity::INDEX_MASK, "entity index out of range");

        while (self.slots.len() as u32) <= index {
            let filler = self.slots.len() as u32;
            self.slots.push(Slot::default());
            self.free.push(filler);
        }

        if self.slots[index as usize].alive {
            return Err(EcsError::EntityAlreadyExists { index });
        }

        let position = self
            .free
            .iter()
            .position(|&candidate| candidate == index)
            .expect("dead slot must be on the free list");
        self.free.swap_remove(position);

        let slot = &mut self.slots[index as usize];
        slot.generation = hint.generation() as u16;
        slot.alive = true;
        self.alive += 1;
        Ok(Entity::compose(index, hint.generation()))
    }

    /// Frees a slot, bumping its generation so recycled indices always
    /// hand out a distinct entity value.
    pub(crate) fn destroy(&mut self, entity: Entity) {
        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1) & Entity::GENERATION_MASK as u16;
        self.free.push(entity.index());
        self.alive -= 1;
    }

    /// Returns true if `entity` names a live slot with a matching
    /// generation.
    #[must_use]
    pub(crate) fn contains(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && u32::from(slot.generation) == entity.generation())
    }

    /// Total slots ever allocated.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Currently alive entities.
    #[must_use]
    pub(crate) fn alive(&self) -> usize {
        self.alive
    }

    /// Pre-allocates slot capacity.
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.free.reserve(additional);
    }

    /// Iterates every alive entity in index order.
    pub(crate) fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::compose(index as u32, u32::from(slot.generation)))
    }
}
