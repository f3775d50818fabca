//! # Type Sequence
//!
//! Assigns a dense, stable integer to each distinct component type on
//! first use.
//!
//! The key is a keyed SipHash-1-3 of the type's name, which is stable
//! for a given build regardless of which compilation unit asks, so a
//! component type encountered from two independent call sites maps to
//! the same pool. The mapping is per-store: once a key is observed, its
//! integer is fixed for the lifetime of the store.

use std::collections::HashMap;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

const TYPE_KEY_SEED: (u64, u64) = (0x45_4d_42_45_52_43_4f_52, 0x45_54_59_50_45_53_45_51);

/// Content-addressed identity of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    /// Computes the key for a component type.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let mut hasher = SipHasher13::new_with_keys(TYPE_KEY_SEED.0, TYPE_KEY_SEED.1);
        hasher.write(core::any::type_name::<T>().as_bytes());
        Self(hasher.finish())
    }

    /// Returns the raw hash value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Dense index assignment for component types.
#[derive(Default)]
pub(crate) struct TypeSequence {
    indices: HashMap<TypeKey, usize>,
}

impl TypeSequence {
    /// Returns the dense index for `key`, assigning the next free one on
    /// first sight.
    pub(crate) fn index_for(&mut self, key: TypeKey) -> usize {
        let next = self.indices.len();
        *self.indices.entry(key).or_insert(next)
    }

    /// Returns the dense index for `key` if it has been observed.
    #[must_use]
    pub(crate) fn get(&self, key: TypeKey) -> Option<usize> {
        self.indices.get(&key).copied()
    }

    /// Number of distinct types observed.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.indices.len()
    }
}
