//! Process-wide hash registry for `Key::Hashable`.
//!
//! Maps a key type's `TypeId` to a type-erased hash function. A type must be
//! registered before its first use as a key; hashing an unregistered type
//! fails with [`TableError::UnregisteredType`](crate::TableError).

use crate::key::Hashable;
use core::any::{Any, TypeId};
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Hash function stored per registered type.
pub type HashFn = fn(&dyn Any) -> u64;

static REGISTRY: Lazy<RwLock<HashMap<TypeId, HashFn>>> = Lazy::new(Default::default);

fn hash_erased<T: Hashable>(value: &dyn Any) -> u64 {
    // Callers look the function up by the value's own TypeId.
    value.downcast_ref::<T>().map_or(0, T::hash_code)
}

/// Register `T` as a usable key type. Registering twice is harmless.
pub fn register_hashable<T: Hashable>() {
    let previous = REGISTRY
        .write()
        .insert(TypeId::of::<T>(), hash_erased::<T> as HashFn);
    if previous.is_none() {
        tracing::debug!(type_name = core::any::type_name::<T>(), "registered hashable key type");
    }
}

pub fn is_registered<T: Hashable>() -> bool {
    REGISTRY.read().contains_key(&TypeId::of::<T>())
}

pub(crate) fn lookup(type_id: TypeId) -> Option<HashFn> {
    REGISTRY.read().get(&type_id).copied()
}
