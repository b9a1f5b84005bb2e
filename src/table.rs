//! Table: public surface over `RawTable`.
//!
//! Computes key hashes (the only fallible step) and layers the convenience
//! operations on top of the three primitives query / insert / erase.

use crate::error::TableError;
use crate::key::Key;
use crate::raw_table::RawTable;
use crate::value::Value;
use core::any::Any;
use core::fmt;
use std::borrow::Cow;

/// Hybrid array/hash table. `V` defaults to the type-erased [`Value`].
pub struct Table<V = Value> {
    raw: RawTable<V>,
}

impl<V> Table<V> {
    /// Empty table: a one-slot array part and a two-node hash part.
    pub fn new() -> Self {
        Self::with_size_log2(0, 1)
    }

    /// Table with `2^array_size_log2` array slots and `2^hash_size_log2`
    /// hash nodes (at least two).
    ///
    /// Panics if `array_size_log2 > MAX_ARRAY_BITS` or
    /// `hash_size_log2 > MAX_HASH_BITS`.
    pub fn with_size_log2(array_size_log2: u32, hash_size_log2: u32) -> Self {
        Self {
            raw: RawTable::with_size_log2(array_size_log2, hash_size_log2),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn array_capacity(&self) -> usize {
        self.raw.array_capacity()
    }

    pub fn hash_capacity(&self) -> usize {
        self.raw.hash_capacity()
    }

    pub fn get(&self, key: &Key) -> Result<Option<&V>, TableError> {
        let hash = key.hash()?;
        Ok(self.raw.get(key, hash))
    }

    pub fn get_mut(&mut self, key: &Key) -> Result<Option<&mut V>, TableError> {
        let hash = key.hash()?;
        Ok(self.raw.get_mut(key, hash))
    }

    pub fn contains_key(&self, key: &Key) -> Result<bool, TableError> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite; returns the previous value.
    pub fn insert(&mut self, key: impl Into<Key>, value: V) -> Result<Option<V>, TableError> {
        let key = key.into();
        let hash = key.hash()?;
        Ok(self.raw.insert(key, value, hash))
    }

    /// Assignment with an optional value: `None` erases the key.
    pub fn assign(
        &mut self,
        key: impl Into<Key>,
        value: Option<V>,
    ) -> Result<Option<V>, TableError> {
        let key = key.into();
        match value {
            Some(v) => self.insert(key, v),
            None => self.erase(&key),
        }
    }

    /// Remove a key; returns its value, or `None` when it was absent.
    pub fn erase(&mut self, key: &Key) -> Result<Option<V>, TableError> {
        let hash = key.hash()?;
        Ok(self.raw.erase(key, hash))
    }

    /// The current value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with<F>(&mut self, key: impl Into<Key>, default: F) -> Result<&mut V, TableError>
    where
        F: FnOnce() -> V,
    {
        let key = key.into();
        let hash = key.hash()?;
        Ok(self.raw.get_or_insert_with(key, hash, default))
    }

    /// Unordered iteration over live entries. Array slots yield owned
    /// integer keys; hash nodes yield borrowed keys.
    pub fn iter(&self) -> impl Iterator<Item = (Cow<'_, Key>, &V)> + '_ {
        self.raw.iter()
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.raw.assert_invariants();
    }
}

impl Table<Value> {
    /// Read a value as `T`; a stored value of another type is an error.
    pub fn get_as<T: Any>(&self, key: &Key) -> Result<Option<&T>, TableError> {
        self.get(key)?.map(Value::downcast_ref::<T>).transpose()
    }

    pub fn get_as_mut<T: Any>(&mut self, key: &Key) -> Result<Option<&mut T>, TableError> {
        self.get_mut(key)?.map(Value::downcast_mut::<T>).transpose()
    }

    pub fn insert_value<T: Any>(
        &mut self,
        key: impl Into<Key>,
        value: T,
    ) -> Result<Option<Value>, TableError> {
        self.insert(key, Value::new(value))
    }

    /// The stored `T` for `key`, or a freshly inserted `T::default()`.
    /// Backs compound updates such as `*t.unwrap_or_default::<i64>(k)? += 1`.
    pub fn unwrap_or_default<T: Any + Default>(
        &mut self,
        key: impl Into<Key>,
    ) -> Result<&mut T, TableError> {
        self.get_or_insert_with(key, || Value::new(T::default()))?
            .downcast_mut::<T>()
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
