//! RawTable: structural engine behind `Table`.
//!
//! Two regions:
//! - `array`: `2^array_size_log2` optional values indexed directly by
//!   integer keys in `[0, array_capacity)`.
//! - `hash`: `2^hash_size_log2` nodes addressed by `hash & (capacity - 1)`
//!   (the key's main position), with colliding keys linked into chains
//!   through `next` indices.
//!
//! Invariants
//! - An integer key inside the array range lives only in `array`.
//! - Every occupied node is reachable by following `next` from the main
//!   position of its key. A node sitting outside its own main position is a
//!   guest; inserting a key whose main position holds a guest moves the
//!   guest elsewhere, so a key at its own main position is never evicted.
//! - A vacant node is never linked from any chain.
//!
//! Vacant nodes are found through a lazily pruned free list (stale entries
//! are skipped on the way) and then through `last_free`, a cursor that only
//! moves towards 0. When both run dry the table repartitions itself (see
//! `recompute_size`) and the pending insertion is retried once.
//!
//! Hashes are computed by the caller and stored with each entry, so this
//! layer never calls user hashing code and cannot fail.

use crate::key::{hash_integer, Key};
use core::mem;
use std::borrow::Cow;

/// Bit-length scan limit of the array-size search: the array part never
/// grows beyond `2^MAX_ARRAY_BITS` slots through resizing.
pub const MAX_ARRAY_BITS: u32 = 31;

/// Largest accepted `hash_size_log2`.
pub const MAX_HASH_BITS: u32 = usize::BITS - 1;

const MAX_BIT: usize = 64;

#[derive(Debug)]
struct Entry<V> {
    key: Key,
    value: V,
    hash: u64,
}

#[derive(Debug)]
struct Node<V> {
    entry: Option<Entry<V>>,
    next: Option<usize>,
    // Meaningful only while vacant.
    vacancy_next: Option<usize>,
}

impl<V> Node<V> {
    const fn vacant() -> Self {
        Node {
            entry: None,
            next: None,
            vacancy_next: None,
        }
    }

    #[inline]
    fn is_vacant(&self) -> bool {
        self.entry.is_none()
    }
}

/// Location of a live value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Array(usize),
    Hash(usize),
}

pub struct RawTable<V> {
    array: Vec<Option<V>>,
    hash: Vec<Node<V>>,
    vacancy_head: Option<usize>,
    last_free: usize,
    array_size_log2: u32,
    hash_size_log2: u32,
    len: usize,
}

impl<V> RawTable<V> {
    /// `hash_size_log2` is raised to 1 if smaller; the hash part never has
    /// fewer than two nodes.
    ///
    /// # Panics
    ///
    /// If `array_size_log2 > MAX_ARRAY_BITS` or
    /// `hash_size_log2 > MAX_HASH_BITS`.
    pub fn with_size_log2(array_size_log2: u32, hash_size_log2: u32) -> Self {
        assert!(
            array_size_log2 <= MAX_ARRAY_BITS,
            "array_size_log2 {array_size_log2} exceeds {MAX_ARRAY_BITS}"
        );
        assert!(
            hash_size_log2 <= MAX_HASH_BITS,
            "hash_size_log2 {hash_size_log2} exceeds {MAX_HASH_BITS}"
        );
        let hash_size_log2 = hash_size_log2.max(1);
        let array_len = 1usize << array_size_log2;
        let hash_len = 1usize << hash_size_log2;
        Self {
            array: std::iter::repeat_with(|| None).take(array_len).collect(),
            hash: std::iter::repeat_with(Node::vacant).take(hash_len).collect(),
            vacancy_head: None,
            last_free: hash_len - 1,
            array_size_log2,
            hash_size_log2,
            len: 0,
        }
    }

    #[inline]
    pub fn array_capacity(&self) -> usize {
        1 << self.array_size_log2
    }

    #[inline]
    pub fn hash_capacity(&self) -> usize {
        1 << self.hash_size_log2
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn main_position(&self, hash: u64) -> usize {
        (hash as usize) & (self.hash_capacity() - 1)
    }

    fn find_node(&self, key: &Key, hash: u64) -> Option<usize> {
        let mut idx = Some(self.main_position(hash));
        while let Some(i) = idx {
            let node = &self.hash[i];
            match &node.entry {
                None => return None,
                Some(e) if e.hash == hash && e.key == *key => return Some(i),
                Some(_) => idx = node.next,
            }
        }
        None
    }

    pub fn find(&self, key: &Key, hash: u64) -> Option<Slot> {
        match key.array_index(self.array_capacity()) {
            Some(i) => self.array[i].as_ref().map(|_| Slot::Array(i)),
            None => self.find_node(key, hash).map(Slot::Hash),
        }
    }

    pub fn slot_value(&self, slot: Slot) -> Option<&V> {
        match slot {
            Slot::Array(i) => self.array.get(i)?.as_ref(),
            Slot::Hash(i) => self.hash.get(i)?.entry.as_ref().map(|e| &e.value),
        }
    }

    pub fn slot_value_mut(&mut self, slot: Slot) -> Option<&mut V> {
        match slot {
            Slot::Array(i) => self.array.get_mut(i)?.as_mut(),
            Slot::Hash(i) => self.hash.get_mut(i)?.entry.as_mut().map(|e| &mut e.value),
        }
    }

    pub fn get(&self, key: &Key, hash: u64) -> Option<&V> {
        self.slot_value(self.find(key, hash)?)
    }

    pub fn get_mut(&mut self, key: &Key, hash: u64) -> Option<&mut V> {
        let slot = self.find(key, hash)?;
        self.slot_value_mut(slot)
    }

    /// Insert or overwrite; returns the previous value for the key.
    pub fn insert(&mut self, key: Key, value: V, hash: u64) -> Option<V> {
        self.upsert(key, value, hash).2
    }

    /// Insert or overwrite, reporting where the value now lives together
    /// with the stored value and the previous one.
    pub fn upsert(&mut self, key: Key, value: V, hash: u64) -> (Slot, &mut V, Option<V>) {
        if let Some(i) = key.array_index(self.array_capacity()) {
            let previous = self.array[i].take();
            if previous.is_none() {
                self.len += 1;
            }
            return (Slot::Array(i), self.array[i].insert(value), previous);
        }
        // Overwrite in place wherever the key already sits in its chain,
        // keeping the stored key.
        if let Some(i) = self.find_node(&key, hash) {
            let (key, previous) = match self.hash[i].entry.take() {
                Some(e) => (e.key, Some(e.value)),
                None => (key, None),
            };
            if previous.is_none() {
                self.len += 1;
            }
            let e = self.hash[i].entry.insert(Entry { key, value, hash });
            return (Slot::Hash(i), &mut e.value, previous);
        }
        self.len += 1;
        let (slot, value) = self.insert_new(Entry { key, value, hash });
        (slot, value, None)
    }

    /// The value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with<F>(&mut self, key: Key, hash: u64, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        if let Some(i) = key.array_index(self.array_capacity()) {
            if self.array[i].is_none() {
                self.len += 1;
            }
            return self.array[i].get_or_insert_with(default);
        }
        if let Some(i) = self.find_node(&key, hash) {
            let e = self.hash[i].entry.get_or_insert_with(|| Entry {
                key,
                value: default(),
                hash,
            });
            return &mut e.value;
        }
        self.len += 1;
        self.insert_new(Entry {
            key,
            value: default(),
            hash,
        })
        .1
    }

    /// Store an entry for a key known to be absent from the table.
    fn place(&mut self, entry: Entry<V>) -> (Slot, &mut V) {
        match entry.key.array_index(self.array_capacity()) {
            Some(i) => (Slot::Array(i), self.array[i].insert(entry.value)),
            None => self.insert_new(entry),
        }
    }

    /// Hash-part insertion of an absent key.
    fn insert_new(&mut self, entry: Entry<V>) -> (Slot, &mut V) {
        let mp = self.main_position(entry.hash);
        let Some(incumbent_hash) = self.hash[mp].entry.as_ref().map(|e| e.hash) else {
            let e = self.hash[mp].entry.insert(entry);
            return (Slot::Hash(mp), &mut e.value);
        };

        let Some(free) = self.get_free_pos() else {
            self.recompute_size();
            // The new sizing leaves room for this entry, so this does not
            // come back here.
            return self.place(entry);
        };

        let incumbent_mp = self.main_position(incumbent_hash);
        if incumbent_mp == mp {
            // Incumbent is home: the newcomer joins its chain right after it.
            self.hash[free].next = self.hash[mp].next;
            self.hash[mp].next = Some(free);
            let e = self.hash[free].entry.insert(entry);
            (Slot::Hash(free), &mut e.value)
        } else {
            // Incumbent is a guest: move it to `free` and take its slot.
            let mut prev = incumbent_mp;
            loop {
                match self.hash[prev].next {
                    Some(n) if n == mp => break,
                    Some(n) => prev = n,
                    None => unreachable!("guest node is not reachable from its main position"),
                }
            }
            self.hash[free].entry = self.hash[mp].entry.take();
            self.hash[free].next = self.hash[mp].next.take();
            self.hash[prev].next = Some(free);
            tracing::trace!(from = mp, to = free, "displaced guest node");
            let e = self.hash[mp].entry.insert(entry);
            (Slot::Hash(mp), &mut e.value)
        }
    }

    fn get_free_pos(&mut self) -> Option<usize> {
        while let Some(head) = self.vacancy_head {
            if self.hash[head].is_vacant() {
                return Some(head);
            }
            // Stale: the slot was claimed since it was freed.
            self.vacancy_head = self.hash[head].vacancy_next.take();
        }

        loop {
            if self.hash[self.last_free].is_vacant() {
                return Some(self.last_free);
            }
            if self.last_free == 0 {
                return None;
            }
            self.last_free -= 1;
        }
    }

    /// Vacate a node, push it onto the free list and return its entry.
    fn free(&mut self, i: usize) -> Option<Entry<V>> {
        let node = &mut self.hash[i];
        let entry = node.entry.take();
        node.next = None;
        if self.vacancy_head != Some(i) {
            node.vacancy_next = self.vacancy_head;
            self.vacancy_head = Some(i);
        }
        entry
    }

    /// Remove a key; returns its value if it was present.
    pub fn erase(&mut self, key: &Key, hash: u64) -> Option<V> {
        if let Some(i) = key.array_index(self.array_capacity()) {
            let previous = self.array[i].take();
            if previous.is_some() {
                self.len -= 1;
            }
            return previous;
        }

        let mut prev = None;
        let mut idx = self.main_position(hash);
        loop {
            match &self.hash[idx].entry {
                None => return None,
                Some(e) if e.hash == hash && e.key == *key => break,
                Some(_) => {}
            }
            match self.hash[idx].next {
                Some(n) => {
                    prev = Some(idx);
                    idx = n;
                }
                None => return None,
            }
        }

        self.len -= 1;
        let removed = match (prev, self.hash[idx].next) {
            (None, None) => self.free(idx),
            (None, Some(next)) => {
                // Pull the successor up so the chain stays anchored at the
                // main position.
                let successor = self.hash[next].entry.take();
                self.hash[idx].next = self.hash[next].next;
                let removed = mem::replace(&mut self.hash[idx].entry, successor);
                self.free(next);
                removed
            }
            (Some(p), next) => {
                self.hash[p].next = next;
                self.free(idx)
            }
        };
        removed.map(|e| e.value)
    }

    /// Pick new region sizes from the current key distribution and resize.
    ///
    /// The array part becomes the largest power of two `2^(i+1)` whose
    /// integer keys fill more than half of it (slot 0 always counts as
    /// used). Everything else, plus the pending insertion, sizes the hash
    /// part.
    fn recompute_size(&mut self) {
        let mut counter = [0usize; MAX_BIT];
        // Slot 0 and the pending key are always accounted for.
        let mut live = 2usize;

        for (i, slot) in self.array.iter().enumerate().skip(1) {
            if slot.is_some() {
                count_integer(&mut counter, i as i64);
                live += 1;
            }
        }
        for node in &self.hash {
            if let Some(e) = &node.entry {
                live += 1;
                if let Some(i) = e.key.as_integer() {
                    count_integer(&mut counter, i);
                }
            }
        }

        let mut new_array_size_log2 = 0;
        let mut array_part = 0;
        let mut total = 1;
        for i in 0..MAX_ARRAY_BITS {
            total += counter[i as usize];
            if total > 1usize << i {
                new_array_size_log2 = i + 1;
                array_part = total;
            }
        }

        let hash_part = live.saturating_sub(array_part).max(1);
        let new_hash_size_log2 = (hash_part.ilog2() + 1).max(1);
        self.resize(new_array_size_log2, new_hash_size_log2);
    }

    /// Rebuild into regions of the given sizes and swap them in as a unit.
    pub fn resize(&mut self, new_array_size_log2: u32, new_hash_size_log2: u32) {
        let mut scratch = RawTable::with_size_log2(new_array_size_log2, new_hash_size_log2);
        let boundary = scratch.array_capacity();

        for (i, slot) in mem::take(&mut self.array).into_iter().enumerate() {
            let Some(value) = slot else { continue };
            if i < boundary {
                scratch.array[i] = Some(value);
            } else {
                let key = i as i64;
                scratch.place(Entry {
                    key: Key::Integer(key),
                    value,
                    hash: hash_integer(key),
                });
            }
        }
        for node in mem::take(&mut self.hash) {
            if let Some(entry) = node.entry {
                scratch.place(entry);
            }
        }
        scratch.len = self.len;

        tracing::debug!(
            len = self.len,
            old_array = 1usize << self.array_size_log2,
            old_hash = 1usize << self.hash_size_log2,
            new_array = scratch.array_capacity(),
            new_hash = scratch.hash_capacity(),
            "resized table"
        );
        *self = scratch;
    }

    /// Unordered iteration: array slots first, then the hash part.
    pub fn iter(&self) -> impl Iterator<Item = (Cow<'_, Key>, &V)> + '_ {
        let array = self.array.iter().enumerate().filter_map(|(i, v)| {
            v.as_ref()
                .map(|v| (Cow::Owned(Key::Integer(i as i64)), v))
        });
        let hash = self
            .hash
            .iter()
            .filter_map(|n| n.entry.as_ref().map(|e| (Cow::Borrowed(&e.key), &e.value)));
        array.chain(hash)
    }

    /// Panics if any structural invariant is broken.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert!(self.hash_size_log2 >= 1);
        assert_eq!(self.array.len(), self.array_capacity());
        assert_eq!(self.hash.len(), self.hash_capacity());
        assert!(self.last_free < self.hash_capacity());

        let mut live = self.array.iter().filter(|v| v.is_some()).count();
        for (idx, node) in self.hash.iter().enumerate() {
            let Some(e) = &node.entry else {
                assert!(node.next.is_none(), "vacant node {idx} is linked");
                continue;
            };
            live += 1;
            assert_eq!(
                e.key.array_index(self.array_capacity()),
                None,
                "array-range key {:?} in hash part",
                e.key
            );
            assert_eq!(e.key.hash().ok(), Some(e.hash), "stale stored hash");

            let mut cursor = Some(self.main_position(e.hash));
            let mut steps = 0;
            while cursor != Some(idx) {
                let c = cursor.expect("node not reachable from its main position");
                assert!(self.hash[c].entry.is_some(), "chain runs through vacant node");
                cursor = self.hash[c].next;
                steps += 1;
                assert!(steps <= self.hash.len(), "cycle in collision chain");
            }

            if !matches!(e.key, Key::Float(f) if f.is_nan()) {
                assert_eq!(self.find_node(&e.key, e.hash), Some(idx), "duplicate key");
            }
        }
        assert_eq!(live, self.len);
    }
}

fn count_integer(counter: &mut [usize; MAX_BIT], key: i64) {
    if key >= 1 {
        counter[key.ilog2() as usize] += 1;
    }
}

impl<V> Default for RawTable<V> {
    fn default() -> Self {
        Self::with_size_log2(0, 1)
    }
}
