//! hybrid-table: an associative container with an array part for dense
//! non-negative integer keys and a chained-scatter hash part for every
//! other key, the storage primitive of scripting-language runtimes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: O(1) integer indexing and O(1) average arbitrary-key lookup in
//!   one structure, repartitioned adaptively as the key mix shifts.
//! - Layers:
//!   - Key: closed tagged union (integer, float, byte string, pointer
//!     identity, user `Hashable`) with per-variant hashing.
//!   - Registry: process-wide `TypeId -> hash fn` map consulted only by
//!     `Key::Hashable`, with the result memoized in the key.
//!   - RawTable<V>: structural engine. Array region plus a region of nodes
//!     linked into collision chains by index; a lazily pruned free list and
//!     a monotone `last_free` cursor find vacant nodes; a full table is
//!     repartitioned by `recompute_size` and the insertion retried once.
//!   - Table<V>: public API. Hashes keys (the only fallible step) and
//!     builds assignment and get-or-insert helpers from query / insert /
//!     erase.
//!
//! Constraints
//! - Single-threaded: `Key` is `!Send`/`!Sync`, so tables are too. No locks
//!   or atomics.
//! - A resize builds fresh regions, migrates every entry, then replaces the
//!   table's storage, sizes, free list and cursor in one assignment.
//! - Integer keys inside `[0, array_capacity)` never occupy a hash node.
//! - A key at its own main position is never evicted by a later collider;
//!   guests are moved instead.
//!
//! Hashing
//! - Each hash-part entry stores its hash. Relinking and resizing use the
//!   stored hash and never call back into user code.
//!
//! Notes and non-goals
//! - NaN float keys can be inserted but never compare equal, so they
//!   cannot be looked up or erased afterwards.
//! - The array part stops growing at `2^MAX_ARRAY_BITS` slots.
//! - No ordered iteration, persistence or thread-safety.

mod error;
mod key;
mod raw_table;
#[cfg(test)]
mod raw_table_proptest;
pub mod registry;
mod table;
mod value;

// Public surface
pub use error::TableError;
pub use key::{hash_bytes, hash_float, hash_integer, HashKey, Hashable, Key};
pub use raw_table::{MAX_ARRAY_BITS, MAX_HASH_BITS};
pub use registry::{is_registered, register_hashable};
pub use table::Table;
pub use value::Value;

// Internal benchmarking hook.
#[cfg(feature = "bench_internal")]
pub use raw_table::{RawTable, Slot};
