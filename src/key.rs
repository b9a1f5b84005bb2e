//! Key: closed tagged union of the key shapes a table accepts.
//!
//! Four variants are built in (integers, floats, byte strings, pointer
//! identities). The fifth, `Hashable`, wraps any user type implementing
//! [`Hashable`]; its hash function is looked up in the process-wide
//! registry (see [`crate::registry`]) and memoized inside the key.

use crate::error::TableError;
use crate::registry;
use core::any::{Any, TypeId};
use core::fmt;
use once_cell::unsync::OnceCell;

/// Capability required of user-defined key types: value equality plus a
/// deterministic 64-bit hash. The type must also be registered with
/// [`register_hashable`](crate::register_hashable) before it is used as a key.
pub trait Hashable: Any + Clone + PartialEq + fmt::Debug {
    fn hash_code(&self) -> u64;
}

/// Object-safe view of a `Hashable` value.
trait ErasedHashable {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn Any) -> bool;
    fn clone_boxed(&self) -> Box<dyn ErasedHashable>;
    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Hashable> ErasedHashable for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn clone_boxed(&self) -> Box<dyn ErasedHashable> {
        Box::new(self.clone())
    }

    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type-erased user key with its type identity and a memoized hash.
pub struct HashKey {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn ErasedHashable>,
    hash: OnceCell<u64>,
}

impl HashKey {
    pub fn new<T: Hashable>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            value: Box::new(value),
            hash: OnceCell::new(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Hashable>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    /// Hash through the registry. Once a hash is known it is cached, so the
    /// registry is consulted at most once per key value.
    pub fn hash(&self) -> Result<u64, TableError> {
        self.hash
            .get_or_try_init(|| {
                let hash_fn =
                    registry::lookup(self.type_id).ok_or(TableError::UnregisteredType {
                        type_name: self.type_name,
                    })?;
                Ok(hash_fn(self.value.as_any()))
            })
            .copied()
    }
}

impl Clone for HashKey {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            value: self.value.clone_boxed(),
            hash: self.hash.clone(),
        }
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.value.eq_erased(other.value.as_any())
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt_erased(f)
    }
}

/// A table key. Equality requires the same variant; floats compare with
/// IEEE semantics, so a NaN key never equals anything (itself included).
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    Integer(i64),
    Float(f64),
    String(Box<[u8]>),
    Pointer(usize),
    Hashable(HashKey),
}

impl Key {
    pub fn hashable<T: Hashable>(value: T) -> Self {
        Key::Hashable(HashKey::new(value))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Key::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// The array slot this key lives in, if it is an integer in `[0, capacity)`.
    #[inline]
    pub fn array_index(&self, capacity: usize) -> Option<usize> {
        match *self {
            Key::Integer(i) => index_within(i, capacity),
            _ => None,
        }
    }

    /// The key's 64-bit hash. Only the `Hashable` variant can fail.
    pub fn hash(&self) -> Result<u64, TableError> {
        Ok(match self {
            Key::Integer(i) => hash_integer(*i),
            Key::Float(n) => hash_float(*n),
            Key::String(s) => hash_bytes(s),
            Key::Pointer(p) => *p as u64,
            Key::Hashable(h) => return h.hash(),
        })
    }
}

#[inline]
pub(crate) fn index_within(i: i64, capacity: usize) -> Option<usize> {
    usize::try_from(i).ok().filter(|&i| i < capacity)
}

/// Non-negative integers hash to themselves, negatives to their bitwise
/// complement. `-1` therefore shares hash 0 with `0`.
#[inline]
pub fn hash_integer(i: i64) -> u64 {
    if i >= 0 {
        i as u64
    } else {
        !i as u64
    }
}

/// Scaled normalized mantissa plus binary exponent. Every non-finite float
/// hashes to 0.
pub fn hash_float(n: f64) -> u64 {
    if !n.is_finite() {
        return 0;
    }
    let (mantissa, exponent) = frexp(n);
    let tail = mantissa * -(i32::MIN as f64);
    (tail as i64 as u64).wrapping_add(exponent as i64 as u64)
}

const STRING_SEED: u64 = 1_829_732;

/// Order-sensitive shift-xor mix over the bytes. Not cryptographic.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    bytes.iter().fold(STRING_SEED, |h, &b| {
        h ^ (h << 5).wrapping_add(h >> 2).wrapping_add(b as u64)
    })
}

/// Split a finite `x` into `m * 2^e` with `0.5 <= |m| < 1` (`m == 0` for zero).
fn frexp(x: f64) -> (f64, i32) {
    const EXP_MASK: u64 = 0x7ff << 52;
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits & EXP_MASK) >> 52) as i32;
    if biased == 0 {
        // Subnormal: scale into the normal range first.
        let (m, e) = frexp(x * 2f64.powi(54));
        return (m, e - 54);
    }
    let mantissa = f64::from_bits((bits & !EXP_MASK) | (1022 << 52));
    (mantissa, biased - 1022)
}

macro_rules! integer_keys {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                #[inline]
                fn from(value: $t) -> Self {
                    Key::Integer(value as i64)
                }
            }
        )*
    };
}

integer_keys!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Float(value)
    }
}

impl From<f32> for Key {
    fn from(value: f32) -> Self {
        Key::Float(value as f64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.as_bytes().into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::String(value.into_bytes().into_boxed_slice())
    }
}

impl From<&[u8]> for Key {
    fn from(value: &[u8]) -> Self {
        Key::String(value.into())
    }
}

impl From<Vec<u8>> for Key {
    fn from(value: Vec<u8>) -> Self {
        Key::String(value.into_boxed_slice())
    }
}

impl<T> From<*const T> for Key {
    fn from(value: *const T) -> Self {
        Key::Pointer(value as usize)
    }
}

impl<T> From<*mut T> for Key {
    fn from(value: *mut T) -> Self {
        Key::Pointer(value as usize)
    }
}
