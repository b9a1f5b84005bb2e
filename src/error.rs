//! Errors surfaced by table operations.

use core::fmt;

/// Failures a caller can observe. Running out of hash slots is not one of
/// them: the table resizes and retries internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A `Key::Hashable` was hashed before its type was passed to
    /// [`register_hashable`](crate::register_hashable).
    UnregisteredType { type_name: &'static str },
    /// A stored [`Value`](crate::Value) was requested as a type it does not hold.
    TypeMismatch { expected: &'static str },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::UnregisteredType { type_name } => {
                write!(f, "no hash function registered for key type `{type_name}`")
            }
            TableError::TypeMismatch { expected } => {
                write!(f, "stored value is not of the requested type `{expected}`")
            }
        }
    }
}

impl std::error::Error for TableError {}
