//! Opaque owned payload for tables that store heterogeneous values.

use crate::error::TableError;
use core::any::{type_name, Any};
use core::fmt;

/// A boxed value of any `'static` type. Reading it back requires naming
/// the stored type; the wrong type yields [`TableError::TypeMismatch`].
pub struct Value(Box<dyn Any>);

impl Value {
    pub fn new<T: Any>(value: T) -> Self {
        Value(Box::new(value))
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Result<&T, TableError> {
        self.0.downcast_ref::<T>().ok_or(TableError::TypeMismatch {
            expected: type_name::<T>(),
        })
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Result<&mut T, TableError> {
        self.0.downcast_mut::<T>().ok_or(TableError::TypeMismatch {
            expected: type_name::<T>(),
        })
    }

    pub fn into_inner<T: Any>(self) -> Result<T, TableError> {
        self.0
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| TableError::TypeMismatch {
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Value(..)")
    }
}
