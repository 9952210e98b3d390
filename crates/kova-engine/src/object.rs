//! Managed object references
//!
//! The handle table stores [`ObjRef`]s, not raw addresses. An `ObjRef` is a
//! clonable strong reference: as long as one exists (in the table, or held by
//! managed code), the underlying object stays reachable. Equality is
//! reference identity ([`ObjRef::ptr_eq`]), never address comparison by the
//! caller.
//!
//! Objects are stored untyped. Retrieval goes through a checked downcast
//! that reports [`InteropError::TypeMismatch`] with both type names rather
//! than coercing.

use kova_sdk::{InteropError, InteropResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Capability exposed by every value that can live behind a handle.
///
/// Implemented blanket-wise for all `Send + Sync + 'static` types; the two
/// methods exist so a type-erased reference can still be downcast and can
/// report what it actually is when a downcast fails.
pub trait ManagedObj: Send + Sync + 'static {
    /// View the object as `Any` for checked downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete stored type, for error reporting.
    fn type_name(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> ManagedObj for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Strong, clonable reference to a managed object.
#[derive(Clone)]
pub struct ObjRef(Arc<dyn ManagedObj>);

impl ObjRef {
    /// Wrap a value into a managed object reference.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        ObjRef(Arc::new(value))
    }

    /// Checked downcast to a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`InteropError::TypeMismatch`] naming both the expected and
    /// the stored type if the object is not a `T`.
    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> InteropResult<&T> {
        self.0
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| InteropError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.0.type_name(),
            })
    }

    /// Check whether the object is of type `T` without extracting it.
    pub fn is<T: Send + Sync + 'static>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Name of the stored concrete type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Reference identity: do both refs name the same object?
    pub fn ptr_eq(a: &ObjRef, b: &ObjRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        ObjRef::ptr_eq(self, other)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef<{}>", self.type_name())
    }
}
