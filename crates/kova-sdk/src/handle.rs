//! Handle — integer surrogate for a managed object reference
//!
//! A `Handle` is the only artifact of the managed runtime that native code
//! may retain indefinitely. It is a fixed-width signed integer, ABI-stable,
//! and entirely opaque: the native side can store it, copy it, and pass it
//! back, but can only turn it into a live object by calling back into the
//! engine's handle table.
//!
//! Value `0` is reserved as the nil sentinel and is never allocated.

use std::fmt;

/// Opaque integer surrogate for a managed object reference.
///
/// Handles carry no type information; callers must know out-of-band what
/// type to expect, and redemption performs a checked downcast that fails
/// loudly on mismatch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(i32);

impl Handle {
    /// The reserved nil handle, denoting "no object".
    pub const NIL: Handle = Handle(0);

    /// Reconstruct a handle from its raw integer value.
    ///
    /// This is the boundary conversion used when native code presents a
    /// stored handle back to the engine. No validation happens here; an
    /// unknown value is reported as `HandleNotFound` at lookup time.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Handle(raw)
    }

    /// Get the raw integer value for transport across the boundary.
    #[inline]
    pub const fn to_raw(self) -> i32 {
        self.0
    }

    /// Check whether this is the reserved nil handle.
    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "Handle(nil)")
        } else {
            write!(f, "Handle({})", self.0)
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
