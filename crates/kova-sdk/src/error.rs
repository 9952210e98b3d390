//! Error types for the interop boundary

use crate::handle::Handle;

/// Result type for boundary calls
pub type InteropResult<T> = Result<T, InteropError>;

/// Errors reported when native code redeems or releases a handle.
///
/// Every variant is recoverable and must be surfaced to the immediate
/// caller; a failed lookup never silently yields a default or wrong object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    /// The handle is nil, was never allocated, or was already released
    #[error("handle not found: {0:?}")]
    HandleNotFound(Handle),

    /// The object behind the handle is not of the expected type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the caller asked for
        expected: &'static str,
        /// Type actually stored in the table
        found: &'static str,
    },

    /// The monotonic handle allocator has no further values to issue.
    ///
    /// Fatal to further `create` calls on the affected table, but existing
    /// entries remain intact and resolvable. Values are never wrapped
    /// around into reuse.
    #[error("handle space exhausted")]
    HandleSpaceExhausted,
}
