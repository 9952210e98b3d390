//! Segment error types

use crate::segment::{PayloadKind, SegRef};

/// Result type for segment operations
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors from the relocatable payload segment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// Reference does not name a slot in this segment
    #[error("invalid segment reference: {0:?}")]
    BadRef(SegRef),

    /// The payload was already freed
    #[error("payload already freed: {0:?}")]
    Freed(SegRef),

    /// Accessed a payload through the wrong-kind accessor
    #[error("payload kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// Kind the accessor expects
        expected: PayloadKind,
        /// Kind actually stored
        found: PayloadKind,
    },

    /// The allocation would relocate the segment while pins are outstanding.
    ///
    /// This is the liveness hazard of a long pinned call made visible: the
    /// segment cannot grow until every pin is released.
    #[error("segment growth suppressed: {pinned} pin(s) outstanding")]
    GrowthSuppressed {
        /// Number of outstanding pins
        pinned: usize,
    },

    /// Attempted to free a payload while it is pinned
    #[error("payload still pinned: {0:?}")]
    StillPinned(SegRef),
}
