//! Kova engine interop core
//!
//! This crate is the safety boundary between the Kova managed runtime, where
//! live data can be relocated (task segments grow and compact), and native
//! code, where an address is stable for the lifetime of its allocation. Two
//! mechanisms cooperate to let the two sides share data without copying:
//!
//! - **Pinned calls** ([`pin`], [`segment`]): a caller passing the address of
//!   a managed payload into a native call must do so through
//!   [`pin::pin_and_call`], which suppresses relocation of the payload for
//!   exactly the duration of that call. Addresses never exist outside a pin
//!   scope.
//! - **The handle table** ([`handles`]): native code that needs to hold a
//!   managed object *across* calls receives an opaque integer
//!   [`Handle`](kova_sdk::Handle) instead of an address, and redeems it by
//!   calling back into [`handles::HandleTable::lookup`]. The table's entry is
//!   what keeps the object reachable; releasing the handle drops it.
//!
//! Neither mechanism defines a wire format, implements collection, or manages
//! native-side memory; those belong to the surrounding runtime.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod handles;
pub mod object;
pub mod pin;
pub mod segment;

pub use error::SegmentError;
pub use handles::{HandleTable, ReleasePolicy};
pub use object::{ManagedObj, ObjRef};
pub use pin::{pin_and_call, PinSet, Pinned};
pub use segment::{PayloadKind, SegRef, Segment};
