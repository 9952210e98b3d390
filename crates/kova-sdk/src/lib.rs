//! Kova SDK - ABI-surface types for native modules
//!
//! This crate provides the minimal types shared between Kova native modules
//! and the engine, without depending on the full kova-engine. A native module
//! only ever sees two things from the managed side:
//!
//! - [`Handle`] — an opaque, fixed-width integer surrogate for a managed
//!   object, safe to hold across managed-memory relocations and across
//!   arbitrarily many calls.
//! - [`InteropError`] — the boundary error taxonomy reported when a handle
//!   is redeemed.
//!
//! Raw addresses of managed memory are deliberately *not* represented here:
//! they are only ever valid inside a pinned call scope, which is an
//! engine-side concept (see `kova-engine`).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod handle;

pub use error::{InteropError, InteropResult};
pub use handle::Handle;
