//! Pinned native calls
//!
//! A native callee receives raw addresses of managed payloads. Those
//! addresses are only meaningful while the segment promises not to move
//! them, and that promise is scoped to a single call:
//!
//! - **Duration**: the no-relocation guarantee holds from the moment the
//!   callee is entered until it returns, and not a moment longer.
//! - **Scope**: exactly the payloads passed as arguments are covered. An
//!   object obtained mid-call (for example by redeeming a handle) is not
//!   pinned; passing *its* bytes onward requires a nested [`pin_and_call`].
//! - **Capture timing**: an address may only be taken as part of forming
//!   the call itself. [`pin_and_call`] enforces this at the type level —
//!   [`Pinned`] views borrow from the pin scope, so safe code cannot carry
//!   an address out of it. Copying `as_ptr()` out as a plain integer
//!   side-steps the tracking entirely; such an alias goes silently stale at
//!   the next relocation, and no runtime check can catch it.
//! - **Long calls**: a callee that blocks while pinned blocks segment
//!   growth for everyone sharing the segment (allocations fail with
//!   [`GrowthSuppressed`]). This is a liveness hazard, not a safety hazard;
//!   run long or blocking native work detached from pin-sensitive
//!   segments rather than under a pin.
//!
//! [`GrowthSuppressed`]: crate::SegmentError::GrowthSuppressed

use crate::error::SegmentResult;
use crate::segment::{SegRef, Segment};

/// Borrow-scoped view of a pinned payload.
///
/// The address returned by [`as_ptr`](Pinned::as_ptr) is stable for the
/// lifetime of this view and no longer.
#[derive(Clone, Copy)]
pub struct Pinned<'a> {
    data: &'a [u8],
}

impl<'a> Pinned<'a> {
    /// The pinned bytes.
    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Raw address of the pinned bytes, for handing to the native callee.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// RAII set of pins over one segment.
///
/// Acquisition is all-or-nothing: if any ref is dead, every pin taken so
/// far is rolled back and the error is returned. Dropping the set releases
/// every pin, including during unwinding, so a panicking callee cannot leak
/// pins.
pub struct PinSet<'s> {
    seg: &'s Segment,
    refs: Vec<SegRef>,
    #[cfg(debug_assertions)]
    epoch: u64,
}

impl<'s> PinSet<'s> {
    /// Pin every ref in `refs`.
    ///
    /// # Errors
    ///
    /// Propagates the first pin failure (dead or unknown ref) after
    /// unwinding any pins already taken.
    pub fn acquire(seg: &'s Segment, refs: &[SegRef]) -> SegmentResult<Self> {
        for (taken, &r) in refs.iter().enumerate() {
            if let Err(err) = seg.pin(r) {
                for &held in &refs[..taken] {
                    seg.unpin(held);
                }
                return Err(err);
            }
        }
        Ok(Self {
            seg,
            refs: refs.to_vec(),
            #[cfg(debug_assertions)]
            epoch: seg.epoch(),
        })
    }

    /// View a pinned payload.
    ///
    /// # Errors
    ///
    /// Fails if `r` does not name a live payload in this segment; refs
    /// pinned by this set always resolve.
    pub fn view(&self, r: SegRef) -> SegmentResult<Pinned<'_>> {
        Ok(Pinned {
            data: self.seg.payload(r)?,
        })
    }
}

impl Drop for PinSet<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(
                self.epoch,
                self.seg.epoch(),
                "segment relocated while pinned"
            );
        }
        for &r in &self.refs {
            self.seg.unpin(r);
        }
    }
}

/// Pin `refs`, invoke `callee` with their stable views, then unpin.
///
/// This is the only intended way to hand a managed payload's address to
/// native code: capture and invocation are one atomic step, and the raw
/// address never exists outside the callee's dynamic extent. Pins are
/// released when the callee returns or panics.
///
/// # Errors
///
/// Fails without invoking `callee` if any ref is dead or unknown; no pins
/// remain in that case.
pub fn pin_and_call<R, F>(seg: &Segment, refs: &[SegRef], callee: F) -> SegmentResult<R>
where
    F: FnOnce(&[Pinned<'_>]) -> R,
{
    let set = PinSet::acquire(seg, refs)?;
    let mut views = Vec::with_capacity(refs.len());
    for &r in refs {
        views.push(set.view(r)?);
    }
    Ok(callee(&views))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;

    #[test]
    fn test_pin_and_call_basic() {
        let mut seg = Segment::new();
        let a = seg.alloc_bytes(&[1, 2, 3]).unwrap();
        let s = seg.alloc_str("abc").unwrap();

        let total = pin_and_call(&seg, &[a, s], |args| {
            assert_eq!(args.len(), 2);
            assert_eq!(args[0].as_slice(), &[1, 2, 3]);
            assert_eq!(args[1].as_slice(), b"abc");
            assert!(!args[0].as_ptr().is_null());
            args.iter().map(|p| p.len()).sum::<usize>()
        })
        .unwrap();

        assert_eq!(total, 6);
        assert_eq!(seg.pinned(), 0);
    }

    #[test]
    fn test_pins_released_after_call() {
        let mut seg = Segment::new();
        let r = seg.alloc_bytes(&[0; 8]).unwrap();

        pin_and_call(&seg, &[r], |_| ()).unwrap();
        assert_eq!(seg.pinned(), 0);
        // Relocation is possible again once the call returned
        seg.free(r).unwrap();
        assert!(seg.compact() > 0);
    }

    #[test]
    fn test_pinned_during_call() {
        let mut seg = Segment::new();
        let r = seg.alloc_bytes(&[0; 8]).unwrap();

        pin_and_call(&seg, &[r], |_| {
            assert_eq!(seg.pinned(), 1);
        })
        .unwrap();
    }

    #[test]
    fn test_acquire_rolls_back_on_dead_ref() {
        let mut seg = Segment::new();
        let live = seg.alloc_bytes(&[1]).unwrap();
        let dead = seg.alloc_bytes(&[2]).unwrap();
        seg.free(dead).unwrap();

        let err = pin_and_call(&seg, &[live, dead], |_| ()).unwrap_err();
        assert_eq!(err, SegmentError::Freed(dead));
        // The pin on `live` was rolled back
        assert_eq!(seg.pinned(), 0);
    }

    #[test]
    fn test_panicking_callee_unpins() {
        let mut seg = Segment::new();
        let r = seg.alloc_bytes(&[1]).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pin_and_call(&seg, &[r], |_| panic!("native callee failed"))
        }));
        assert!(result.is_err());
        assert_eq!(seg.pinned(), 0);
    }

    #[test]
    fn test_duplicate_refs_pin_nested() {
        let mut seg = Segment::new();
        let r = seg.alloc_bytes(&[9]).unwrap();

        pin_and_call(&seg, &[r, r], |args| {
            assert_eq!(args[0].as_ptr(), args[1].as_ptr());
            assert_eq!(seg.pinned(), 2);
        })
        .unwrap();
        assert_eq!(seg.pinned(), 0);
    }

    #[test]
    fn test_address_stable_within_call() {
        let mut seg = Segment::new();
        let r = seg.alloc_bytes(&[42; 16]).unwrap();

        pin_and_call(&seg, &[r], |args| {
            let first = args[0].as_ptr();
            // Every observation inside the scope sees the same address
            for _ in 0..100 {
                assert_eq!(args[0].as_ptr(), first);
            }
        })
        .unwrap();
    }
}
