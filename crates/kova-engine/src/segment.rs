//! Relocatable payload segment
//!
//! Managed byte and string payloads live inline in one contiguous buffer,
//! the way locals live in a task's stack segment. The buffer relocates when
//! it grows and live payloads slide together when it is compacted, so a raw
//! address into it is only meaningful while relocation is suppressed.
//!
//! Managed code therefore never holds addresses. It holds [`SegRef`]s —
//! slot ids that resolve through the slot table on every access and so stay
//! valid across any relocation. Raw addresses exist only inside a pin scope
//! (see [`crate::pin`]).
//!
//! While any pin is outstanding the segment does not move payloads at all:
//! compaction is a no-op and an allocation that would force the buffer to
//! relocate fails with [`SegmentError::GrowthSuppressed`]. That failure is
//! the visible form of the liveness hazard: a native call that blocks while
//! holding pins is holding the whole segment's growth hostage.
//!
//! A `Segment` belongs to one managed execution context and is not `Sync`;
//! cross-thread sharing goes through the handle table, never through
//! segment references.

use crate::error::{SegmentError, SegmentResult};
use std::cell::Cell;

/// Tracked reference to a payload slot.
///
/// A `SegRef` is a slot id, not an address: it resolves through the slot
/// table on every access and survives relocation. Slot ids are never
/// reused, so a ref to a freed payload reports [`SegmentError::Freed`]
/// instead of aliasing a newer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegRef(u32);

/// Kind tag for a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Raw byte sequence
    Bytes,
    /// UTF-8 text
    Str,
}

struct Slot {
    offset: usize,
    len: usize,
    kind: PayloadKind,
    live: bool,
    pins: Cell<u32>,
}

/// Segment statistics
#[derive(Debug, Clone)]
pub struct SegmentStats {
    /// Bytes occupied by live payloads
    pub live_bytes: usize,
    /// Bytes held by freed payloads, reclaimable by compaction
    pub freed_bytes: usize,
    /// Current buffer capacity
    pub capacity: usize,
    /// Total slots ever allocated
    pub slots: usize,
    /// Outstanding pins
    pub pinned: usize,
}

/// Growable, relocatable payload store for one managed context.
pub struct Segment {
    data: Vec<u8>,
    slots: Vec<Slot>,
    /// Outstanding pins across all slots
    pinned: Cell<usize>,
    /// Bumped every time existing payloads change address
    epoch: u64,
    freed_bytes: usize,
}

impl Segment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a segment with a pre-reserved buffer.
    ///
    /// Allocations that fit in the reserved capacity do not relocate, which
    /// is how a runtime sizes segments for pin-heavy workloads.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            slots: Vec::new(),
            pinned: Cell::new(0),
            epoch: 0,
            freed_bytes: 0,
        }
    }

    fn alloc_inner(&mut self, payload: &[u8], kind: PayloadKind) -> SegmentResult<SegRef> {
        if self.data.len() + payload.len() > self.data.capacity() {
            let pinned = self.pinned.get();
            if pinned > 0 {
                return Err(SegmentError::GrowthSuppressed { pinned });
            }
        }

        let offset = self.data.len();
        let old_capacity = self.data.capacity();
        self.data.extend_from_slice(payload);
        if self.data.capacity() != old_capacity && offset > 0 {
            // The buffer reallocated under existing payloads
            self.epoch += 1;
        }

        let id = self.slots.len() as u32;
        self.slots.push(Slot {
            offset,
            len: payload.len(),
            kind,
            live: true,
            pins: Cell::new(0),
        });
        Ok(SegRef(id))
    }

    /// Allocate a byte payload.
    ///
    /// # Errors
    ///
    /// [`SegmentError::GrowthSuppressed`] if the buffer would have to
    /// relocate while pins are outstanding.
    pub fn alloc_bytes(&mut self, payload: &[u8]) -> SegmentResult<SegRef> {
        self.alloc_inner(payload, PayloadKind::Bytes)
    }

    /// Allocate a string payload.
    ///
    /// # Errors
    ///
    /// [`SegmentError::GrowthSuppressed`] if the buffer would have to
    /// relocate while pins are outstanding.
    pub fn alloc_str(&mut self, payload: &str) -> SegmentResult<SegRef> {
        self.alloc_inner(payload.as_bytes(), PayloadKind::Str)
    }

    fn slot(&self, r: SegRef) -> SegmentResult<&Slot> {
        let slot = self
            .slots
            .get(r.0 as usize)
            .ok_or(SegmentError::BadRef(r))?;
        if !slot.live {
            return Err(SegmentError::Freed(r));
        }
        Ok(slot)
    }

    /// Kind tag of a live payload.
    pub fn kind(&self, r: SegRef) -> SegmentResult<PayloadKind> {
        Ok(self.slot(r)?.kind)
    }

    /// Backing bytes of a live payload, regardless of kind.
    pub(crate) fn payload(&self, r: SegRef) -> SegmentResult<&[u8]> {
        let slot = self.slot(r)?;
        Ok(&self.data[slot.offset..slot.offset + slot.len])
    }

    /// Read a byte payload.
    ///
    /// # Errors
    ///
    /// [`SegmentError::KindMismatch`] if the slot holds text.
    pub fn bytes(&self, r: SegRef) -> SegmentResult<&[u8]> {
        let slot = self.slot(r)?;
        if slot.kind != PayloadKind::Bytes {
            return Err(SegmentError::KindMismatch {
                expected: PayloadKind::Bytes,
                found: slot.kind,
            });
        }
        Ok(&self.data[slot.offset..slot.offset + slot.len])
    }

    /// Read a string payload.
    ///
    /// # Errors
    ///
    /// [`SegmentError::KindMismatch`] if the slot holds raw bytes.
    pub fn str_value(&self, r: SegRef) -> SegmentResult<&str> {
        let slot = self.slot(r)?;
        if slot.kind != PayloadKind::Str {
            return Err(SegmentError::KindMismatch {
                expected: PayloadKind::Str,
                found: slot.kind,
            });
        }
        let raw = &self.data[slot.offset..slot.offset + slot.len];
        // Str slots only ever hold the bytes written by alloc_str, which
        // were valid UTF-8, and payloads are immutable after allocation.
        Ok(unsafe { std::str::from_utf8_unchecked(raw) })
    }

    /// Whether a ref names a live payload.
    pub fn is_live(&self, r: SegRef) -> bool {
        self.slots
            .get(r.0 as usize)
            .map(|s| s.live)
            .unwrap_or(false)
    }

    /// Free a payload. Its bytes are reclaimed by the next [`compact`].
    ///
    /// # Errors
    ///
    /// [`SegmentError::StillPinned`] if the payload is pinned; freeing
    /// memory a native call can still address is never allowed.
    ///
    /// [`compact`]: Segment::compact
    pub fn free(&mut self, r: SegRef) -> SegmentResult<()> {
        let slot = self.slot(r)?;
        if slot.pins.get() > 0 {
            return Err(SegmentError::StillPinned(r));
        }
        let len = slot.len;
        self.slots[r.0 as usize].live = false;
        self.freed_bytes += len;
        Ok(())
    }

    /// Slide live payloads together, reclaiming freed space.
    ///
    /// Returns the number of bytes reclaimed. While any pin is outstanding
    /// this is a no-op returning 0: relocation is suppressed wholesale for
    /// the duration of a pin.
    pub fn compact(&mut self) -> usize {
        if self.pinned.get() > 0 {
            return 0;
        }

        let data = &mut self.data;
        let slots = &mut self.slots;
        let mut write = 0;
        let mut moved = false;
        for slot in slots.iter_mut() {
            if !slot.live {
                continue;
            }
            if slot.offset != write {
                data.copy_within(slot.offset..slot.offset + slot.len, write);
                slot.offset = write;
                moved = true;
            }
            write += slot.len;
        }

        let reclaimed = data.len() - write;
        data.truncate(write);
        if moved {
            self.epoch += 1;
        }
        self.freed_bytes = 0;
        reclaimed
    }

    /// Suppress relocation of a payload (and of the segment as a whole)
    /// until the matching [`unpin`].
    ///
    /// Pins nest; each `pin` must be paired with exactly one `unpin`.
    /// Prefer the scoped [`crate::pin::pin_and_call`], which pairs them
    /// automatically and never exposes an unpinned address.
    ///
    /// # Errors
    ///
    /// [`SegmentError::Freed`] / [`SegmentError::BadRef`] if the ref does
    /// not name a live payload.
    ///
    /// [`unpin`]: Segment::unpin
    pub fn pin(&self, r: SegRef) -> SegmentResult<()> {
        let slot = self.slot(r)?;
        slot.pins.set(slot.pins.get() + 1);
        self.pinned.set(self.pinned.get() + 1);
        Ok(())
    }

    /// Release one pin on a payload.
    ///
    /// Unbalanced unpins are a bug in the call-boundary glue; debug builds
    /// assert on them.
    pub fn unpin(&self, r: SegRef) {
        if let Some(slot) = self.slots.get(r.0 as usize) {
            let pins = slot.pins.get();
            debug_assert!(pins > 0, "unpin without matching pin: {r:?}");
            slot.pins.set(pins.saturating_sub(1));
            if pins > 0 {
                self.pinned.set(self.pinned.get() - 1);
            }
        } else {
            debug_assert!(false, "unpin of unknown ref: {r:?}");
        }
    }

    /// Outstanding pins across all payloads.
    pub fn pinned(&self) -> usize {
        self.pinned.get()
    }

    /// Relocation epoch: bumped every time existing payloads change
    /// address (buffer growth or compaction movement).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Segment statistics.
    pub fn stats(&self) -> SegmentStats {
        SegmentStats {
            live_bytes: self.data.len() - self.freed_bytes,
            freed_bytes: self.freed_bytes,
            capacity: self.data.capacity(),
            slots: self.slots.len(),
            pinned: self.pinned.get(),
        }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("slots", &self.slots.len())
            .field("bytes", &self.data.len())
            .field("pinned", &self.pinned.get())
            .field("epoch", &self.epoch)
            .finish()
    }
}
