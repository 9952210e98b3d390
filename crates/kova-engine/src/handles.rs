//! Handle table — long-lived sharing across the native boundary
//!
//! Native code cannot hold a managed address across calls: the referent may
//! be relocated or collected as soon as the call that pinned it returns.
//! What it can hold is a [`Handle`] — a small integer allocated here — and
//! exchange it for the live [`ObjRef`] by calling back into the table.
//!
//! # Invariants
//!
//! - Handle `0` is the reserved nil value and is never allocated.
//! - Every live non-nil handle maps to exactly one object.
//! - Handle values are monotonically increasing and never reused, even
//!   after release. A stale integer kept by native code after release can
//!   only ever produce `HandleNotFound`.
//! - Holding an entry is what keeps the object reachable; release drops
//!   that reference and the object becomes eligible for ordinary managed
//!   reclamation.
//!
//! # Concurrency
//!
//! All operations serialize on one mutex, so each of `create`, `lookup`,
//! and `release` appears atomic to every concurrent caller. The critical
//! section only touches the map and the counter; the lock is never held
//! across a call into native or managed code, and no operation performs
//! I/O or blocks beyond the brief mutex wait.
//!
//! The table is an explicitly constructed service object. There is no
//! process-wide instance in this crate; the embedding runtime owns one (or
//! one per loaded library instance) and passes it where needed, which also
//! lets tests build independent tables.

use crate::object::ObjRef;
use kova_sdk::{Handle, InteropError, InteropResult};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// First handle value issued by a default table.
///
/// Any base above the nil sentinel is legal; starting at 1000 leaves the
/// low range free for sentinels and debug markers.
pub const HANDLE_BASE: i32 = 1000;

/// Behavior of [`HandleTable::release`] for unknown or already-released
/// handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Releasing an unknown handle is a no-op
    #[default]
    Lenient,
    /// Releasing an unknown handle reports `HandleNotFound`
    Strict,
}

struct TableInner {
    entries: FxHashMap<i32, ObjRef>,
    next: i32,
}

/// Registry mapping handle values to managed object references.
pub struct HandleTable {
    inner: Mutex<TableInner>,
    policy: ReleasePolicy,
}

impl HandleTable {
    /// Create a table allocating from [`HANDLE_BASE`] with the default
    /// (lenient) release policy.
    pub fn new() -> Self {
        Self::with_base(HANDLE_BASE)
    }

    /// Create a table allocating from a specific base value.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not above the nil sentinel (`0`).
    pub fn with_base(base: i32) -> Self {
        assert!(base > 0, "handle base must be above the nil sentinel");
        Self {
            inner: Mutex::new(TableInner {
                entries: FxHashMap::default(),
                next: base,
            }),
            policy: ReleasePolicy::default(),
        }
    }

    /// Set the release policy for unknown handles.
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Allocate a handle for an object.
    ///
    /// The returned handle is non-zero, distinct from every handle this
    /// table has ever issued, and stays valid until [`release`d].
    ///
    /// # Errors
    ///
    /// Returns [`InteropError::HandleSpaceExhausted`] once the `i32`
    /// allocator runs out. `i32::MAX` itself is never issued, so the
    /// counter always holds a valid successor. Exhaustion leaves existing
    /// entries untouched.
    ///
    /// [`release`d]: HandleTable::release
    pub fn create(&self, obj: ObjRef) -> InteropResult<Handle> {
        let mut inner = self.inner.lock();
        let value = inner.next;
        let successor = value
            .checked_add(1)
            .ok_or(InteropError::HandleSpaceExhausted)?;
        inner.next = successor;
        inner.entries.insert(value, obj);
        Ok(Handle::from_raw(value))
    }

    /// Redeem a handle for the live object reference.
    ///
    /// # Errors
    ///
    /// Returns [`InteropError::HandleNotFound`] if the handle is nil, was
    /// never allocated by this table, or was already released. Never
    /// returns a default or wrong object.
    pub fn lookup(&self, handle: Handle) -> InteropResult<ObjRef> {
        if handle.is_nil() {
            return Err(InteropError::HandleNotFound(handle));
        }
        let inner = self.inner.lock();
        inner
            .entries
            .get(&handle.to_raw())
            .cloned()
            .ok_or(InteropError::HandleNotFound(handle))
    }

    /// Redeem a handle and downcast to a concrete type in one step.
    ///
    /// The clone of the entry is taken under the lock; the downcast runs
    /// after the lock is dropped.
    ///
    /// # Errors
    ///
    /// `HandleNotFound` as for [`lookup`], or
    /// [`InteropError::TypeMismatch`] if the stored object is not a `T`.
    ///
    /// [`lookup`]: HandleTable::lookup
    pub fn lookup_as<T, R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> InteropResult<R>
    where
        T: Send + Sync + 'static,
    {
        let obj = self.lookup(handle)?;
        Ok(f(obj.downcast_ref::<T>()?))
    }

    /// Remove a handle's mapping, invalidating it for all future lookups.
    ///
    /// The integer value is never reallocated afterwards. Dropping the
    /// entry releases the table's reference to the object; if that was the
    /// last reference, the object becomes reclaimable.
    ///
    /// # Errors
    ///
    /// Under [`ReleasePolicy::Strict`], releasing a nil, unknown, or
    /// already-released handle reports `HandleNotFound`; under
    /// [`ReleasePolicy::Lenient`] it is a no-op. Neither corrupts the
    /// table.
    pub fn release(&self, handle: Handle) -> InteropResult<()> {
        let removed = if handle.is_nil() {
            None
        } else {
            self.inner.lock().entries.remove(&handle.to_raw())
        };
        match (removed, self.policy) {
            (Some(_), _) | (None, ReleasePolicy::Lenient) => Ok(()),
            (None, ReleasePolicy::Strict) => Err(InteropError::HandleNotFound(handle)),
        }
    }

    /// Pure predicate: is this the reserved nil handle?
    pub fn is_nil(handle: Handle) -> bool {
        handle.is_nil()
    }

    /// Whether a handle currently maps to an object.
    pub fn contains(&self, handle: Handle) -> bool {
        !handle.is_nil() && self.inner.lock().entries.contains_key(&handle.to_raw())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("HandleTable")
            .field("entries", &inner.entries.len())
            .field("next", &inner.next)
            .field("policy", &self.policy)
            .finish()
    }
}
