//! Object Headers - Metadata for versioned objects
//!
//! Actual Header Layout (32 bytes of address space):
//! ┌─────────────────────────────────────────┐
//! │         Lock State (8 bytes)            │  <- AtomicU64: 0 / owner / FREED
//! ├─────────────────────────────────────────┤
//! │         Object Size (8 bytes)           │
//! ├─────────────────────────────────────────┤
//! │         Padding Size (8 bytes)          │
//! ├─────────────────────────────────────────┤
//! │         Copy Pointer (8 bytes)          │  <- pending copy or null
//! └─────────────────────────────────────────┘
//!         payload (obj_size + padding)
//!
//! Copy Header Layout (56 bytes of address space):
//! ┌─────────────────────────────────────────┐
//! │         Commit Clock (8 bytes)          │  <- PENDING / ABORTED / clock
//! │         Next In Chain (8 bytes)         │
//! │         Creation Clock (8 bytes)        │
//! │         Owner Actual (8 bytes)          │
//! │         Object Header (24 bytes)        │
//! └─────────────────────────────────────────┘
//!         payload (obj_size + padding)
//!
//! The layouts describe address arithmetic only. Header data lives in
//! ordinary Rust structs; the payload is reached through epoch-managed
//! pointers, never through pointer arithmetic.

use crate::object::Address;
use crate::registry::ThreadId;
use crate::util::Alignment;
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use serde::Serialize;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// Size of the shared object header in bytes
pub const OBJECT_HEADER_SIZE: usize = 24;

/// Size of an actual header (lock word + object header)
pub const ACTUAL_HEADER_SIZE: usize = 8 + OBJECT_HEADER_SIZE;

/// Size of a copy header (clocks, chain, back-reference + object header)
pub const COPY_HEADER_SIZE: usize = 32 + OBJECT_HEADER_SIZE;

/// Minimum payload alignment (bytes)
pub const OBJECT_ALIGNMENT: usize = Alignment::DEFAULT;

/// Lock word values
pub const UNLOCKED: u64 = 0;
pub const FREED: u64 = u64::MAX;

/// Commit clock values of a copy that has no commit clock yet
pub const COMMIT_PENDING: u64 = u64::MAX;
pub const COMMIT_ABORTED: u64 = u64::MAX - 1;

/// Header discriminant, inferred from the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HeaderKind {
    Actual,
    Copy,
}

impl HeaderKind {
    /// Fixed header size preceding the payload
    #[inline]
    pub const fn header_size(self) -> usize {
        match self {
            HeaderKind::Actual => ACTUAL_HEADER_SIZE,
            HeaderKind::Copy => COPY_HEADER_SIZE,
        }
    }
}

/// Size metadata shared by actual and copy headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectHeader {
    /// Payload byte length
    pub obj_size: usize,
    /// Filler after the payload up to `OBJECT_ALIGNMENT`
    pub padding_size: usize,
}

impl ObjectHeader {
    /// Header describing a payload of type `T`
    pub fn of<T>() -> Self {
        let obj_size = std::mem::size_of::<T>();
        Self {
            obj_size,
            padding_size: Alignment::padding(obj_size, OBJECT_ALIGNMENT),
        }
    }

    /// Address-space footprint of one header + payload record
    #[inline]
    pub fn record_size(&self, kind: HeaderKind) -> usize {
        kind.header_size() + self.obj_size + self.padding_size
    }
}

/// Decoded lock word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockState {
    Unlocked,
    Owned(ThreadId),
    Freed,
}

impl LockState {
    #[inline]
    fn decode(word: u64) -> Self {
        match word {
            UNLOCKED => LockState::Unlocked,
            FREED => LockState::Freed,
            owner => LockState::Owned(owner),
        }
    }
}

/// Decoded commit clock of a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CopyState {
    /// Transaction still open
    Pending,
    /// Transaction rolled back; the copy is garbage
    Aborted,
    /// Visible to every snapshot >= the clock
    Committed(u64),
}

impl CopyState {
    #[inline]
    fn decode(word: u64) -> Self {
        match word {
            COMMIT_PENDING => CopyState::Pending,
            COMMIT_ABORTED => CopyState::Aborted,
            clock => CopyState::Committed(clock),
        }
    }
}

// ============================================================================
// ACTUAL HEADER
// ============================================================================

/// Home location of a managed object
pub struct ActualHeader<T> {
    address: Address,
    object: ObjectHeader,
    lock_state: AtomicU64,
    copy: Atomic<CopyHeader<T>>,
    payload: Atomic<T>,
}

impl<T> ActualHeader<T> {
    pub(crate) fn new(address: Address, value: T) -> Self {
        Self {
            address,
            object: ObjectHeader::of::<T>(),
            lock_state: AtomicU64::new(UNLOCKED),
            copy: Atomic::null(),
            payload: Atomic::new(value),
        }
    }

    /// Payload address
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the header preceding the payload
    #[inline]
    pub fn header_address(&self) -> Address {
        Address::new(self.address.raw() - ACTUAL_HEADER_SIZE as u64)
    }

    #[inline]
    pub fn object_header(&self) -> ObjectHeader {
        self.object
    }

    // === Lock Operations ===

    #[inline]
    pub fn lock_state(&self) -> LockState {
        LockState::decode(self.lock_state.load(Ordering::Acquire))
    }

    /// CAS the lock word from unlocked to `owner`
    #[inline]
    pub(crate) fn try_acquire(&self, owner: ThreadId) -> bool {
        self.lock_state
            .compare_exchange(UNLOCKED, owner, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn release(&self, owner: ThreadId) {
        debug_assert_eq!(self.lock_state(), LockState::Owned(owner));
        self.lock_state.store(UNLOCKED, Ordering::Release);
    }

    /// Permanently retire the object; every later `try_acquire` fails
    #[inline]
    pub(crate) fn retire(&self, owner: ThreadId) {
        debug_assert_eq!(self.lock_state(), LockState::Owned(owner));
        self.lock_state.store(FREED, Ordering::Release);
    }

    // === Version Pointers ===

    #[inline]
    pub(crate) fn copy<'g>(&self, guard: &'g Guard) -> Shared<'g, CopyHeader<T>> {
        self.copy.load(Ordering::Acquire, guard)
    }

    #[inline]
    pub(crate) fn install_copy(&self, copy: Shared<'_, CopyHeader<T>>) {
        self.copy.store(copy, Ordering::Release);
    }

    /// Clear the copy pointer if it still names `expected`
    #[inline]
    pub(crate) fn clear_copy(&self, expected: Shared<'_, CopyHeader<T>>, guard: &Guard) -> bool {
        self.copy
            .compare_exchange(
                expected,
                Shared::null(),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_ok()
    }

    /// Address of the pending copy, or null
    pub fn copy_address(&self, guard: &Guard) -> Address {
        // SAFETY: the copy record stays allocated while `guard` is pinned.
        unsafe { self.copy(guard).as_ref() }
            .map(|copy| copy.address())
            .unwrap_or(Address::NULL)
    }

    #[inline]
    pub(crate) fn payload<'g>(&self, guard: &'g Guard) -> &'g T {
        let payload = self.payload.load(Ordering::Acquire, guard);
        // SAFETY: the payload is never null while the header is alive and a
        // replaced payload is destroyed only after every guard pinned at the
        // time of replacement has been dropped.
        unsafe { payload.deref() }
    }

    /// Install `value` as the new home payload (write-back)
    pub(crate) fn replace_payload(&self, value: T, guard: &Guard) {
        let old = self.payload.swap(Owned::new(value), Ordering::AcqRel, guard);
        // SAFETY: `old` is unreachable from the header now; readers that
        // loaded it hold guards that keep it alive.
        unsafe { guard.defer_destroy(old) };
    }
}

impl<T> Drop for ActualHeader<T> {
    fn drop(&mut self) {
        let guard = epoch::pin();
        let payload = self.payload.swap(Shared::null(), Ordering::AcqRel, &guard);
        if !payload.is_null() {
            // SAFETY: sections that dereferenced the payload are still pinned.
            unsafe { guard.defer_destroy(payload) };
        }
    }
}

// ============================================================================
// COPY HEADER
// ============================================================================

/// A writer's log-resident version of an object
pub struct CopyHeader<T> {
    address: Address,
    object: ObjectHeader,
    commit_clock: AtomicU64,
    creation_clock: u64,
    next_in_chain: Address,
    owner_actual: Weak<ActualHeader<T>>,
    owner_address: Address,
    owner_thread: ThreadId,
    payload: UnsafeCell<T>,
}

// SAFETY: the payload is mutated only by the owning thread while the copy is
// pending, and pending copies are never handed to other threads' readers.
unsafe impl<T: Send + Sync> Sync for CopyHeader<T> {}

impl<T> CopyHeader<T> {
    pub(crate) fn new(
        address: Address,
        value: T,
        creation_clock: u64,
        next_in_chain: Address,
        owner_actual: Weak<ActualHeader<T>>,
        owner_address: Address,
        owner_thread: ThreadId,
    ) -> Self {
        Self {
            address,
            object: ObjectHeader::of::<T>(),
            commit_clock: AtomicU64::new(COMMIT_PENDING),
            creation_clock,
            next_in_chain,
            owner_actual,
            owner_address,
            owner_thread,
            payload: UnsafeCell::new(value),
        }
    }

    /// Payload address inside the owning log
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn header_address(&self) -> Address {
        Address::new(self.address.raw() - COPY_HEADER_SIZE as u64)
    }

    #[inline]
    pub fn object_header(&self) -> ObjectHeader {
        self.object
    }

    #[inline]
    pub fn creation_clock(&self) -> u64 {
        self.creation_clock
    }

    /// Previous copy created by the same transaction
    #[inline]
    pub fn next_in_chain(&self) -> Address {
        self.next_in_chain
    }

    #[inline]
    pub fn owner_address(&self) -> Address {
        self.owner_address
    }

    #[inline]
    pub fn owner_thread(&self) -> ThreadId {
        self.owner_thread
    }

    #[inline]
    pub(crate) fn owner_actual(&self) -> &Weak<ActualHeader<T>> {
        &self.owner_actual
    }

    // === Commit State ===

    #[inline]
    pub fn state(&self) -> CopyState {
        CopyState::decode(self.commit_clock.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn commit(&self, clock: u64) {
        debug_assert!(clock < COMMIT_ABORTED);
        self.commit_clock.store(clock, Ordering::Release);
    }

    #[inline]
    pub(crate) fn mark_aborted(&self) {
        self.commit_clock.store(COMMIT_ABORTED, Ordering::Release);
    }

    /// Whether a snapshot taken at `snapshot` must see this copy
    #[inline]
    pub fn visible_at(&self, snapshot: u64) -> bool {
        matches!(self.state(), CopyState::Committed(clock) if clock <= snapshot)
    }

    // === Payload ===

    /// # Safety
    ///
    /// The copy must be committed, or the caller must be its owner with no
    /// live `payload_mut` borrow.
    #[inline]
    pub(crate) unsafe fn payload(&self) -> &T {
        &*self.payload.get()
    }

    /// # Safety
    ///
    /// The caller must be the owning transaction, the copy must be pending,
    /// and no other borrow of the payload may be live.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn payload_mut(&self) -> &mut T {
        &mut *self.payload.get()
    }
}
