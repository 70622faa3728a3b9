//! Log - Per-thread ring of copy records
//!
//! A log occupies the address window `[start, end)` of its registry slot.
//! Record `i` of the ring has its copy header at `start + i * stride` and
//! its payload right after:
//!
//! ```text
//!  start                                                         end
//!  ┌──────────────┬──────────────┬──────────────┬───┬──────────────┐
//!  │ hdr │payload │ hdr │payload │ hdr │payload │...│ hdr │payload │
//!  └──────────────┴──────────────┴──────────────┴───┴──────────────┘
//!        ▲ tail (oldest live)           ▲ head (next write)
//! ```
//!
//! Only the owning thread pushes and pops. Other threads may load records
//! for introspection under an epoch guard.

use crate::logging::{self, RluEvent};
use crate::object::{Address, CopyHeader, HeaderKind, ObjectHeader};
use crate::registry::ThreadId;
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounded, thread-owned ring of copies
pub struct Log<T> {
    owner: ThreadId,
    start: Address,
    capacity: usize,
    stride: usize,
    records: Box<[Atomic<CopyHeader<T>>]>,
    /// Position of the next record to write; rewinds only on rollback
    head: AtomicU64,
    /// Position of the oldest live record (monotonic)
    tail: AtomicU64,
}

impl<T> Log<T> {
    pub(crate) fn new(owner: ThreadId, start: Address, capacity: usize) -> Self {
        let records = (0..capacity).map(|_| Atomic::null()).collect();
        Self {
            owner,
            start,
            capacity,
            stride: ObjectHeader::of::<T>().record_size(HeaderKind::Copy),
            records,
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
        }
    }

    /// Address-space footprint of one record for payload type `T`
    pub fn record_stride() -> usize {
        ObjectHeader::of::<T>().record_size(HeaderKind::Copy)
    }

    // === Range ===

    #[inline]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    #[inline]
    pub fn start(&self) -> Address {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Address {
        self.start.add(self.capacity * self.stride)
    }

    /// `start <= address < end`
    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end()
    }

    // === Occupancy ===

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live records
    ///
    /// Safe to call from any thread. `tail` is loaded first: it only grows
    /// and `tail <= head` holds at every instant, so the later `head` is
    /// never behind the earlier `tail`.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (head.saturating_sub(tail) as usize).min(self.capacity)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    #[inline]
    fn slot(&self, position: u64) -> usize {
        (position % self.capacity as u64) as usize
    }

    #[inline]
    fn payload_address(&self, slot: usize) -> Address {
        self.start
            .add(slot * self.stride)
            .add(HeaderKind::Copy.header_size())
    }

    /// Payload address the next pushed record will occupy
    #[inline]
    pub(crate) fn next_address(&self) -> Address {
        self.payload_address(self.slot(self.head.load(Ordering::Relaxed)))
    }

    /// Ring slot whose payload starts exactly at `address`
    pub fn slot_of(&self, address: Address) -> Option<usize> {
        if !self.contains(address) {
            return None;
        }
        let header = address.checked_sub(HeaderKind::Copy.header_size())?;
        let offset = header.raw().checked_sub(self.start.raw())? as usize;
        if offset % self.stride != 0 {
            return None;
        }
        Some(offset / self.stride)
    }

    // === Owner Operations ===

    /// Append a record at the head
    ///
    /// The caller has checked `!is_full()` and built the record at
    /// `next_address()`.
    pub(crate) fn push<'g>(
        &self,
        record: Owned<CopyHeader<T>>,
        guard: &'g Guard,
    ) -> Shared<'g, CopyHeader<T>> {
        debug_assert!(!self.is_full());
        debug_assert_eq!(record.address(), self.next_address());

        let head = self.head.load(Ordering::Relaxed);
        let shared = record.into_shared(guard);
        self.records[self.slot(head)].store(shared, Ordering::Release);
        self.head.store(head + 1, Ordering::Release);
        shared
    }

    /// Oldest live record
    pub(crate) fn oldest<'g>(&self, guard: &'g Guard) -> Option<Shared<'g, CopyHeader<T>>> {
        if self.is_empty() {
            return None;
        }
        let tail = self.tail.load(Ordering::Acquire);
        let record = self.records[self.slot(tail)].load(Ordering::Acquire, guard);
        (!record.is_null()).then_some(record)
    }

    /// Release the oldest record; its memory is reclaimed after the grace
    /// period of `guard`'s epoch
    pub(crate) fn pop_oldest(&self, guard: &Guard) {
        let tail = self.tail.load(Ordering::Relaxed);
        debug_assert!(tail < self.head.load(Ordering::Relaxed));

        let record = self.records[self.slot(tail)].swap(Shared::null(), Ordering::AcqRel, guard);
        self.tail.store(tail + 1, Ordering::Release);
        if !record.is_null() {
            // SAFETY: the record is unreachable from the ring and from its
            // actual (the caller cleared `copy_pointer`).
            unsafe { guard.defer_destroy(record) };
        }
    }

    /// Release the newest record (transaction rollback)
    pub(crate) fn pop_newest(&self, guard: &Guard) {
        let head = self.head.load(Ordering::Relaxed);
        debug_assert!(head > self.tail.load(Ordering::Relaxed));

        let position = head - 1;
        let record =
            self.records[self.slot(position)].swap(Shared::null(), Ordering::AcqRel, guard);
        self.head.store(position, Ordering::Release);
        if !record.is_null() {
            // SAFETY: same as `pop_oldest`.
            unsafe { guard.defer_destroy(record) };
        }
    }

    // === Lookup ===

    /// Live record whose payload starts at `address`
    pub(crate) fn record_at<'g>(
        &self,
        address: Address,
        guard: &'g Guard,
    ) -> Option<Shared<'g, CopyHeader<T>>> {
        let slot = self.slot_of(address)?;
        let record = self.records[slot].load(Ordering::Acquire, guard);
        // SAFETY: pinned by `guard`.
        let live = unsafe { record.as_ref() }?;
        (live.address() == address).then_some(record)
    }

    /// Live records from oldest to newest
    pub(crate) fn records<'g>(&self, guard: &'g Guard) -> Vec<Shared<'g, CopyHeader<T>>> {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self
            .head
            .load(Ordering::Acquire)
            .min(tail + self.capacity as u64);
        (tail..head)
            .map(|position| self.records[self.slot(position)].load(Ordering::Acquire, guard))
            .filter(|record| !record.is_null())
            .collect()
    }
}

impl<T> Drop for Log<T> {
    fn drop(&mut self) {
        if !self.is_empty() {
            log::warn!(
                "log of thread {} dropped with {} live records",
                self.owner,
                self.len()
            );
            logging::log_event(RluEvent::LogAbandoned {
                thread: self.owner,
                records: self.len(),
            });
        }

        let guard = epoch::pin();
        while let Some(record) = self.oldest(&guard) {
            // SAFETY: pinned by `guard`.
            if let Some(copy) = unsafe { record.as_ref() } {
                if let Some(actual) = copy.owner_actual().upgrade() {
                    actual.clear_copy(record, &guard);
                }
            }
            self.pop_oldest(&guard);
        }
    }
}
