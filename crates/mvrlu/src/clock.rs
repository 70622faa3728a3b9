//! Clock - Global Write Clock and Snapshots
//!
//! The write clock totally orders committed transactions. A committer first
//! reserves its clock with `advance_global`, stamps every copy of its chain,
//! and only then makes the clock visible with `publish`. Readers snapshot
//! the *published* clock, so a snapshot that covers clock `c` always finds
//! every copy of commit `c` already stamped.
//!
//! ```text
//! writer:  advance_global() -> c    stamp copies    publish(c)
//!                 │                                     │
//! reserved ───────┴────── c ────────────────────────────┼─────────
//! published ───────── c-1 ──────────────────────────────┴── c ────
//! reader:                       snapshot_local() -> c-1  (sees actuals)
//! ```

use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicU64, Ordering};

/// Published snapshot value of a thread outside any read section
pub const INACTIVE: u64 = u64::MAX;

/// Global write clock
#[derive(Debug)]
pub struct Clock {
    /// Highest clock handed to a committer
    reserved: AtomicU64,
    /// Highest clock whose copies are all stamped
    published: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            reserved: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Reserve the next commit clock
    ///
    /// Called exactly once per committing transaction.
    #[inline]
    pub fn advance_global(&self) -> u64 {
        self.reserved.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make a reserved clock visible to new snapshots
    ///
    /// Publications happen in clock order: a committer waits for its
    /// predecessor, which is itself only stamping its own copies.
    pub fn publish(&self, clock: u64) {
        let backoff = Backoff::new();
        while self.published.load(Ordering::Acquire) != clock - 1 {
            backoff.snooze();
        }
        self.published.store(clock, Ordering::SeqCst);
    }

    /// Latest published clock
    #[inline]
    pub fn current(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Highest reserved clock, published or not
    #[inline]
    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::SeqCst)
    }

    /// Store the current clock into a thread's published slot
    ///
    /// Re-validates until the stored value is still the current clock, so a
    /// reclaimer that scans the slot after this returns can never miss it.
    pub fn snapshot_local(&self, slot: &AtomicU64) -> u64 {
        loop {
            let snapshot = self.current();
            slot.store(snapshot, Ordering::SeqCst);
            if self.current() == snapshot {
                return snapshot;
            }
        }
    }

    /// Retract a published snapshot
    #[inline]
    pub fn retract(&self, slot: &AtomicU64) {
        slot.store(INACTIVE, Ordering::SeqCst);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
