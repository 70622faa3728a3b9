//! Reader Section
//!
//! A read section publishes the thread's snapshot and pins an epoch guard.
//! Every `deref` inside it picks, in O(1), the version of the object that
//! was current at the snapshot:
//!
//! | copy pointer | copy state                 | result |
//! |--------------|----------------------------|--------|
//! | null         | -                          | actual |
//! | set          | committed, clock <= snap   | copy   |
//! | set          | committed, clock > snap    | actual |
//! | set          | pending or aborted         | actual |
//!
//! Readers never block, never allocate and never take locks.

use crate::domain::Versioned;
use crate::handle::ThreadHandle;
use crate::object::{HeaderKind, Obj};
use crossbeam::epoch::{self, Guard};

/// Snapshot-consistent access to versioned objects
///
/// Implemented by read sections and by transactions (which additionally
/// see their own pending copies).
pub trait VersionedRead<T> {
    /// The version of `obj` visible to this reader
    fn read<'a>(&'a self, obj: &Obj<T>) -> &'a T;

    /// Snapshot clock bounding the visible versions
    fn snapshot(&self) -> u64;
}

/// An open read section
///
/// Dropping the section ends it: the outermost section retracts the
/// published snapshot and, with `reclaim_on_section_end`, runs a
/// reclamation pass over the thread's own log. That pass may write back
/// (and so allocate); it runs after the snapshot is retracted.
pub struct ReadSection<'h, T: Versioned> {
    handle: &'h ThreadHandle<T>,
    guard: Guard,
    snapshot: u64,
    outermost: bool,
}

impl<'h, T: Versioned> ReadSection<'h, T> {
    pub(crate) fn begin(handle: &'h ThreadHandle<T>) -> Self {
        let guard = epoch::pin();
        let depth = handle.depth.get();
        let outermost = depth == 0;

        let snapshot = if outermost {
            handle.rlu.clock.snapshot_local(handle.slot().snapshot())
        } else {
            handle.snapshot.get()
        };
        handle.snapshot.set(snapshot);
        handle.depth.set(depth + 1);

        Self {
            handle,
            guard,
            snapshot,
            outermost,
        }
    }

    #[inline]
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    #[inline]
    pub fn handle(&self) -> &'h ThreadHandle<T> {
        self.handle
    }

    #[inline]
    pub(crate) fn guard(&self) -> &Guard {
        &self.guard
    }

    /// The version of `obj` visible at this section's snapshot
    pub fn deref<'s>(&'s self, obj: &Obj<T>) -> &'s T {
        let actual = obj.header();
        let copy = actual.copy(&self.guard);

        // SAFETY: copy records are destroyed only after every guard pinned
        // while they were reachable has been dropped.
        if let Some(copy) = unsafe { copy.as_ref() } {
            debug_assert_eq!(
                self.handle.rlu.registry.classify(copy.address()),
                HeaderKind::Copy,
                "copy pointer of {} names non-log address {}",
                actual.address(),
                copy.address()
            );
            if copy.visible_at(self.snapshot) {
                // SAFETY: committed copies are immutable.
                return unsafe { copy.payload() };
            }
        }

        actual.payload(&self.guard)
    }
}

impl<T: Versioned> VersionedRead<T> for ReadSection<'_, T> {
    #[inline]
    fn read<'a>(&'a self, obj: &Obj<T>) -> &'a T {
        self.deref(obj)
    }

    #[inline]
    fn snapshot(&self) -> u64 {
        self.snapshot
    }
}

impl<T: Versioned> Drop for ReadSection<'_, T> {
    fn drop(&mut self) {
        let depth = self.handle.depth.get();
        debug_assert!(depth > 0);
        self.handle.depth.set(depth - 1);

        if self.outermost {
            self.handle.rlu.clock.retract(self.handle.slot().snapshot());
            if self.handle.rlu.config.reclaim_on_section_end && !self.handle.log.is_empty() {
                self.handle.reclaim();
            }
        }
    }
}
