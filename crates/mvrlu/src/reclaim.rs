//! Quiescence Detection and Write-Back
//!
//! A committed copy with clock `c` may replace its actual once every active
//! snapshot is `>= c`: from then on no reader can need the old payload.
//! Reclamation walks a log from the oldest record, writes eligible copies
//! back into their actuals and releases the records.
//!
//! Write-back is normally done by the log owner. A writer that finds an
//! eligible copy from another thread on an object it just locked writes it
//! back itself, so an idle owner never blocks progress. Both paths go
//! through [`write_back`], which installs the payload under the object's
//! lock; the copy pointer is cleared by compare-and-swap, so a copy is
//! written back at most once.

use crate::domain::{Mvrlu, Versioned};
use crate::log::Log;
use crate::object::{CopyHeader, CopyState, LockState};
use crate::registry::ThreadId;
use crossbeam::epoch::{self, Guard, Shared};
use serde::Serialize;

/// Outcome of one reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    /// Copies installed into their actuals by this pass
    pub written_back: usize,
    /// Records removed from the log
    pub released: usize,
    /// Records still in the log
    pub remaining: usize,
    /// Minimum active snapshot the pass worked against
    pub global_min: u64,
}

/// Result of a single write-back attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteBack {
    /// The copy now lives in its actual
    Installed,
    /// Nothing to do: the copy was already written back or superseded, or
    /// its object is gone
    Skipped,
    /// Another writer holds the object's lock
    Blocked,
}

/// Install the committed `copy` (loaded from `record`) into its actual
///
/// `helper` is the thread doing the work; a lock it already holds is
/// reused. The caller has checked that the copy is committed and eligible.
pub(crate) fn write_back<T: Versioned>(
    copy: &CopyHeader<T>,
    record: Shared<'_, CopyHeader<T>>,
    helper: ThreadId,
    guard: &Guard,
) -> WriteBack {
    let Some(actual) = copy.owner_actual().upgrade() else {
        return WriteBack::Skipped;
    };
    if actual.copy(guard) != record {
        return WriteBack::Skipped;
    }

    let acquired = match actual.lock_state() {
        LockState::Freed => false,
        LockState::Owned(owner) if owner == helper => false,
        _ => {
            if !actual.try_acquire(helper) {
                return WriteBack::Blocked;
            }
            true
        },
    };

    // Re-check under the lock: another helper may have finished first.
    let installed = actual.copy(guard) == record && {
        // SAFETY: committed copies are never mutated.
        let value = unsafe { copy.payload() }.clone();
        actual.replace_payload(value, guard);
        actual.clear_copy(record, guard)
    };

    if acquired {
        actual.release(helper);
    }

    if installed {
        WriteBack::Installed
    } else {
        WriteBack::Skipped
    }
}

/// One reclamation pass over a thread's log
pub(crate) struct Reclaimer<'a, T> {
    rlu: &'a Mvrlu<T>,
    log: &'a Log<T>,
    owner: ThreadId,
}

impl<'a, T: Versioned> Reclaimer<'a, T> {
    pub(crate) fn new(rlu: &'a Mvrlu<T>, log: &'a Log<T>, owner: ThreadId) -> Self {
        Self { rlu, log, owner }
    }

    /// Release records from the oldest end until one must stay
    ///
    /// A record stays if it is pending (an open transaction), committed
    /// after the global minimum snapshot, or blocked by a foreign lock.
    /// Records are released in log order only.
    pub(crate) fn run(&self) -> ReclaimReport {
        let guard = epoch::pin();
        let global_min = self.rlu.registry.min_snapshot();
        let mut report = ReclaimReport {
            global_min,
            ..Default::default()
        };

        while let Some(record) = self.log.oldest(&guard) {
            // SAFETY: pinned by `guard`; only the owner pops records.
            let copy = unsafe { record.deref() };

            match copy.state() {
                CopyState::Pending => break,
                CopyState::Aborted => {},
                CopyState::Committed(clock) if clock <= global_min => {
                    match write_back(copy, record, self.owner, &guard) {
                        WriteBack::Installed => report.written_back += 1,
                        WriteBack::Skipped => {},
                        WriteBack::Blocked => break,
                    }
                },
                CopyState::Committed(_) => break,
            }

            self.log.pop_oldest(&guard);
            report.released += 1;
        }

        report.remaining = self.log.len();
        log::trace!(
            "thread {} reclaim: {} released, {} remaining (min snapshot {})",
            self.owner,
            report.released,
            report.remaining,
            global_min
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MvrluConfig;
    use std::sync::Arc;

    fn domain() -> Arc<Mvrlu<u64>> {
        Mvrlu::new(MvrluConfig {
            max_threads: 4,
            log_capacity: 8,
            max_retries: 4,
            reclaim_on_section_end: false,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_open_reader_delays_write_back() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut writer = rlu.register_thread().unwrap();
        let reader = rlu.register_thread().unwrap();

        let section = reader.begin_read();
        writer
            .write(|txn| {
                *txn.try_lock(&obj)? = 2;
                Ok(())
            })
            .unwrap();

        let report = writer.reclaim();
        assert_eq!(report.global_min, 0);
        assert_eq!(report.released, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(*section.deref(&obj), 1);
        drop(section);

        let report = writer.reclaim();
        assert_eq!(report.written_back, 1);
        assert_eq!(report.released, 1);
        assert_eq!(report.remaining, 0);

        let guard = epoch::pin();
        assert_eq!(*obj.header().payload(&guard), 2);
        assert!(obj.header().copy(&guard).is_null());
    }

    #[test]
    fn test_reclaim_is_idempotent() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut writer = rlu.register_thread().unwrap();

        writer
            .write(|txn| {
                *txn.try_lock(&obj)? += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(writer.reclaim().written_back, 1);
        let again = writer.reclaim();
        assert_eq!(again.written_back, 0);
        assert_eq!(again.released, 0);
        assert_eq!(writer.read(|s| *s.deref(&obj)), 2);
    }

    #[test]
    fn test_pending_record_stops_pass() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut writer = rlu.register_thread().unwrap();
        let log = rlu.registry().log_of(0).unwrap();

        let mut txn = writer.begin_write();
        txn.try_lock(&obj).unwrap();
        let report = Reclaimer::new(&rlu, &log, 1).run();
        assert_eq!(report.released, 0);
        assert_eq!(report.remaining, 1);
        txn.abort();
    }

    #[test]
    fn test_foreign_lock_const_settles_copy() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut owner = rlu.register_thread().unwrap();
        let mut other = rlu.register_thread().unwrap();

        owner
            .write(|txn| {
                *txn.try_lock(&obj)? = 2;
                Ok(())
            })
            .unwrap();

        let mut txn = other.begin_write();
        txn.lock_const(&obj).unwrap();
        assert_eq!(*txn.deref(&obj), 2);
        let guard = epoch::pin();
        assert!(obj.header().copy(&guard).is_null());
        drop(guard);

        // Already written back by `other`: the owner only releases the record.
        let report = owner.reclaim();
        assert_eq!(report.released, 1);
        assert_eq!(report.written_back, 0);
        txn.abort();
    }

    #[test]
    fn test_write_back_blocked_by_foreign_lock() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut owner = rlu.register_thread().unwrap();

        owner
            .write(|txn| {
                *txn.try_lock(&obj)? = 2;
                Ok(())
            })
            .unwrap();

        let guard = epoch::pin();
        let record = obj.header().copy(&guard);
        let copy = unsafe { record.deref() };
        assert!(obj.header().try_acquire(99));
        assert_eq!(write_back(copy, record, owner.id(), &guard), WriteBack::Blocked);
        assert_eq!(owner.reclaim().remaining, 1);

        obj.header().release(99);
        assert_eq!(write_back(copy, record, owner.id(), &guard), WriteBack::Installed);
        assert_eq!(write_back(copy, record, owner.id(), &guard), WriteBack::Skipped);
        drop(guard);
        assert_eq!(owner.reclaim().written_back, 0);
        assert!(owner.log().is_empty());
    }

    #[test]
    fn test_writer_helps_idle_owner() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut idle = rlu.register_thread().unwrap();
        let mut busy = rlu.register_thread().unwrap();

        idle.write(|txn| {
            *txn.try_lock(&obj)? = 2;
            Ok(())
        })
        .unwrap();

        // `idle` never reclaims; `busy` writes its copy back on lock.
        busy.write(|txn| {
            *txn.try_lock(&obj)? += 10;
            Ok(())
        })
        .unwrap();
        assert_eq!(busy.read(|s| *s.deref(&obj)), 12);

        let report = idle.reclaim();
        assert_eq!(report.released, 1);
        assert_eq!(report.written_back, 0);
        assert_eq!(busy.reclaim().written_back, 1);

        let guard = epoch::pin();
        assert_eq!(*obj.header().payload(&guard), 12);
    }

    #[test]
    fn test_freed_object_written_back_without_lock() {
        let rlu = domain();
        let obj = rlu.alloc(1).unwrap();
        let mut writer = rlu.register_thread().unwrap();

        writer
            .write(|txn| {
                *txn.try_lock(&obj)? = 3;
                txn.free(&obj)
            })
            .unwrap();

        assert_eq!(obj.header().lock_state(), LockState::Freed);
        assert_eq!(writer.reclaim().written_back, 1);
        let guard = epoch::pin();
        assert_eq!(*obj.header().payload(&guard), 3);
    }
}
