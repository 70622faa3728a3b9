//! Writer Transaction
//!
//! State machine:
//!
//! ```text
//!   Idle ──begin──▶ Running ──try_lock/lock_const──▶ Locking ──commit──▶ Committing ──▶ Done
//!                                                       │
//!                                                       └──conflict/abort──▶ Aborted ──▶ Idle
//! ```
//!
//! `try_lock` takes the object's lock word, copies the actual payload into
//! the thread's log and publishes the (still pending) copy through the
//! actual's copy pointer. `commit` reserves one clock, stamps it into every
//! copy of the chain and publishes it, so all copies of the transaction
//! become visible to new snapshots at the same instant.
//!
//! Every lock is released on every exit path: commit, explicit abort, or
//! drop of an unfinished transaction.

use crate::domain::Versioned;
use crate::error::{MvrluError, Result};
use crate::handle::ThreadHandle;
use crate::logging::RluEvent;
use crate::object::{Address, CopyHeader, CopyState, HeaderKind, LockState, Obj};
use crate::reader::{ReadSection, VersionedRead};
use crate::reclaim::{self, WriteBack};
use crate::stats::Timer;
use crossbeam::epoch::Owned;
use crossbeam::utils::Backoff;

/// Transaction lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Running,
    Locking,
    Committing,
    Done,
    Aborted,
}

struct ChainEntry<T> {
    obj: Obj<T>,
    copy: *const CopyHeader<T>,
}

/// An open writer transaction
pub struct Transaction<'h, T: Versioned> {
    handle: &'h ThreadHandle<T>,
    section: ReadSection<'h, T>,
    state: TxnState,
    /// Copies created by this transaction, oldest first
    chain: Vec<ChainEntry<T>>,
    /// Locks held, in acquisition order
    locks: Vec<Obj<T>>,
    /// Objects to retire at commit
    retired: Vec<Obj<T>>,
    timer: Timer,
}

impl<'h, T: Versioned> Transaction<'h, T> {
    pub(crate) fn begin(handle: &'h mut ThreadHandle<T>) -> Self {
        let handle: &'h ThreadHandle<T> = handle;
        debug_assert_eq!(handle.depth.get(), 0, "transaction inside a read section");

        Self {
            handle,
            section: ReadSection::begin(handle),
            state: TxnState::Running,
            chain: Vec::new(),
            locks: Vec::new(),
            retired: Vec::new(),
            timer: Timer::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> TxnState {
        self.state
    }

    #[inline]
    pub fn snapshot(&self) -> u64 {
        self.section.snapshot()
    }

    /// Number of copies created so far
    #[inline]
    pub fn copies(&self) -> usize {
        self.chain.len()
    }

    fn expect_open(&self) -> Result<()> {
        match self.state {
            TxnState::Running | TxnState::Locking => Ok(()),
            state => Err(MvrluError::InvalidState {
                expected: "Running or Locking".to_string(),
                actual: format!("{:?}", state),
            }),
        }
    }

    // === Reads ===

    /// The version of `obj` visible to this transaction
    ///
    /// Objects this transaction has copied read from the copy.
    pub fn deref<'t>(&'t self, obj: &Obj<T>) -> &'t T {
        let copy = obj.header().copy(self.section.guard());
        // SAFETY: pinned by the section guard.
        if let Some(copy) = unsafe { copy.as_ref() } {
            if copy.owner_thread() == self.handle.id && copy.state() == CopyState::Pending {
                // SAFETY: the pending copy is ours and `&self` excludes any
                // live `&mut` obtained from `try_lock`.
                return unsafe { copy.payload() };
            }
        }
        self.section.deref(obj)
    }

    /// Allocate a new object, private until linked by this transaction
    pub fn alloc(&self, value: T) -> Result<Obj<T>> {
        self.handle.rlu.alloc(value)
    }

    // === Locks ===

    /// Lock `obj` for modification and return its copy
    ///
    /// # Errors
    ///
    /// `LockConflict` if another writer holds the lock, the object is
    /// retired, or a previous version is still waiting for quiescence.
    /// The caller must abort; `ThreadHandle::write` retries automatically.
    pub fn try_lock(&mut self, obj: &Obj<T>) -> Result<&mut T> {
        self.expect_open()?;
        self.state = TxnState::Locking;

        let id = self.handle.id;
        let actual = obj.header();

        if actual.lock_state() == LockState::Owned(id) {
            let copy = actual.copy(self.section.guard());
            // SAFETY: pinned by the section guard.
            if let Some(copy) = unsafe { copy.as_ref() } {
                if copy.owner_thread() == id && copy.state() == CopyState::Pending {
                    let copy: *const CopyHeader<T> = copy;
                    // SAFETY: pending copy owned by this transaction; the
                    // returned borrow is tied to `&mut self`.
                    return Ok(unsafe { (*copy).payload_mut() });
                }
            }
        } else {
            self.acquire(obj)?;
        }

        self.settle_previous_version(obj)?;
        let copy = self.create_copy(obj)?;
        // SAFETY: as above.
        Ok(unsafe { (*copy).payload_mut() })
    }

    /// Lock `obj` without copying it
    ///
    /// Keeps other writers from modifying or retiring the object until this
    /// transaction ends. Fails like `try_lock`, so a successful `lock_const`
    /// also guarantees that `deref` returns the latest committed version.
    pub fn lock_const(&mut self, obj: &Obj<T>) -> Result<()> {
        self.expect_open()?;
        self.state = TxnState::Locking;

        if obj.header().lock_state() == LockState::Owned(self.handle.id) {
            return Ok(());
        }
        self.acquire(obj)?;
        self.settle_previous_version(obj)
    }

    /// Retire `obj` at commit
    ///
    /// The object must be locked by this transaction. After commit every
    /// `try_lock` on it fails; readers with older snapshots can still reach
    /// and read it.
    pub fn free(&mut self, obj: &Obj<T>) -> Result<()> {
        self.expect_open()?;

        let state = obj.header().lock_state();
        if state != LockState::Owned(self.handle.id) {
            return Err(MvrluError::InvalidState {
                expected: format!("object {} locked by thread {}", obj.address(), self.handle.id),
                actual: format!("{:?}", state),
            });
        }
        if !self.retired.iter().any(|o| o.ptr_eq(obj)) {
            self.retired.push(obj.clone());
        }
        Ok(())
    }

    fn acquire(&mut self, obj: &Obj<T>) -> Result<()> {
        if !obj.header().try_acquire(self.handle.id) {
            return Err(MvrluError::LockConflict {
                address: obj.address(),
            });
        }
        self.locks.push(obj.clone());
        Ok(())
    }

    /// With the lock held, make sure no older copy is still pending
    ///
    /// A committed copy that every snapshot already sees is written back on
    /// the spot, so an idle owner never blocks writers.
    fn settle_previous_version(&self, obj: &Obj<T>) -> Result<()> {
        let guard = self.section.guard();
        let record = obj.header().copy(guard);
        // SAFETY: pinned by the section guard.
        let Some(copy) = (unsafe { record.as_ref() }) else {
            return Ok(());
        };

        let global_min = self.handle.rlu.registry.min_snapshot();
        match copy.state() {
            CopyState::Committed(clock) if clock <= global_min => {
                match reclaim::write_back(copy, record, self.handle.id, guard) {
                    WriteBack::Installed | WriteBack::Skipped => Ok(()),
                    WriteBack::Blocked => Err(MvrluError::Internal(format!(
                        "write-back of {} blocked while holding its lock",
                        obj.address()
                    ))),
                }
            },
            _ => Err(MvrluError::LockConflict {
                address: obj.address(),
            }),
        }
    }

    fn create_copy(&mut self, obj: &Obj<T>) -> Result<*const CopyHeader<T>> {
        self.reserve_log_space()?;

        let rlu = &self.handle.rlu;
        let log = &self.handle.log;
        let guard = self.section.guard();

        let value = obj.header().payload(guard).clone();
        let next_in_chain = self
            .chain
            .last()
            // SAFETY: chain records stay in the log until this transaction ends.
            .map(|entry| unsafe { (*entry.copy).address() })
            .unwrap_or(Address::NULL);

        let address = log.next_address();
        debug_assert_eq!(rlu.registry.classify(address), HeaderKind::Copy);
        let record = Owned::new(CopyHeader::new(
            address,
            value,
            self.section.snapshot(),
            next_in_chain,
            obj.downgrade(),
            obj.address(),
            self.handle.id,
        ));
        let shared = log.push(record, guard);
        obj.header().install_copy(shared);
        rlu.stats.record_copy();

        let copy = shared.as_raw();
        self.chain.push(ChainEntry {
            obj: obj.clone(),
            copy,
        });
        Ok(copy)
    }

    /// Wait for a free log record, reclaiming the own log meanwhile
    fn reserve_log_space(&self) -> Result<()> {
        let log = &self.handle.log;
        if !log.is_full() {
            return Ok(());
        }

        let rlu = &self.handle.rlu;
        rlu.logger.log(RluEvent::LogFull {
            thread: self.handle.id,
            capacity: log.capacity(),
        });

        let backoff = Backoff::new();
        for _ in 0..=rlu.config.log_full_retries {
            // The oldest record belongs to this very transaction: waiting
            // cannot free anything.
            let own_open = log
                .oldest(self.section.guard())
                // SAFETY: pinned by the section guard.
                .map(|record| unsafe { record.deref() }.state() == CopyState::Pending)
                .unwrap_or(false);
            if own_open {
                break;
            }

            self.handle.reclaim();
            if !log.is_full() {
                return Ok(());
            }
            rlu.stats.record_log_full_wait();
            backoff.snooze();
        }

        log::error!(
            "thread {} log exhausted: {} records cannot hold the working set",
            self.handle.id,
            log.capacity()
        );
        rlu.logger.log(RluEvent::LogExhausted {
            thread: self.handle.id,
            capacity: log.capacity(),
        });
        Err(MvrluError::ResourceExhausted {
            resource: format!(
                "log of thread {} ({} records)",
                self.handle.id,
                log.capacity()
            ),
        })
    }

    // === Completion ===

    /// Commit and return the commit clock
    ///
    /// A transaction that neither copied nor retired anything does not
    /// advance the clock and returns its snapshot.
    pub fn commit(mut self) -> u64 {
        self.state = TxnState::Committing;

        let rlu = &self.handle.rlu;
        let id = self.handle.id;

        let clock = if self.chain.is_empty() && self.retired.is_empty() {
            self.section.snapshot()
        } else {
            let clock = rlu.clock.advance_global();
            for entry in &self.chain {
                // SAFETY: chain records stay in the log until this
                // transaction ends.
                unsafe { (*entry.copy).commit(clock) };
            }
            rlu.clock.publish(clock);
            clock
        };

        for obj in self.locks.drain(..) {
            if self.retired.iter().any(|r| r.ptr_eq(&obj)) {
                obj.header().retire(id);
            } else {
                obj.header().release(id);
            }
        }

        rlu.stats.record_commit(self.timer.elapsed_ns());
        rlu.logger.log(RluEvent::Commit {
            thread: id,
            clock,
            copies: self.chain.len(),
        });

        self.chain.clear();
        self.retired.clear();
        self.state = TxnState::Done;
        clock
    }

    /// Abort voluntarily
    pub fn abort(mut self) {
        self.rollback();
    }

    /// Abort after a lock conflict in attempt `attempt`
    pub(crate) fn abort_attempt(mut self, attempt: usize) {
        let copies = self.chain.len();
        self.rollback();
        log::debug!("thread {} aborted attempt {}", self.handle.id, attempt);
        self.handle.rlu.logger.log(RluEvent::Abort {
            thread: self.handle.id,
            attempt,
            copies,
        });
    }

    fn rollback(&mut self) {
        let guard = self.section.guard();
        let id = self.handle.id;
        let discarded = self.chain.len();

        for entry in self.chain.drain(..).rev() {
            // SAFETY: the record is still in the log.
            let copy = unsafe { &*entry.copy };
            copy.mark_aborted();
            let record = entry.obj.header().copy(guard);
            if record.as_raw() == entry.copy {
                entry.obj.header().clear_copy(record, guard);
            }
            self.handle.log.pop_newest(guard);
        }

        for obj in self.locks.drain(..).rev() {
            obj.header().release(id);
        }

        self.retired.clear();
        self.state = TxnState::Aborted;
        self.handle.rlu.stats.record_abort(discarded);
    }
}

impl<T: Versioned> VersionedRead<T> for Transaction<'_, T> {
    #[inline]
    fn read<'a>(&'a self, obj: &Obj<T>) -> &'a T {
        self.deref(obj)
    }

    #[inline]
    fn snapshot(&self) -> u64 {
        self.section.snapshot()
    }
}

impl<T: Versioned> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if !matches!(self.state, TxnState::Done | TxnState::Aborted) {
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MvrluConfig;
    use crate::Mvrlu;

    fn domain(log_capacity: usize) -> std::sync::Arc<Mvrlu<u64>> {
        Mvrlu::new(MvrluConfig {
            max_threads: 4,
            log_capacity,
            max_retries: 4,
            log_full_retries: 8,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_state_machine() {
        let rlu = domain(8);
        let obj = rlu.alloc(0).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        assert_eq!(txn.state(), TxnState::Running);
        txn.try_lock(&obj).unwrap();
        assert_eq!(txn.state(), TxnState::Locking);
        assert_eq!(txn.commit(), 1);
    }

    #[test]
    fn test_relock_returns_same_copy() {
        let rlu = domain(8);
        let obj = rlu.alloc(0).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        *txn.try_lock(&obj).unwrap() = 1;
        *txn.try_lock(&obj).unwrap() += 1;
        assert_eq!(txn.copies(), 1);
        assert_eq!(*txn.deref(&obj), 2);
        txn.commit();

        assert_eq!(thread.read(|s| *s.deref(&obj)), 2);
    }

    #[test]
    fn test_lock_const_then_upgrade() {
        let rlu = domain(8);
        let obj = rlu.alloc(3).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        txn.lock_const(&obj).unwrap();
        assert_eq!(txn.copies(), 0);
        *txn.try_lock(&obj).unwrap() = 4;
        assert_eq!(txn.copies(), 1);
        txn.commit();

        assert_eq!(obj.header().lock_state(), LockState::Unlocked);
        assert_eq!(thread.read(|s| *s.deref(&obj)), 4);
    }

    #[test]
    fn test_conflict_on_held_lock() {
        let rlu = domain(8);
        let obj = rlu.alloc(0).unwrap();
        let mut a = rlu.register_thread().unwrap();
        let mut b = rlu.register_thread().unwrap();

        let mut first = a.begin_write();
        first.try_lock(&obj).unwrap();

        let mut second = b.begin_write();
        assert!(matches!(
            second.try_lock(&obj),
            Err(MvrluError::LockConflict { .. })
        ));
        assert!(second.lock_const(&obj).is_err());
        second.abort();

        first.commit();
    }

    #[test]
    fn test_abort_rolls_back_everything() {
        let rlu = domain(8);
        let x = rlu.alloc(1).unwrap();
        let y = rlu.alloc(2).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        *txn.try_lock(&x).unwrap() = 10;
        *txn.try_lock(&y).unwrap() = 20;
        txn.abort();

        let guard = crossbeam::epoch::pin();
        assert!(x.header().copy(&guard).is_null());
        assert!(y.header().copy(&guard).is_null());
        assert_eq!(x.header().lock_state(), LockState::Unlocked);
        assert_eq!(y.header().lock_state(), LockState::Unlocked);
        assert!(thread.log().is_empty());
        assert_eq!(thread.read(|s| (*s.deref(&x), *s.deref(&y))), (1, 2));
    }

    #[test]
    fn test_drop_aborts() {
        let rlu = domain(8);
        let obj = rlu.alloc(1).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        {
            let mut txn = thread.begin_write();
            *txn.try_lock(&obj).unwrap() = 5;
        }

        assert_eq!(obj.header().lock_state(), LockState::Unlocked);
        assert_eq!(thread.read(|s| *s.deref(&obj)), 1);
        assert_eq!(rlu.clock().current(), 0);
    }

    #[test]
    fn test_free_retires_object() {
        let rlu = domain(8);
        let obj = rlu.alloc(1).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        assert!(matches!(
            txn.free(&obj),
            Err(MvrluError::InvalidState { .. })
        ));
        txn.lock_const(&obj).unwrap();
        txn.free(&obj).unwrap();
        assert_eq!(txn.commit(), 1);

        assert_eq!(obj.header().lock_state(), LockState::Freed);
        let result = thread.write(|t| {
            t.try_lock(&obj)?;
            Ok(())
        });
        assert!(matches!(result, Err(MvrluError::Contention { .. })));
    }

    #[test]
    fn test_chain_links_previous_copy() {
        let rlu = domain(8);
        let x = rlu.alloc(1).unwrap();
        let y = rlu.alloc(2).unwrap();
        let mut thread = rlu.register_thread().unwrap();

        let mut txn = thread.begin_write();
        txn.try_lock(&x).unwrap();
        txn.try_lock(&y).unwrap();

        let guard = crossbeam::epoch::pin();
        let first = unsafe { x.header().copy(&guard).deref() };
        let second = unsafe { y.header().copy(&guard).deref() };
        assert!(first.next_in_chain().is_null());
        assert_eq!(second.next_in_chain(), first.address());
        assert_eq!(second.owner_address(), y.address());
        drop(guard);

        txn.commit();
    }

    #[test]
    fn test_log_exhausted_by_own_transaction() {
        let rlu = domain(2);
        let objs: Vec<_> = (0..3).map(|i| rlu.alloc(i).unwrap()).collect();
        let mut thread = rlu.register_thread().unwrap();

        let result = thread.write(|txn| {
            for obj in &objs {
                *txn.try_lock(obj)? += 1;
            }
            Ok(())
        });

        assert!(matches!(result, Err(MvrluError::ResourceExhausted { .. })));
        assert!(thread.log().is_empty());
        for obj in &objs {
            assert_eq!(obj.header().lock_state(), LockState::Unlocked);
        }
    }
}
