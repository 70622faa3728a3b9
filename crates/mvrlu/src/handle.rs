//! Thread Handle
//!
//! A `ThreadHandle` is a thread's membership in a domain: its registry
//! slot, its published snapshot and its log. Handles are `!Send`; each
//! worker registers its own.

use crate::domain::{Mvrlu, Versioned};
use crate::error::{MvrluError, Result};
use crate::log::Log;
use crate::logging::RluEvent;
use crate::object::{Address, HeaderKind};
use crate::reader::ReadSection;
use crate::reclaim::{ReclaimReport, Reclaimer};
use crate::registry::{ThreadId, ThreadRegistry, ThreadSlot};
use crate::writer::Transaction;
use crossbeam::utils::Backoff;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-thread access point to a domain
///
/// Dropping the handle flushes its log (blocking until every copy it
/// committed has been written back) and releases its registry slot.
pub struct ThreadHandle<T: Versioned> {
    pub(crate) rlu: Arc<Mvrlu<T>>,
    pub(crate) index: usize,
    pub(crate) id: ThreadId,
    pub(crate) log: Arc<Log<T>>,
    /// Open read sections, transactions included
    pub(crate) depth: Cell<usize>,
    /// Snapshot of the outermost open section
    pub(crate) snapshot: Cell<u64>,
    _not_send: PhantomData<*const ()>,
}

impl<T: Versioned> ThreadHandle<T> {
    pub(crate) fn register(rlu: Arc<Mvrlu<T>>) -> Result<Self> {
        let (index, log) = rlu.registry.register()?;
        let id = ThreadRegistry::<T>::thread_id(index);

        log::debug!("thread {} registered in slot {}", id, index);
        rlu.logger.log(RluEvent::ThreadRegistered {
            thread: id,
            log_capacity: log.capacity(),
        });

        Ok(Self {
            rlu,
            index,
            id,
            log,
            depth: Cell::new(0),
            snapshot: Cell::new(0),
            _not_send: PhantomData,
        })
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn domain(&self) -> &Arc<Mvrlu<T>> {
        &self.rlu
    }

    #[inline]
    pub fn log(&self) -> &Log<T> {
        &self.log
    }

    #[inline]
    pub(crate) fn slot(&self) -> &ThreadSlot<T> {
        self.rlu.registry.slot(self.index)
    }

    /// Classify `address` against this thread's own log
    #[inline]
    pub fn classify(&self, address: Address) -> HeaderKind {
        if self.log.contains(address) {
            HeaderKind::Copy
        } else {
            HeaderKind::Actual
        }
    }

    // === Sections ===

    /// Enter a read section
    ///
    /// Nested sections share the snapshot of the outermost one.
    pub fn begin_read(&self) -> ReadSection<'_, T> {
        ReadSection::begin(self)
    }

    /// Run `body` inside a read section
    pub fn read<R, F>(&self, body: F) -> R
    where
        F: FnOnce(&ReadSection<'_, T>) -> R,
    {
        let section = self.begin_read();
        body(&section)
    }

    /// Start a writer transaction
    ///
    /// The transaction aborts when dropped without `commit`.
    pub fn begin_write(&mut self) -> Transaction<'_, T> {
        Transaction::begin(self)
    }

    /// Run `body` as a transaction, retrying on lock conflicts
    ///
    /// Each attempt starts from a fresh snapshot; `body` must therefore be
    /// restartable. Returning `MvrluError::Cancelled` (or any other
    /// non-retryable error) aborts and passes the error through.
    ///
    /// # Errors
    ///
    /// - `Contention` after `max_retries` conflicting attempts
    /// - `ResourceExhausted` if the log cannot hold the working set
    pub fn write<R, F>(&mut self, mut body: F) -> Result<R>
    where
        F: FnMut(&mut Transaction<'_, T>) -> Result<R>,
    {
        let max_retries = self.rlu.config.max_retries;
        let backoff = Backoff::new();

        for attempt in 1..=max_retries {
            let mut txn = self.begin_write();
            match body(&mut txn) {
                Ok(value) => {
                    txn.commit();
                    return Ok(value);
                },
                Err(err) if err.is_retryable() => {
                    txn.abort_attempt(attempt);
                    self.reclaim();
                },
                Err(err) => {
                    txn.abort();
                    return Err(err);
                },
            }
            backoff.snooze();
        }

        log::warn!(
            "thread {} gave up after {} conflicting attempts",
            self.id,
            max_retries
        );
        self.rlu.stats.record_contention_failure();
        self.rlu.logger.log(RluEvent::ContentionExhausted {
            thread: self.id,
            attempts: max_retries,
        });
        Err(MvrluError::Contention {
            attempts: max_retries,
        })
    }

    // === Reclamation ===

    /// Write back and release every copy no snapshot can still observe
    pub fn reclaim(&self) -> ReclaimReport {
        let report = Reclaimer::new(&self.rlu, &self.log, self.id).run();

        if report.released > 0 {
            self.rlu.stats.record_reclaim(report.written_back);
            self.rlu.logger.log(RluEvent::Reclaim {
                thread: self.id,
                written_back: report.written_back,
                remaining: report.remaining,
                global_min: report.global_min,
            });
        }
        report
    }

    /// Block until the log is empty
    ///
    /// Waits for every reader whose snapshot predates one of this thread's
    /// commits. Must not be called while this thread has a section open.
    pub fn flush_log(&self) {
        debug_assert_eq!(self.depth.get(), 0, "flush_log inside a read section");

        let backoff = Backoff::new();
        let mut warned = false;
        while !self.log.is_empty() {
            if self.reclaim().released > 0 {
                continue;
            }
            if backoff.is_completed() && !warned {
                log::warn!(
                    "thread {} waiting for quiescence to flush {} records",
                    self.id,
                    self.log.len()
                );
                warned = true;
            }
            backoff.snooze();
        }
    }
}

impl<T: Versioned> Drop for ThreadHandle<T> {
    fn drop(&mut self) {
        self.flush_log();
        self.rlu.registry.deregister(self.index);

        log::debug!("thread {} deregistered", self.id);
        self.rlu
            .logger
            .log(RluEvent::ThreadDeregistered { thread: self.id });
    }
}
