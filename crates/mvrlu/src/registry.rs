//! Thread Registry
//!
//! Fixed table of thread slots owned by an `Mvrlu` domain. A slot is claimed
//! by `register_thread` and released when its `ThreadHandle` is dropped.
//! Each slot carries:
//!
//! - the thread's published snapshot (`INACTIVE` outside read sections),
//!   scanned by every reclaimer to compute the global minimum
//! - the fixed log window `[start, end)` that classifies copy addresses
//! - a handle on the thread's log, used by introspection only

use crate::clock::INACTIVE;
use crate::error::{MvrluError, Result};
use crate::log::Log;
use crate::object::{Address, HeaderKind};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Writer identity stored in lock words; never zero
pub type ThreadId = u64;

/// One registry entry
pub struct ThreadSlot<T> {
    active: AtomicBool,
    snapshot: AtomicU64,
    log: RwLock<Option<Arc<Log<T>>>>,
}

impl<T> ThreadSlot<T> {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            snapshot: AtomicU64::new(INACTIVE),
            log: RwLock::new(None),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Published snapshot cell
    #[inline]
    pub fn snapshot(&self) -> &AtomicU64 {
        &self.snapshot
    }
}

/// Registry of all threads participating in a domain
pub struct ThreadRegistry<T> {
    slots: Box<[ThreadSlot<T>]>,
    log_capacity: usize,
    /// Byte length of the used part of every log window
    log_extent: u64,
}

impl<T> ThreadRegistry<T> {
    pub fn new(max_threads: usize, log_capacity: usize) -> Self {
        Self {
            slots: (0..max_threads).map(|_| ThreadSlot::new()).collect(),
            log_capacity,
            log_extent: (log_capacity * Log::<T>::record_stride()) as u64,
        }
    }

    #[inline]
    pub fn thread_id(index: usize) -> ThreadId {
        index as ThreadId + 1
    }

    // === Lifecycle ===

    /// Claim a free slot and create its log
    pub fn register(&self) -> Result<(usize, Arc<Log<T>>)> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let log = Arc::new(Log::new(
                Self::thread_id(index),
                Address::window_start(index),
                self.log_capacity,
            ));
            slot.snapshot.store(INACTIVE, Ordering::SeqCst);
            *slot.log.write() = Some(Arc::clone(&log));
            return Ok((index, log));
        }

        Err(MvrluError::TooManyThreads {
            max: self.slots.len(),
        })
    }

    /// Release a slot; its log must already be flushed
    pub fn deregister(&self, index: usize) {
        let slot = &self.slots[index];
        slot.snapshot.store(INACTIVE, Ordering::SeqCst);
        *slot.log.write() = None;
        slot.active.store(false, Ordering::Release);
    }

    // === Queries ===

    #[inline]
    pub fn slot(&self, index: usize) -> &ThreadSlot<T> {
        &self.slots[index]
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_active()).count()
    }

    /// Minimum over every published snapshot, `INACTIVE` if none
    pub fn min_snapshot(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.snapshot.load(Ordering::SeqCst))
            .min()
            .unwrap_or(INACTIVE)
    }

    /// `Copy` iff `address` lies in the used part of a registered window
    #[inline]
    pub fn classify(&self, address: Address) -> HeaderKind {
        match address.log_window() {
            Some(index) if index < self.slots.len() && self.slots[index].is_active() => {
                let start = Address::window_start(index).raw();
                if address.raw() < start + self.log_extent {
                    HeaderKind::Copy
                } else {
                    HeaderKind::Actual
                }
            },
            _ => HeaderKind::Actual,
        }
    }

    pub fn log_of(&self, index: usize) -> Option<Arc<Log<T>>> {
        self.slots.get(index)?.log.read().clone()
    }

    /// Logs of every registered thread
    pub fn logs(&self) -> Vec<Arc<Log<T>>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.log.read().clone())
            .collect()
    }
}
