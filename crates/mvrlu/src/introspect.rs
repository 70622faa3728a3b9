//! Introspection
//!
//! Read-only views of the engine state for debugging and tests:
//! address classification, header resolution and a serializable dump of
//! the clock, every log window and every live actual.

use crate::domain::{Mvrlu, Versioned};
use crate::error::{MvrluError, Result};
use crate::log::Log;
use crate::object::{
    ActualHeader, Address, CopyHeader, CopyState, HeaderKind, LockState, OBJECT_ALIGNMENT,
};
use crate::registry::ThreadId;
use crate::util::Alignment;
use crossbeam::epoch::{self, Guard};
use serde::Serialize;

/// Decoded header of an actual or a copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderView {
    pub kind: HeaderKind,
    /// Payload address
    pub address: Address,
    pub header_address: Address,
    pub obj_size: usize,
    pub padding_size: usize,
    /// Copy currently linked from an actual; null for copies
    pub copy_pointer: Address,

    // Actual only
    pub lock_state: Option<LockState>,

    // Copy only
    pub commit_clock: Option<CopyState>,
    pub creation_clock: Option<u64>,
    pub next_in_chain: Option<Address>,
    pub owner_actual: Option<Address>,
    pub owner_thread: Option<ThreadId>,
}

impl HeaderView {
    fn of_actual<T>(actual: &ActualHeader<T>, guard: &Guard) -> Self {
        let object = actual.object_header();
        Self {
            kind: HeaderKind::Actual,
            address: actual.address(),
            header_address: actual.header_address(),
            obj_size: object.obj_size,
            padding_size: object.padding_size,
            copy_pointer: actual.copy_address(guard),
            lock_state: Some(actual.lock_state()),
            commit_clock: None,
            creation_clock: None,
            next_in_chain: None,
            owner_actual: None,
            owner_thread: None,
        }
    }

    fn of_copy<T>(copy: &CopyHeader<T>) -> Self {
        let object = copy.object_header();
        Self {
            kind: HeaderKind::Copy,
            address: copy.address(),
            header_address: copy.header_address(),
            obj_size: object.obj_size,
            padding_size: object.padding_size,
            copy_pointer: Address::NULL,
            lock_state: None,
            commit_clock: Some(copy.state()),
            creation_clock: Some(copy.creation_clock()),
            next_in_chain: Some(copy.next_in_chain()),
            owner_actual: Some(copy.owner_address()),
            owner_thread: Some(copy.owner_thread()),
        }
    }
}

/// One thread's log window
#[derive(Debug, Clone, Serialize)]
pub struct LogView {
    pub thread: ThreadId,
    pub start: Address,
    pub end: Address,
    pub capacity: usize,
    pub len: usize,
    /// Live records, oldest first
    pub records: Vec<HeaderView>,
}

impl LogView {
    fn of<T>(log: &Log<T>, guard: &Guard) -> Self {
        let records = log
            .records(guard)
            .into_iter()
            // SAFETY: pinned by `guard`.
            .filter_map(|record| unsafe { record.as_ref() })
            .map(HeaderView::of_copy)
            .collect();

        Self {
            thread: log.owner(),
            start: log.start(),
            end: log.end(),
            capacity: log.capacity(),
            len: log.len(),
            records,
        }
    }
}

/// Serializable snapshot of a whole domain
///
/// Taken without stopping writers; concurrent activity can make the parts
/// mutually inconsistent.
#[derive(Debug, Clone, Serialize)]
pub struct DebugDump {
    pub clock: u64,
    pub reserved_clock: u64,
    pub global_min: u64,
    pub logs: Vec<LogView>,
    pub actuals: Vec<HeaderView>,
}

impl DebugDump {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MvrluError::Internal(format!("debug dump serialization: {}", e)))
    }
}

impl<T: Versioned> Mvrlu<T> {
    /// True if `address` lies in the used part of a registered log window
    #[inline]
    pub fn is_log_resident(&self, address: Address) -> bool {
        self.classify(address) == HeaderKind::Copy
    }

    /// Header kind of the payload at `address`, inferred in O(1)
    #[inline]
    pub fn classify(&self, address: Address) -> HeaderKind {
        self.registry.classify(address)
    }

    /// Locate and decode the header whose payload begins at `address`
    ///
    /// # Errors
    ///
    /// - `Misclassified` if the address is unaligned or falls inside a
    ///   log record instead of at its payload start
    /// - `InvalidAddress` if no live header has its payload there
    pub fn resolve_header(&self, address: Address) -> Result<HeaderView> {
        if address.is_null() || !Alignment::is_aligned(address.raw(), OBJECT_ALIGNMENT) {
            return Err(MvrluError::Misclassified {
                address,
                reason: format!("not aligned to {} bytes", OBJECT_ALIGNMENT),
            });
        }

        let guard = epoch::pin();
        match self.classify(address) {
            HeaderKind::Copy => {
                let log = address
                    .log_window()
                    .and_then(|window| self.registry.log_of(window))
                    .ok_or(MvrluError::InvalidAddress { address })?;
                if log.slot_of(address).is_none() {
                    return Err(MvrluError::Misclassified {
                        address,
                        reason: "inside a log record, not at its payload".to_string(),
                    });
                }
                let record = log
                    .record_at(address, &guard)
                    .ok_or(MvrluError::InvalidAddress { address })?;
                // SAFETY: pinned by `guard`.
                let copy = unsafe { record.deref() };
                Ok(HeaderView::of_copy(copy))
            },
            HeaderKind::Actual => {
                let actual = self
                    .headers
                    .lookup(address)
                    .ok_or(MvrluError::InvalidAddress { address })?;
                Ok(HeaderView::of_actual(&actual, &guard))
            },
        }
    }

    /// Serializable snapshot of clock, logs and live actuals
    pub fn dump(&self) -> DebugDump {
        let guard = epoch::pin();

        let logs = self
            .registry
            .logs()
            .iter()
            .map(|log| LogView::of(log, &guard))
            .collect();
        let actuals = self
            .headers
            .live()
            .iter()
            .map(|actual| HeaderView::of_actual(actual, &guard))
            .collect();

        DebugDump {
            clock: self.clock.current(),
            reserved_clock: self.clock.reserved(),
            global_min: self.registry.min_snapshot(),
            logs,
            actuals,
        }
    }
}
