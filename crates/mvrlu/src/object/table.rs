//! Actual Header Table
//!
//! Bump-assigns actual addresses and keeps a side index from payload
//! address to header, used by introspection only. The read and write paths
//! reach headers through `Obj` handles and never consult the table.

use crate::error::{MvrluError, Result};
use crate::object::{ActualHeader, Address, HeaderKind, Obj, ObjectHeader};
use crate::object::{ACTUAL_SPACE_BASE, LOG_SPACE_BASE};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

const MIN_PRUNE_THRESHOLD: usize = 1024;

struct TableInner<T> {
    entries: IndexMap<Address, Weak<ActualHeader<T>>>,
    prune_at: usize,
}

pub(crate) struct HeaderTable<T> {
    next: AtomicU64,
    stride: u64,
    inner: RwLock<TableInner<T>>,
}

impl<T> HeaderTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(ACTUAL_SPACE_BASE),
            stride: ObjectHeader::of::<T>().record_size(HeaderKind::Actual) as u64,
            inner: RwLock::new(TableInner {
                entries: IndexMap::new(),
                prune_at: MIN_PRUNE_THRESHOLD,
            }),
        }
    }

    /// Assign an address to `value` and register its header
    pub(crate) fn allocate(&self, value: T) -> Result<Obj<T>> {
        let header_address = self.next.fetch_add(self.stride, Ordering::Relaxed);
        if header_address + self.stride > LOG_SPACE_BASE {
            return Err(MvrluError::ResourceExhausted {
                resource: "actual object address space".to_string(),
            });
        }

        let address = Address::new(header_address).add(HeaderKind::Actual.header_size());
        let header = Arc::new(ActualHeader::new(address, value));

        let mut inner = self.inner.write();
        if inner.entries.len() >= inner.prune_at {
            inner.entries.retain(|_, header| header.strong_count() > 0);
            inner.prune_at = (inner.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }
        inner.entries.insert(address, Arc::downgrade(&header));

        Ok(Obj::from_header(header))
    }

    pub(crate) fn lookup(&self, address: Address) -> Option<Arc<ActualHeader<T>>> {
        self.inner
            .read()
            .entries
            .get(&address)
            .and_then(Weak::upgrade)
    }

    /// Live headers in allocation order
    pub(crate) fn live(&self) -> Vec<Arc<ActualHeader<T>>> {
        self.inner
            .read()
            .entries
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ACTUAL_HEADER_SIZE;

    #[test]
    fn test_bump_assignment() {
        let table = HeaderTable::<u64>::new();
        let a = table.allocate(1).unwrap();
        let b = table.allocate(2).unwrap();

        assert_eq!(a.address().raw(), ACTUAL_SPACE_BASE + ACTUAL_HEADER_SIZE as u64);
        assert_eq!(b.address().raw() - a.address().raw(), 40);
        assert!(b.address().raw() < LOG_SPACE_BASE);
    }

    #[test]
    fn test_lookup_follows_liveness() {
        let table = HeaderTable::<u64>::new();
        let obj = table.allocate(9).unwrap();
        let address = obj.address();

        assert!(table.lookup(address).is_some());
        assert!(table.lookup(address.add(8)).is_none());

        drop(obj);
        assert!(table.lookup(address).is_none());
        assert!(table.live().is_empty());
    }

    #[test]
    fn test_prune_keeps_live_entries() {
        let table = HeaderTable::<u32>::new();
        let keep: Vec<_> = (0..10).map(|i| table.allocate(i).unwrap()).collect();
        for i in 0..(MIN_PRUNE_THRESHOLD as u32 * 2) {
            let _ = table.allocate(i).unwrap();
        }

        let live = table.live();
        assert_eq!(live.len(), keep.len());
        assert!(table.inner.read().entries.len() < MIN_PRUNE_THRESHOLD * 2);
    }
}
