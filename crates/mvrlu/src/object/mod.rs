//! Object Module - Versioned object model
//!
//! Every managed object has one `ActualHeader` (its home location) and at
//! most one pending `CopyHeader` in some writer's log. Callers hold objects
//! through `Obj<T>` handles and read them only through a read section or a
//! transaction.

pub mod address;
pub mod header;
pub mod table;

pub use address::{Address, ACTUAL_SPACE_BASE, LOG_SPACE_BASE, LOG_WINDOW_SPAN};
pub use header::{
    ActualHeader, CopyHeader, CopyState, HeaderKind, LockState, ObjectHeader,
    ACTUAL_HEADER_SIZE, COPY_HEADER_SIZE, OBJECT_ALIGNMENT,
};
pub(crate) use table::HeaderTable;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Shared handle to a managed object
///
/// Cloning the handle does not clone the object. Two handles are equal when
/// they name the same actual header.
pub struct Obj<T>(Arc<ActualHeader<T>>);

impl<T> Obj<T> {
    pub(crate) fn from_header(header: Arc<ActualHeader<T>>) -> Self {
        Self(header)
    }

    /// Payload address of the actual object
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Obj<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub fn header(&self) -> &ActualHeader<T> {
        &self.0
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<ActualHeader<T>> {
        Arc::downgrade(&self.0)
    }
}

impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Obj<T> {}

impl<T> Hash for Obj<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Obj").field(&self.address()).finish()
    }
}
