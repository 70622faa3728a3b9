//! Synthetic Address Space
//!
//! Every managed payload is named by a 64-bit address. The space is split
//! into two disjoint regions:
//!
//! ```text
//! 0x0000_0000_0000_0000  NULL
//! 0x0000_0000_0001_0000  ┌──────────────────────────────┐
//!                        │ actual objects (bump)        │
//! 0x0000_0100_0000_0000  ├──────────────────────────────┤  LOG_SPACE_BASE
//!                        │ slot 0 log window (4GB)      │
//!                        ├──────────────────────────────┤
//!                        │ slot 1 log window (4GB)      │
//!                        │ ...                          │
//!                        └──────────────────────────────┘
//! ```
//!
//! Within a window only `[start, start + capacity * stride)` is the log
//! proper; the window index of any address is a shift away, which keeps
//! classification O(1).

use crate::util::format_address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First address handed to an actual object
pub const ACTUAL_SPACE_BASE: u64 = 0x1_0000;

/// First address of the log region
pub const LOG_SPACE_BASE: u64 = 1 << 40;

/// Address span reserved per registry slot
pub const LOG_WINDOW_SHIFT: u32 = 32;
pub const LOG_WINDOW_SPAN: u64 = 1 << LOG_WINDOW_SHIFT;

/// Address of a managed payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address {
    /// The null address; no payload ever lives here
    pub const NULL: Address = Address(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` below this one, or `None` on underflow
    #[inline]
    pub fn checked_sub(self, bytes: usize) -> Option<Address> {
        self.0.checked_sub(bytes as u64).map(Address)
    }

    #[inline]
    pub fn add(self, bytes: usize) -> Address {
        Address(self.0 + bytes as u64)
    }

    /// Registry slot whose log window contains this address
    ///
    /// Returns `None` for addresses in the actual region.
    #[inline]
    pub fn log_window(self) -> Option<usize> {
        if self.0 < LOG_SPACE_BASE {
            return None;
        }
        Some(((self.0 - LOG_SPACE_BASE) >> LOG_WINDOW_SHIFT) as usize)
    }

    /// Start of the log window owned by registry slot `slot`
    #[inline]
    pub fn window_start(slot: usize) -> Address {
        Address(LOG_SPACE_BASE + ((slot as u64) << LOG_WINDOW_SHIFT))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", format_address(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_address(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_address() {
        assert!(Address::NULL.is_null());
        assert!(!Address::new(ACTUAL_SPACE_BASE).is_null());
        assert_eq!(Address::default(), Address::NULL);
    }

    #[test]
    fn test_log_window_arithmetic() {
        assert_eq!(Address::new(ACTUAL_SPACE_BASE).log_window(), None);
        assert_eq!(Address::new(LOG_SPACE_BASE - 1).log_window(), None);
        assert_eq!(Address::new(LOG_SPACE_BASE).log_window(), Some(0));

        let start = Address::window_start(3);
        assert_eq!(start.log_window(), Some(3));
        assert_eq!(start.add(LOG_WINDOW_SPAN as usize - 1).log_window(), Some(3));
        assert_eq!(start.add(LOG_WINDOW_SPAN as usize).log_window(), Some(4));
    }

    #[test]
    fn test_checked_sub() {
        assert_eq!(Address::new(64).checked_sub(32), Some(Address::new(32)));
        assert_eq!(Address::new(16).checked_sub(32), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new(0x10).to_string(), "0x0000000000000010");
        assert_eq!(
            serde_json::to_string(&Address::new(42)).unwrap(),
            "42"
        );
    }
}
