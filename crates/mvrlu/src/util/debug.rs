//! Debug Utilities
//!
//! Helper functions for debugging and logging.

/// Debug formatter for synthetic addresses
pub fn format_address(address: u64) -> String {
    format!("0x{:016X}", address)
}
