//! Alignment Utilities
//!
//! Helper functions for laying out headers and payloads in the synthetic
//! address space.

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// # Examples
    /// ```
    /// use mvrlu::util::Alignment;
    ///
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// ```
    pub fn align_up(value: usize, alignment: usize) -> usize {
        (value + alignment - 1) & !(alignment - 1)
    }

    /// Check if value is aligned
    pub fn is_aligned(value: u64, alignment: usize) -> bool {
        value & (alignment as u64 - 1) == 0
    }

    /// Get alignment padding needed
    pub fn padding(value: usize, alignment: usize) -> usize {
        Self::align_up(value, alignment) - value
    }

    /// Default object alignment (8 bytes)
    pub const DEFAULT: usize = 8;
}
