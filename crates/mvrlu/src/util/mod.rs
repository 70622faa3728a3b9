//! Util Module - Shared Utilities
//!
//! Utilities and helper functions used throughout the engine.

pub mod alignment;
pub mod debug;

pub use alignment::Alignment;
pub use debug::format_address;
