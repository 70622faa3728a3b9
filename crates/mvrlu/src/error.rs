//! Error Module - MV-RLU Error Types
//!
//! Defines all error types used by the engine.
//!
//! # Error Categories
//!
//! ## Contention Errors
//! - `LockConflict` - A single lock attempt lost a race (retried internally)
//! - `Contention` - The retry budget of a write was exhausted
//!
//! ## Resource Errors
//! - `ResourceExhausted` - A thread log is too small for its working set
//! - `TooManyThreads` - Every registry slot is taken
//!
//! ## Invariant Violations
//! - `Misclassified` - An address resolved to the wrong header kind
//! - `InvalidAddress` - An address that names no payload
//! - `InvalidState` - Transaction state machine violation
//! - `Internal` - Anything else that indicates a bug
//!
//! ## Caller Errors
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//! - `Cancelled` - A transaction aborted on request of its own closure

use crate::config::ConfigError;
use crate::object::Address;
use thiserror::Error;

/// Main error type for all MV-RLU operations
///
/// # Examples
///
/// ```rust
/// use mvrlu::MvrluError;
///
/// fn handle_error(err: MvrluError) {
///     match err {
///         MvrluError::Contention { attempts } => {
///             eprintln!("gave up after {} attempts", attempts);
///         }
///         MvrluError::ResourceExhausted { resource } => {
///             eprintln!("exhausted: {}", resource);
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum MvrluError {
    /// Lock acquisition failed
    ///
    /// **When returned:** `try_lock`/`lock_const` found the object owned by
    /// another writer, retired, or still carrying a pending copy
    ///
    /// **Recovery strategy:** Abort the transaction and retry from scratch.
    /// `ThreadHandle::write` does this automatically.
    #[error("Lock conflict on object {address}")]
    LockConflict { address: Address },

    /// Retry budget exhausted
    ///
    /// **When returned:** A write closure kept losing lock races for
    /// `max_retries` attempts
    ///
    /// **Recovery strategy:** Back off at the application level or raise
    /// `max_retries`
    #[error("Transaction gave up after {attempts} attempts under contention")]
    Contention { attempts: usize },

    /// Resource exhausted
    ///
    /// **When returned:** The thread log has no free record and reclamation
    /// cannot free one
    ///
    /// **Recovery strategy:** Raise `log_capacity` above the concurrent-copy
    /// high-water mark of the workload
    ///
    /// **Example scenarios:**
    /// - One transaction locks more objects than the log holds
    /// - A reader never leaves its section while the writer fills its log
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted { resource: String },

    /// No free registry slot
    ///
    /// **When returned:** `register_thread` while `max_threads` handles are live
    ///
    /// **Recovery strategy:** Drop idle handles or raise `max_threads`
    #[error("Thread registry full: at most {max} threads may be registered")]
    TooManyThreads { max: usize },

    /// Header misclassification
    ///
    /// **When returned:** An address resolved to a header of the wrong kind,
    /// or to a header whose payload does not start at that address
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug
    #[error("Header misclassified at {address}: {reason}")]
    Misclassified { address: Address, reason: String },

    /// Address names no managed payload
    ///
    /// **When returned:** Introspection on an address that was never handed
    /// out, or whose object has already been dropped
    ///
    /// **Recovery strategy:** Fix the caller
    #[error("Invalid address: {address}")]
    InvalidAddress { address: Address },

    /// Invalid state
    ///
    /// **When returned:** Transaction state machine violation
    ///
    /// **Recovery strategy:** Cannot recover - indicates a bug in the caller
    /// or the engine
    ///
    /// **Example scenario:** `free` on an object the transaction never locked
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Recovery strategy:** Fix caller to provide valid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    ///
    /// **When returned:** `MvrluConfig::validate` rejected the configuration
    ///
    /// **Recovery strategy:** Use default configuration or fail fast
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Voluntary abort
    ///
    /// **When returned:** Returned by a write closure to roll back without
    /// retrying; `write` passes it through after the abort
    #[error("Transaction cancelled")]
    Cancelled,

    /// Internal error - indicates a bug in the engine
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MvrluError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MvrluError::LockConflict { .. }
                | MvrluError::Contention { .. }
                | MvrluError::TooManyThreads { .. }
                | MvrluError::Cancelled
        )
    }

    /// Check if the write loop should abort and try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, MvrluError::LockConflict { .. })
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            MvrluError::Misclassified { .. }
                | MvrluError::InvalidState { .. }
                | MvrluError::Internal(_)
        )
    }
}

/// Result type alias for MV-RLU operations
pub type Result<T> = std::result::Result<T, MvrluError>;
