//! # MV-RLU - Multi-Versioned Read-Log-Update
//!
//! MV-RLU is a concurrency-control engine for pointer-based data structures.
//! Readers run without locks or waiting on a consistent snapshot; writers
//! update objects through private copies kept in per-thread logs and make
//! all of them visible with a single clock increment.
//!
//! ## Overview
//!
//! - **Global Clock**: Writers reserve a commit clock, stamp it into their
//!   copies and publish it in order; readers take the published value as
//!   their snapshot
//! - **Actual / Copy Headers**: Every object has one home location and at
//!   most one pending copy, found in O(1) through the actual's copy pointer
//! - **Per-Thread Logs**: Copies live in bounded ring logs whose address
//!   windows identify them as copies
//! - **Quiescence Reclamation**: A committed copy is written back once no
//!   active snapshot can still need the old version
//!
//! ## Quick Start
//!
//! ```rust
//! use mvrlu::{Mvrlu, MvrluConfig};
//!
//! fn main() -> Result<(), mvrlu::MvrluError> {
//!     let rlu = Mvrlu::<(u64, u64)>::new(MvrluConfig::default())?;
//!     let pair = rlu.alloc((0, 0))?;
//!
//!     let mut thread = rlu.register_thread()?;
//!
//!     // Both fields change atomically.
//!     thread.write(|txn| {
//!         let value = txn.try_lock(&pair)?;
//!         value.0 += 1;
//!         value.1 += 1;
//!         Ok(())
//!     })?;
//!
//!     let (a, b) = thread.read(|section| *section.deref(&pair));
//!     assert_eq!(a, b);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Worker Threads                        │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐              │
//! │  │  Handle  │  │  Handle  │  │  Handle  │              │
//! │  │  + Log   │  │  + Log   │  │  + Log   │              │
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘              │
//! │       │             │             │                     │
//! │       └─────────────┴─────────────┘                     │
//! │                     │                                    │
//! │        read sections / transactions                      │
//! └─────────────────────┼────────────────────────────────────┘
//!                       │
//! ┌─────────────────────┼────────────────────────────────────┐
//! │                 Mvrlu Domain                             │
//! │                     ▼                                    │
//! │  ┌───────────────────────────────────────────┐          │
//! │  │  Clock          reserved / published      │          │
//! │  │  Registry       snapshots + log windows   │          │
//! │  │  Header table   actual objects            │          │
//! │  └───────────────────────────────────────────┘          │
//! │                     │                                    │
//! │                     ▼                                    │
//! │  ┌───────────────────────────────────────────┐          │
//! │  │  Reclaimer                                │          │
//! │  │  - global minimum snapshot                │          │
//! │  │  - write-back under the object lock       │          │
//! │  │  - release log records oldest first       │          │
//! │  └───────────────────────────────────────────┘          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Transaction Phases
//!
//! 1. **Begin**: Publish a snapshot, pin the epoch
//! 2. **Lock**: `try_lock` takes the lock word and copies the object into the log
//! 3. **Commit**: Reserve clock `c`, stamp every copy, publish `c`
//! 4. **Release**: Unlock; the copies stay linked until written back
//!
//! ## Safety
//!
//! Payloads and log records are owned by `crossbeam-epoch` and destroyed
//! only after every section that could have loaded them has ended. The
//! public API is safe; `unsafe` is confined to epoch pointer dereferences.
//!
//! ### Thread Safety
//!
//! - `Mvrlu<T>` is `Send + Sync` and shared through `Arc`
//! - `Obj<T>` handles are `Send + Sync` and cheap to clone
//! - `ThreadHandle<T>` is `!Send`: each worker registers its own
//!
//! ## Modules
//!
//! - [`clock`]: Global write clock and snapshots
//! - [`config`]: Engine configuration and validation
//! - [`error`]: Error types for all operations
//! - [`handle`]: Per-thread access point
//! - [`introspect`]: Address classification, header resolution, debug dumps
//! - [`log`]: Per-thread copy logs
//! - [`logging`]: Structured engine events
//! - [`object`]: Address space and header model
//! - [`reader`]: Read sections
//! - [`reclaim`]: Quiescence detection and write-back
//! - [`registry`]: Thread slots and log windows
//! - [`stats`]: Engine counters
//! - [`writer`]: Writer transactions
//!
//! ## Limitations
//!
//! - **Log Sizing**: A transaction may copy at most `log_capacity` objects
//! - **Handle Drop**: Dropping a handle blocks until its log is flushed

// Core engine
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;

// Object model and storage
pub mod log;
pub mod object;
pub mod registry;

// Sections
pub mod handle;
pub mod reader;
pub mod reclaim;
pub mod writer;

// Introspection and monitoring
pub mod introspect;
pub mod logging;
pub mod stats;

// Utilities
pub mod util;

// Re-export main types for convenience
pub use config::{ConfigError, MvrluConfig};
pub use domain::{Mvrlu, Versioned};
pub use error::{MvrluError, Result};
pub use handle::ThreadHandle;
pub use introspect::{DebugDump, HeaderView, LogView};
pub use object::{Address, CopyState, HeaderKind, LockState, Obj};
pub use reader::{ReadSection, VersionedRead};
pub use reclaim::ReclaimReport;
pub use registry::ThreadId;
pub use writer::{Transaction, TxnState};

/// MV-RLU version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a domain configured from `MVRLU_*` environment variables
///
/// # Examples
///
/// ```rust
/// let rlu = mvrlu::init::<u64>()?;
/// let thread = rlu.register_thread()?;
/// # drop(thread);
/// # Ok::<(), mvrlu::MvrluError>(())
/// ```
pub fn init<T: Versioned>() -> Result<std::sync::Arc<Mvrlu<T>>> {
    Mvrlu::new(MvrluConfig::from_env())
}
