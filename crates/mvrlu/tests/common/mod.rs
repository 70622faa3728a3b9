//! Test Utilities for the MV-RLU Test Suite
//!
//! Fixtures and strict assertion helpers shared by the integration tests.
//! Helpers assert exact values: a snapshot that is "almost" consistent is
//! a bug.

#![allow(dead_code)]

use mvrlu::{HeaderKind, Mvrlu, MvrluConfig, Obj, ThreadHandle};
use std::sync::Arc;
use std::time::Duration;

/// Small log so that backpressure paths are reachable
pub const SMALL_LOG: usize = 4;

/// Maximum test duration before a hang is assumed
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// ============================================================================
/// RLU FIXTURE
/// ============================================================================

/// Test fixture owning one domain
pub struct RluFixture<T: mvrlu::Versioned> {
    pub rlu: Arc<Mvrlu<T>>,
    pub config: MvrluConfig,
}

impl<T: mvrlu::Versioned> RluFixture<T> {
    /// Create fixture with default configuration
    ///
    /// **Bug this finds:** Configuration validation bugs, initialization failures
    pub fn with_defaults() -> Self {
        Self::with_config(MvrluConfig {
            max_threads: 16,
            log_capacity: 256,
            ..Default::default()
        })
    }

    /// Create fixture whose writers never reclaim on their own
    ///
    /// **Bug this finds:** Readers that depend on write-back having happened
    pub fn without_auto_reclaim() -> Self {
        Self::with_config(MvrluConfig {
            max_threads: 16,
            log_capacity: 256,
            reclaim_on_section_end: false,
            ..Default::default()
        })
    }

    /// Create fixture with a tiny log and a tight retry budget
    ///
    /// **Bug this finds:** Backpressure deadlocks, lost rollbacks on exhaustion
    pub fn with_small_log() -> Self {
        Self::with_config(MvrluConfig {
            max_threads: 8,
            log_capacity: SMALL_LOG,
            max_retries: 16,
            log_full_retries: 64,
            ..Default::default()
        })
    }

    pub fn with_config(config: MvrluConfig) -> Self {
        let rlu = Mvrlu::new(config.clone())
            .expect("domain initialization should succeed with valid config");
        Self { rlu, config }
    }

    /// Register the calling thread
    ///
    /// **Bug this finds:** Slot leaks, registration races
    pub fn thread(&self) -> ThreadHandle<T> {
        self.rlu
            .register_thread()
            .unwrap_or_else(|e| panic!("thread registration failed: {:?}", e))
    }

    /// Allocate an object
    pub fn alloc(&self, value: T) -> Obj<T> {
        self.rlu
            .alloc(value)
            .unwrap_or_else(|e| panic!("allocation failed: {:?}", e))
    }

    pub fn alloc_many(&self, values: impl IntoIterator<Item = T>) -> Vec<Obj<T>> {
        values.into_iter().map(|v| self.alloc(v)).collect()
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert that no object is locked and no copy is linked
///
/// **Bug this finds:** Locks leaked by abort paths, copies never written back
/// **Tolerance:** ZERO
#[track_caller]
pub fn assert_quiescent<T: mvrlu::Versioned>(rlu: &Mvrlu<T>, context: &str) {
    let dump = rlu.dump();
    for actual in &dump.actuals {
        assert_eq!(
            actual.lock_state,
            Some(mvrlu::LockState::Unlocked),
            "{}: object {} still locked - lock leaked",
            context,
            actual.address
        );
        assert!(
            actual.copy_pointer.is_null(),
            "{}: object {} still links copy {} after flush",
            context,
            actual.address,
            actual.copy_pointer
        );
    }
    for log in &dump.logs {
        assert_eq!(
            log.len, 0,
            "{}: log of thread {} still holds {} records",
            context, log.thread, log.len
        );
    }
}

/// Assert that every linked copy pointer names a log-resident header
///
/// **Bug this finds:** Copy pointers into freed or foreign memory
/// **Tolerance:** ZERO
#[track_caller]
pub fn assert_copy_pointers_classified<T: mvrlu::Versioned>(rlu: &Mvrlu<T>, context: &str) {
    for actual in rlu.dump().actuals {
        if actual.copy_pointer.is_null() {
            continue;
        }
        assert_eq!(
            rlu.classify(actual.copy_pointer),
            HeaderKind::Copy,
            "{}: copy pointer {} of {} is not log-resident",
            context,
            actual.copy_pointer,
            actual.address
        );
    }
}

/// Assert that operation completed within timeout
///
/// **Bug this finds:** Deadlock, unbounded quiescence waits
#[track_caller]
pub fn assert_completed_within_timeout<F, R>(operation: F, timeout: Duration, context: &str) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = operation();
    let elapsed = start.elapsed();

    assert!(
        elapsed < timeout,
        "{}: operation took {:?}, exceeded timeout of {:?} - possible deadlock",
        context,
        elapsed,
        timeout
    );

    result
}
