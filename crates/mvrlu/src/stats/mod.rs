//! Stats Module - Engine Counters
//!
//! Collects engine statistics for:
//! - Contention analysis (aborts per commit)
//! - Log sizing (log-full waits, copies per commit)
//! - Reclamation lag (write-backs per pass)

pub mod histogram;
pub mod timer;

pub use histogram::Histogram;
pub use timer::Timer;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Statistics collector for one domain
pub struct RluStats {
    enabled: AtomicBool,
    /// Committed transactions
    commits: AtomicU64,
    /// Aborted attempts (conflicts and cancellations)
    aborts: AtomicU64,
    /// Copies created
    copies: AtomicU64,
    /// Copies written back into their actual
    write_backs: AtomicU64,
    /// Aborted copies released by rollback
    discarded: AtomicU64,
    /// Reclamation passes
    reclaim_passes: AtomicU64,
    /// Backoff rounds spent waiting for log space
    log_full_waits: AtomicU64,
    /// Writes that gave up with `Contention`
    contention_failures: AtomicU64,
    /// Commit latency, begin to publish (ns)
    commit_latency: Histogram,
    start_time: std::time::Instant,
}

/// Snapshot of `RluStats`
#[derive(Debug, Clone, Serialize)]
pub struct RluSummary {
    pub commits: u64,
    pub aborts: u64,
    pub copies: u64,
    pub write_backs: u64,
    pub discarded: u64,
    pub reclaim_passes: u64,
    pub log_full_waits: u64,
    pub contention_failures: u64,
    pub commit_latency_p50_ns: u64,
    pub commit_latency_p99_ns: u64,
    pub commit_latency_max_ns: u64,
    pub uptime_ms: u64,
}

impl RluStats {
    /// Create new stats collector
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            copies: AtomicU64::new(0),
            write_backs: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            reclaim_passes: AtomicU64::new(0),
            log_full_waits: AtomicU64::new(0),
            contention_failures: AtomicU64::new(0),
            commit_latency: Histogram::new(),
            start_time: std::time::Instant::now(),
        }
    }

    #[inline]
    fn bump(&self, counter: &AtomicU64, by: u64) {
        if self.enabled.load(Ordering::Relaxed) {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    pub fn record_commit(&self, latency_ns: u64) {
        if self.enabled.load(Ordering::Relaxed) {
            self.commits.fetch_add(1, Ordering::Relaxed);
            self.commit_latency.record(latency_ns);
        }
    }

    pub fn record_abort(&self, discarded: usize) {
        self.bump(&self.aborts, 1);
        self.bump(&self.discarded, discarded as u64);
    }

    pub fn record_copy(&self) {
        self.bump(&self.copies, 1);
    }

    pub fn record_reclaim(&self, written_back: usize) {
        self.bump(&self.reclaim_passes, 1);
        self.bump(&self.write_backs, written_back as u64);
    }

    pub fn record_log_full_wait(&self) {
        self.bump(&self.log_full_waits, 1);
    }

    pub fn record_contention_failure(&self) {
        self.bump(&self.contention_failures, 1);
    }

    /// Commit latency histogram
    pub fn commit_latency(&self) -> &Histogram {
        &self.commit_latency
    }

    /// Get summary statistics
    pub fn summary(&self) -> RluSummary {
        RluSummary {
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            copies: self.copies.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            reclaim_passes: self.reclaim_passes.load(Ordering::Relaxed),
            log_full_waits: self.log_full_waits.load(Ordering::Relaxed),
            contention_failures: self.contention_failures.load(Ordering::Relaxed),
            commit_latency_p50_ns: self.commit_latency.p50(),
            commit_latency_p99_ns: self.commit_latency.p99(),
            commit_latency_max_ns: self.commit_latency.max(),
            uptime_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }
}

impl Default for RluStats {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RluStats::new(true);
        stats.record_copy();
        stats.record_copy();
        stats.record_commit(1_000);
        stats.record_abort(1);
        stats.record_reclaim(2);

        let summary = stats.summary();
        assert_eq!(summary.copies, 2);
        assert_eq!(summary.commits, 1);
        assert_eq!(summary.aborts, 1);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.reclaim_passes, 1);
        assert_eq!(summary.write_backs, 2);
        assert_eq!(summary.commit_latency_max_ns, 1_000);
    }

    #[test]
    fn test_disabled_stats_stay_zero() {
        let stats = RluStats::new(false);
        stats.record_copy();
        stats.record_commit(10);
        assert_eq!(stats.summary().copies, 0);
        assert_eq!(stats.summary().commits, 0);
    }
}
