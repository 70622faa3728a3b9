//! Configuration Module - Engine Tuning Parameters
//!
//! Manages all configuration parameters for an MV-RLU domain.
//! Log capacity bounds the number of pending copies per thread, the retry
//! budgets bound how long writers spin before surfacing an error.

/// Main configuration for an MV-RLU domain
///
/// Most parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use mvrlu::MvrluConfig;
///
/// // Use default configuration
/// let config = MvrluConfig::default();
///
/// // Small logs for a memory-constrained embedding
/// let config = MvrluConfig {
///     log_capacity: 256,
///     max_threads: 8,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MvrluConfig {
    /// Number of registry slots
    ///
    /// Each live `ThreadHandle` occupies one slot and one log window.
    /// Default: 4 x CPU count, at least 16
    pub max_threads: usize,

    /// Copy records per thread log
    ///
    /// Must cover the largest number of objects a single transaction locks
    /// with a copy, plus the copies still waiting for quiescence.
    /// Default: 4096
    pub log_capacity: usize,

    /// Transaction attempts before `Contention` is returned
    ///
    /// Default: 10_000
    pub max_retries: usize,

    /// Backoff rounds a writer waits for log space before
    /// `ResourceExhausted` is returned
    ///
    /// Default: 100_000
    pub log_full_retries: usize,

    /// Run a reclamation pass over the own log when an outermost read
    /// section or a transaction ends
    ///
    /// Only threads with a non-empty log pay for it. The pass may write
    /// copies back, which clones payloads and allocates, so that cost lands
    /// at the end of the thread's read section. The dereferences inside a
    /// section stay allocation-free either way. Disable to keep all
    /// reclamation in `ThreadHandle::reclaim` and in the write path.
    ///
    /// Default: true
    pub reclaim_on_section_end: bool,

    /// Print engine events to the console
    ///
    /// Default: false
    pub verbose: bool,

    /// Collect commit/abort/reclaim counters
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for MvrluConfig {
    /// Default configuration
    ///
    /// Balanced for a short-transaction, read-mostly workload.
    fn default() -> Self {
        let num_cpus = num_cpus::get();

        MvrluConfig {
            // Registry
            max_threads: (num_cpus * 4).max(MIN_DEFAULT_THREADS),

            // Log
            log_capacity: 4096,
            log_full_retries: 100_000,

            // Writers
            max_retries: 10_000,

            // Reclamation
            reclaim_on_section_end: true,

            // Debug
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl MvrluConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mvrlu::MvrluConfig;
    ///
    /// let config = MvrluConfig {
    ///     log_capacity: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidThreadCount(
                "max_threads must be > 0".to_string(),
            ));
        }

        if self.max_threads > MAX_THREADS {
            return Err(ConfigError::InvalidThreadCount(format!(
                "max_threads must be <= {}",
                MAX_THREADS
            )));
        }

        if self.log_capacity == 0 {
            return Err(ConfigError::InvalidLogCapacity(
                "log_capacity must be > 0".to_string(),
            ));
        }

        if self.log_capacity > MAX_LOG_CAPACITY {
            return Err(ConfigError::InvalidLogCapacity(format!(
                "log_capacity must be <= {}",
                MAX_LOG_CAPACITY
            )));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::InvalidRetryBudget(
                "max_retries must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create configuration from environment variables
    ///
    /// Reads:
    /// - MVRLU_MAX_THREADS
    /// - MVRLU_LOG_CAPACITY
    /// - MVRLU_MAX_RETRIES
    /// - MVRLU_VERBOSE
    ///
    /// # Examples
    ///
    /// ```bash
    /// export MVRLU_LOG_CAPACITY=16384
    /// export MVRLU_VERBOSE=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MVRLU_MAX_THREADS") {
            if let Ok(threads) = val.parse::<usize>() {
                config.max_threads = threads;
            }
        }

        if let Ok(val) = std::env::var("MVRLU_LOG_CAPACITY") {
            if let Ok(capacity) = val.parse::<usize>() {
                config.log_capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("MVRLU_MAX_RETRIES") {
            if let Ok(retries) = val.parse::<usize>() {
                config.max_retries = retries;
            }
        }

        if let Ok(val) = std::env::var("MVRLU_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(String),

    #[error("Invalid log capacity: {0}")]
    InvalidLogCapacity(String),

    #[error("Invalid retry budget: {0}")]
    InvalidRetryBudget(String),
}

// ============================================================================
// CONSTANTS & HELPERS
// ============================================================================

const MIN_DEFAULT_THREADS: usize = 16;

/// Upper bound on registry slots; every slot owns a 4GB log window
pub const MAX_THREADS: usize = 4096;

/// Upper bound on records per log so a window never overflows its 4GB span
pub const MAX_LOG_CAPACITY: usize = 1 << 20;
