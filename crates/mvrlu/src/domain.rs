//! MV-RLU Domain
//!
//! An `Mvrlu<T>` owns everything shared by the threads that operate on one
//! family of objects: the write clock, the thread registry with its log
//! windows, the actual-header table, statistics and the event logger.

use crate::clock::Clock;
use crate::config::{ConfigError, MvrluConfig};
use crate::error::Result;
use crate::handle::ThreadHandle;
use crate::log::Log;
use crate::logging::{LogLevel, RluLogger, RluLoggerConfig};
use crate::object::{HeaderTable, Obj, LOG_WINDOW_SPAN};
use crate::registry::ThreadRegistry;
use crate::stats::RluStats;
use std::sync::Arc;

/// Payload types that can be versioned
///
/// Writers clone the actual payload into their log, and payloads are
/// shared between threads and destroyed on whichever thread ends the grace
/// period.
pub trait Versioned: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Versioned for T {}

/// A versioned-object domain
///
/// # Examples
///
/// ```rust
/// use mvrlu::{Mvrlu, MvrluConfig};
///
/// let rlu = Mvrlu::<u64>::new(MvrluConfig::default()).unwrap();
/// let counter = rlu.alloc(0).unwrap();
///
/// let mut thread = rlu.register_thread().unwrap();
/// thread
///     .write(|txn| {
///         *txn.try_lock(&counter)? += 1;
///         Ok(())
///     })
///     .unwrap();
///
/// let value = thread.read(|section| *section.deref(&counter));
/// assert_eq!(value, 1);
/// ```
pub struct Mvrlu<T> {
    pub(crate) config: MvrluConfig,
    pub(crate) clock: Clock,
    pub(crate) registry: ThreadRegistry<T>,
    pub(crate) headers: HeaderTable<T>,
    pub(crate) stats: RluStats,
    pub(crate) logger: RluLogger,
}

impl<T: Versioned> Mvrlu<T> {
    /// Create a domain
    ///
    /// # Errors
    ///
    /// `Configuration` if the configuration is invalid or a log of
    /// `log_capacity` records of `T` does not fit its address window.
    pub fn new(config: MvrluConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let extent = config.log_capacity as u64 * Log::<T>::record_stride() as u64;
        if extent > LOG_WINDOW_SPAN {
            return Err(ConfigError::InvalidLogCapacity(format!(
                "{} records of {} bytes exceed the {} byte log window",
                config.log_capacity,
                Log::<T>::record_stride(),
                LOG_WINDOW_SPAN
            ))
            .into());
        }

        let logger = RluLogger::new(RluLoggerConfig {
            level: if config.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
            console: config.verbose,
            ..Default::default()
        });

        log::debug!(
            "mvrlu domain: {} thread slots, {} records per log",
            config.max_threads,
            config.log_capacity
        );

        Ok(Arc::new(Self {
            clock: Clock::new(),
            registry: ThreadRegistry::new(config.max_threads, config.log_capacity),
            headers: HeaderTable::new(),
            stats: RluStats::new(config.stats_enabled),
            logger,
            config,
        }))
    }

    /// Create a domain with the default configuration
    pub fn with_defaults() -> Result<Arc<Self>> {
        Self::new(MvrluConfig::default())
    }

    /// Claim a registry slot for the calling thread
    ///
    /// # Errors
    ///
    /// `TooManyThreads` if every slot is taken.
    pub fn register_thread(self: &Arc<Self>) -> Result<ThreadHandle<T>> {
        ThreadHandle::register(Arc::clone(self))
    }

    /// Allocate a new actual object
    ///
    /// The object is private until a transaction links it into a shared
    /// structure.
    pub fn alloc(&self, value: T) -> Result<Obj<T>> {
        self.headers.allocate(value)
    }
}

impl<T> Mvrlu<T> {
    #[inline]
    pub fn config(&self) -> &MvrluConfig {
        &self.config
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[inline]
    pub fn stats(&self) -> &RluStats {
        &self.stats
    }

    #[inline]
    pub fn logger(&self) -> &RluLogger {
        &self.logger
    }

    #[inline]
    pub fn registry(&self) -> &ThreadRegistry<T> {
        &self.registry
    }

    /// Number of currently registered threads
    pub fn thread_count(&self) -> usize {
        self.registry.active_count()
    }
}
