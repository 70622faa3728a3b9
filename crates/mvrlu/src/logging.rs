//! Engine Logging and Tracing
//!
//! Structured event log for a domain, useful for:
//! - Debugging contention and reclamation lag
//! - Sizing logs in production
//!
//! Log Levels:
//! - ERROR: Exhausted resources
//! - WARN: Contention failures, log-full waits
//! - INFO: Thread registration
//! - DEBUG: Aborts, reclamation passes
//! - TRACE: Per-commit events

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for engine events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Engine event types
#[derive(Debug, Clone)]
pub enum RluEvent {
    /// A thread claimed a registry slot
    ThreadRegistered { thread: u64, log_capacity: usize },

    /// A thread released its slot after flushing its log
    ThreadDeregistered { thread: u64 },

    /// A transaction committed
    Commit {
        thread: u64,
        clock: u64,
        copies: usize,
    },

    /// A transaction attempt rolled back
    Abort {
        thread: u64,
        attempt: usize,
        copies: usize,
    },

    /// A write gave up after exhausting its retry budget
    ContentionExhausted { thread: u64, attempts: usize },

    /// A reclamation pass released records
    Reclaim {
        thread: u64,
        written_back: usize,
        remaining: usize,
        global_min: u64,
    },

    /// A writer found its log full
    LogFull { thread: u64, capacity: usize },

    /// A writer could not obtain log space at all
    LogExhausted { thread: u64, capacity: usize },

    /// A log was dropped before all its records were reclaimed
    LogAbandoned { thread: u64, records: usize },
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct RluLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Recorded events kept in memory; older events are dropped first
    pub max_events: usize,
}

impl Default for RluLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
            max_events: 10_000,
        }
    }
}

/// Event logger for an MV-RLU domain
pub struct RluLogger {
    config: RluLoggerConfig,
    events: Mutex<Vec<(Instant, RluEvent)>>,
    enabled: AtomicBool,
}

impl RluLogger {
    /// Create new logger
    pub fn new(config: RluLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log an engine event
    pub fn log(&self, event: RluEvent) {
        if !self.is_enabled() {
            return;
        }

        if Self::event_level(&event) > self.config.level {
            return;
        }

        if self.config.console {
            self.output_console(&event);
        }

        let mut events = self.events.lock();
        if events.len() >= self.config.max_events {
            let excess = events.len() + 1 - self.config.max_events;
            events.drain(..excess);
        }
        events.push((Instant::now(), event));
    }

    /// Get log level for event
    fn event_level(event: &RluEvent) -> LogLevel {
        match event {
            RluEvent::LogExhausted { .. } | RluEvent::LogAbandoned { .. } => LogLevel::Error,
            RluEvent::ContentionExhausted { .. } | RluEvent::LogFull { .. } => LogLevel::Warn,
            RluEvent::ThreadRegistered { .. } | RluEvent::ThreadDeregistered { .. } => {
                LogLevel::Info
            },
            RluEvent::Abort { .. } | RluEvent::Reclaim { .. } => LogLevel::Debug,
            RluEvent::Commit { .. } => LogLevel::Trace,
        }
    }

    /// Output to console
    fn output_console(&self, event: &RluEvent) {
        let prefix = if self.config.timestamps {
            let now = chrono::Local::now();
            format!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"))
        } else {
            String::new()
        };

        if self.config.json {
            println!("{}{}", prefix, Self::to_json(event));
        } else {
            println!("{}{}", prefix, Self::to_human(event));
        }
    }

    /// Human-readable rendering
    fn to_human(event: &RluEvent) -> String {
        match event {
            RluEvent::ThreadRegistered {
                thread,
                log_capacity,
            } => format!(
                "[RLU] Thread {} registered (log capacity {})",
                thread, log_capacity
            ),
            RluEvent::ThreadDeregistered { thread } => {
                format!("[RLU] Thread {} deregistered", thread)
            },
            RluEvent::Commit {
                thread,
                clock,
                copies,
            } => format!(
                "[RLU] Thread {} committed {} copies at clock {}",
                thread, copies, clock
            ),
            RluEvent::Abort {
                thread,
                attempt,
                copies,
            } => format!(
                "[RLU] Thread {} aborted attempt {} ({} copies discarded)",
                thread, attempt, copies
            ),
            RluEvent::ContentionExhausted { thread, attempts } => format!(
                "[RLU] Thread {} gave up after {} attempts",
                thread, attempts
            ),
            RluEvent::Reclaim {
                thread,
                written_back,
                remaining,
                global_min,
            } => format!(
                "[RLU] Thread {} wrote back {} copies ({} remaining, min snapshot {})",
                thread, written_back, remaining, global_min
            ),
            RluEvent::LogFull { thread, capacity } => format!(
                "[RLU] Thread {} log full ({} records), waiting for quiescence",
                thread, capacity
            ),
            RluEvent::LogExhausted { thread, capacity } => format!(
                "[RLU] Thread {} log exhausted ({} records)",
                thread, capacity
            ),
            RluEvent::LogAbandoned { thread, records } => format!(
                "[RLU] Thread {} log dropped with {} live records",
                thread, records
            ),
        }
    }

    /// JSON rendering
    fn to_json(event: &RluEvent) -> serde_json::Value {
        match event {
            RluEvent::ThreadRegistered {
                thread,
                log_capacity,
            } => serde_json::json!({
                "type": "thread_registered",
                "thread": thread,
                "log_capacity": log_capacity
            }),
            RluEvent::ThreadDeregistered { thread } => serde_json::json!({
                "type": "thread_deregistered",
                "thread": thread
            }),
            RluEvent::Commit {
                thread,
                clock,
                copies,
            } => serde_json::json!({
                "type": "commit",
                "thread": thread,
                "clock": clock,
                "copies": copies
            }),
            RluEvent::Abort {
                thread,
                attempt,
                copies,
            } => serde_json::json!({
                "type": "abort",
                "thread": thread,
                "attempt": attempt,
                "copies": copies
            }),
            RluEvent::ContentionExhausted { thread, attempts } => serde_json::json!({
                "type": "contention_exhausted",
                "thread": thread,
                "attempts": attempts
            }),
            RluEvent::Reclaim {
                thread,
                written_back,
                remaining,
                global_min,
            } => serde_json::json!({
                "type": "reclaim",
                "thread": thread,
                "written_back": written_back,
                "remaining": remaining,
                "global_min": global_min
            }),
            RluEvent::LogFull { thread, capacity } => serde_json::json!({
                "type": "log_full",
                "thread": thread,
                "capacity": capacity
            }),
            RluEvent::LogExhausted { thread, capacity } => serde_json::json!({
                "type": "log_exhausted",
                "thread": thread,
                "capacity": capacity
            }),
            RluEvent::LogAbandoned { thread, records } => serde_json::json!({
                "type": "log_abandoned",
                "thread": thread,
                "records": records
            }),
        }
    }

    /// Get all events
    pub fn get_events(&self) -> Vec<(Instant, RluEvent)> {
        self.events.lock().clone()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for RluLogger {
    fn default() -> Self {
        Self::new(RluLoggerConfig::default())
    }
}

// Process-wide sink for events raised where no domain is at hand.
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<RluLogger> = Mutex::new(RluLogger::default());
}

/// Log an event to the global logger
pub fn log_event(event: RluEvent) {
    GLOBAL_LOGGER.lock().log(event);
}
