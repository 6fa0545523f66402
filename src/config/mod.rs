//! Worker configuration.
//!
//! [`QueueConfig`] is built once, validated, and moved into the worker when it
//! starts. Defaults favour a local shipper; callers override individual
//! fields with the `with_*` methods or load a `[queue]` section from an INI
//! file via [`QueueConfig::from_ini_file`].

mod file;
pub(crate) mod policy;

use std::{io, time::Duration};

use thiserror::Error;

pub use file::{FileConfig, load_ini_file};
pub use policy::{OverflowPolicy, parse_policy_string};

/// Default bounded queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Largest bounded queue capacity accepted by [`QueueConfig::validate`].
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 20;
/// Default idle period after which the worker stops.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default time a single dequeue waits before re-checking liveness.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default ceiling on the failure counter.
pub const DEFAULT_MAX_FAILURES: u32 = 3;
/// Default base of the exponential backoff, in seconds.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
/// Default interval between rate-limited warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Errors raised while building or loading a [`QueueConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent with another value.
    #[error("invalid queue configuration: {0}")]
    Invalid(String),
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid INI or holds a malformed value.
    #[error("{path} is invalid: {reason}")]
    Parse { path: String, reason: String },
    /// The requested text encoding is not known.
    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
}

/// Settings read by the worker loop.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueConfig {
    /// Idle period with no items after which the worker terminates.
    pub queue_timeout: Duration,
    /// Upper bound on a single blocking dequeue.
    pub wait_timeout: Duration,
    /// Ceiling for the failure counter used as the backoff exponent.
    pub max_failures: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
    /// Drop zero-length lines from callback batches.
    pub ignore_empty: bool,
    /// Bounded queue size.
    pub capacity: usize,
    /// Producer behaviour when the queue is full.
    pub overflow_policy: OverflowPolicy,
    /// Randomise each backoff delay within its upper half.
    pub backoff_jitter: bool,
    /// Minimum interval between repeated warnings about rejected items.
    pub warn_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_failures: DEFAULT_MAX_FAILURES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            ignore_empty: false,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            overflow_policy: OverflowPolicy::Block,
            backoff_jitter: false,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl QueueConfig {
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_ignore_empty(mut self, ignore_empty: bool) -> Self {
        self.ignore_empty = ignore_empty;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_backoff_jitter(mut self, jitter: bool) -> Self {
        self.backoff_jitter = jitter;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }

    /// Check that the values can drive a worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "capacity must be greater than zero".into(),
            ));
        }
        if self.capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "capacity must not exceed {MAX_CHANNEL_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.wait_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "wait_timeout must be greater than zero".into(),
            ));
        }
        if self.queue_timeout < self.wait_timeout {
            return Err(ConfigError::Invalid(
                "queue_timeout must not be shorter than wait_timeout".into(),
            ));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_base must be a finite number >= 1, got {}",
                self.backoff_base
            )));
        }
        if self.max_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_failures must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
