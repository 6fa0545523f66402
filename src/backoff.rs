//! Exponential backoff state machine used by the worker.
//!
//! The failure counter is the exponent: the delay before a retry is
//! `base ** failures` seconds, where `failures` is clamped at
//! `max_failures`. The clamp bounds the delay without a separate cap.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::QueueConfig;

/// Tracks consecutive transport failures and produces retry delays.
pub struct BackoffState {
    base: f64,
    max_failures: u32,
    failures: u32,
    jitter: Option<StdRng>,
}

impl BackoffState {
    pub fn new(base: f64, max_failures: u32) -> Self {
        Self {
            base,
            max_failures,
            failures: 0,
            jitter: None,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        let state = Self::new(config.backoff_base, config.max_failures);
        if config.backoff_jitter {
            state.with_jitter()
        } else {
            state
        }
    }

    /// Draw each delay uniformly from the upper half of its range.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = Some(StdRng::from_entropy());
        self
    }

    /// Current value of the failure counter.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failure and return the delay to wait before the next attempt.
    pub fn next_sleep(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1).min(self.max_failures);
        let delay = self.delay_for(self.failures);
        match self.jitter.as_mut() {
            Some(rng) if !delay.is_zero() => rng.gen_range(delay / 2..=delay),
            _ => delay,
        }
    }

    /// Reset after a successful reconnect or delivery.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Unjittered delay for a given failure count.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.min(self.max_failures)).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.base.powi(exponent)).unwrap_or(Duration::MAX)
    }
}
