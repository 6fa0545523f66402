//! Shared capture of `log` records for unit tests.
//!
//! `logtest` installs a process-wide logger that may only be started once,
//! so every test that inspects log output goes through [`capture_logs`].

use std::sync::OnceLock;

use logtest::Logger;
use parking_lot::{Mutex, MutexGuard};

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

/// Lock the shared logger and discard records left by earlier tests.
pub fn capture_logs() -> MutexGuard<'static, Logger> {
    let mut logger = LOGGER.get_or_init(|| Mutex::new(Logger::start())).lock();
    while logger.pop().is_some() {}
    logger
}

/// Drain captured records and return the messages logged at `level`.
pub fn messages_at(logger: &mut Logger, level: log::Level) -> Vec<String> {
    std::iter::from_fn(|| logger.pop())
        .filter(|record| record.level() == level)
        .map(|record| record.args().to_string())
        .collect()
}
