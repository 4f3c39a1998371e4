//! Capture of `log` records for unit tests.
//!
//! `tracing_test` only sees `tracing` events. Server lifecycle messages go
//! through the `log` facade, so tests asserting on them take the shared
//! [`LoggerHandle`] instead.

use std::sync::{Mutex, MutexGuard, OnceLock};

use logtest::Logger;
use rstest::fixture;

/// Exclusive access to the process-wide [`Logger`].
///
/// Holding the guard serialises tests that inspect captured records.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
    seen: Vec<String>,
}

impl LoggerHandle {
    /// Acquire the logger and discard records left by earlier tests.
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let guard = logger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut handle = Self {
            guard,
            seen: Vec::new(),
        };
        handle.clear();
        handle
    }

    /// Drop every captured record.
    pub fn clear(&mut self) {
        while self.guard.pop().is_some() {}
        self.seen.clear();
    }

    /// Report whether any message captured so far contains `needle`.
    pub fn contains(&mut self, needle: &str) -> bool {
        while let Some(record) = self.guard.pop() {
            self.seen.push(record.args().to_owned());
        }
        self.seen.iter().any(|message| message.contains(needle))
    }
}

#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
