//! Clock abstraction for testable time.
//!
//! Every timestamp the engine writes flows through a [`Clock`] so tests can
//! run against fixed or manually advanced time instead of `Utc::now()`.

use chrono::{DateTime, Utc};

/// Abstracts time operations for testability.
///
/// Production code injects [`SystemClock`]; tests inject a fixed or manually
/// advanced clock from the testing crate.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
