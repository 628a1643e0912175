//! Dependency injection traits for reducer environments.
//!
//! External dependencies are abstracted behind traits and injected via each
//! reducer's environment, keeping reducers deterministic under test.

use chrono::{DateTime, Utc};

/// Abstracts time so tests can pin the clock.
pub trait Clock: Send + Sync {
    /// The current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
