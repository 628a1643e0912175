//! # Admission Testing
//!
//! Testing utilities for the admission engine:
//!
//! - Mock implementations of environment traits ([`mocks::FixedClock`],
//!   [`mocks::RecordingBus`])
//! - The [`ReducerTest`] Given-When-Then harness
//! - Assertion helpers for effect batches


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits.
pub mod mocks {
    use admission_core::environment::Clock;
    use admission_core::notification::{Notification, NotificationBus, NotificationError};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use admission_testing::mocks::FixedClock;
    /// use admission_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Notification bus that records every instruction it receives.
    #[derive(Debug, Default)]
    pub struct RecordingBus {
        published: Mutex<Vec<Notification>>,
    }

    impl RecordingBus {
        /// Creates an empty recording bus
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every instruction published so far, in order
        ///
        /// # Panics
        ///
        /// Panics if a previous test panicked while holding the record lock.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn recorded(&self) -> Vec<Notification> {
            self.published.lock().unwrap().clone()
        }

        /// Instructions of the given kind, in order
        #[must_use]
        pub fn of_kind(&self, kind: &str) -> Vec<Notification> {
            self.recorded()
                .into_iter()
                .filter(|notification| notification.kind() == kind)
                .collect()
        }
    }

    #[async_trait]
    impl NotificationBus for RecordingBus {
        async fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
            self.published
                .lock()
                .map_err(|_| NotificationError::Closed)?
                .push(notification);
            Ok(())
        }
    }
}
