//! Engine configuration.
//!
//! Loaded from environment variables with defaults. The two expiry windows
//! are deliberately advisory: the source system never expired pending
//! approvals or waitlist entries, so the engine exposes the knobs for a host
//! scheduler without enforcing them itself.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Advisory tuning knobs for hosts embedding the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a host may leave a registration in `PendingApproval` before
    /// expiring it. `None` (the default) means pending registrations wait
    /// indefinitely for an explicit decision.
    pub pending_approval_timeout: Option<Duration>,

    /// How close to the event start a host may keep volunteers on the
    /// waitlist. `None` (the default) keeps the waitlist open until the
    /// lifecycle closes registration.
    pub waitlist_cutoff: Option<Duration>,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// - `ADMISSION_PENDING_APPROVAL_TIMEOUT_SECS`
    /// - `ADMISSION_WAITLIST_CUTOFF_SECS`
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            pending_approval_timeout: env_secs("ADMISSION_PENDING_APPROVAL_TIMEOUT_SECS"),
            waitlist_cutoff: env_secs("ADMISSION_WAITLIST_CUTOFF_SECS"),
        };
        tracing::debug!(?config, "engine configuration loaded");
        config
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}
