//! Entitlement runtime tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Tuning knobs for the quota gate and session reconciler
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    /// Bound on a single quota store call, in milliseconds. On expiry
    /// the gate fails closed.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Snapshot age after which the session reconciler re-reads the
    /// store, in seconds.
    #[serde(default = "default_snapshot_max_age_secs")]
    pub snapshot_max_age_secs: u64,
}

impl EntitlementConfig {
    /// Store call bound as Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Snapshot refresh age as Duration
    pub fn snapshot_max_age(&self) -> Duration {
        Duration::from_secs(self.snapshot_max_age_secs)
    }

    /// Validate entitlement configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.store_timeout_ms == 0 || self.store_timeout_ms > 30_000 {
            return Err(ValidationError::InvalidStoreTimeout);
        }
        Ok(())
    }
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            snapshot_max_age_secs: default_snapshot_max_age_secs(),
        }
    }
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_snapshot_max_age_secs() -> u64 {
    300
}
