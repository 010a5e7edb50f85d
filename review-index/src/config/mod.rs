//! Configuration and dependency wiring.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::errors::ReviewIndexError;

/// Default wait for a per-entity lock, in milliseconds.
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default number of tracked lock keys before idle ones are pruned.
const DEFAULT_PRUNE_THRESHOLD: usize = 1_024;

/// Settings for the consistency coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long a request waits for each lock before failing with a timeout.
    pub lock_timeout: Duration,
    /// Lock registry size above which idle entries are dropped.
    pub prune_threshold: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }
}

impl CoordinatorConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCK_TIMEOUT_MS`: lock wait in milliseconds (default: 5000)
    /// - `LOCK_REGISTRY_PRUNE_THRESHOLD`: registry size that triggers pruning (default: 1024)
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Result<Self, ReviewIndexError> {
        let lock_timeout_ms = parse_env("LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS);
        let prune_threshold = parse_env("LOCK_REGISTRY_PRUNE_THRESHOLD", DEFAULT_PRUNE_THRESHOLD);

        let config = Self {
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            prune_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_prune_threshold(mut self, prune_threshold: usize) -> Self {
        self.prune_threshold = prune_threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ReviewIndexError> {
        if self.lock_timeout.is_zero() {
            return Err(ReviewIndexError::config("lock timeout must be greater than zero"));
        }
        if self.prune_threshold == 0 {
            return Err(ReviewIndexError::config(
                "lock registry prune threshold must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
