//! Dependency initialization and wiring for the review index.

use std::env;
use std::sync::Arc;

use review_index_repository::{DocumentStore, InMemoryStore};
use tracing::info;

use super::CoordinatorConfig;
use crate::coordinator::ConsistencyCoordinator;
use crate::errors::ReviewIndexError;
use crate::query::ReviewQueries;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The store every component reads and writes through.
    pub store: Arc<dyn DocumentStore>,
    /// The write path.
    pub coordinator: ConsistencyCoordinator,
    /// Keyword search and hydration.
    pub queries: ReviewQueries,
    /// File of write commands to replay, if any.
    pub commands_file: Option<String>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCK_TIMEOUT_MS`, `LOCK_REGISTRY_PRUNE_THRESHOLD`: see [`CoordinatorConfig::from_env`]
    /// - `COMMANDS_FILE`: path of a JSON array of write commands to replay
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ReviewIndexError)` - If the configuration is invalid
    pub fn new() -> Result<Self, ReviewIndexError> {
        let config = CoordinatorConfig::from_env()?;
        let commands_file = env::var("COMMANDS_FILE").ok().filter(|path| !path.is_empty());

        info!(
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            prune_threshold = config.prune_threshold,
            commands_file = ?commands_file,
            "Initializing dependencies"
        );

        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        Ok(Self::with_store(store, config, commands_file))
    }

    /// Wire the components around an existing store.
    pub fn with_store(
        store: Arc<dyn DocumentStore>,
        config: CoordinatorConfig,
        commands_file: Option<String>,
    ) -> Self {
        let coordinator = ConsistencyCoordinator::new(store.clone(), config);
        let queries = ReviewQueries::new(store.clone());
        Self {
            store,
            coordinator,
            queries,
            commands_file,
        }
    }
}
