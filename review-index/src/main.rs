//! Review Index Main Entry Point
//!
//! Replays a file of write commands through the consistency coordinator and
//! logs the outcome of each one.

use dotenv::dotenv;
use review_index::{Dependencies, ReviewIndexError, WriteCommand};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), ReviewIndexError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("review_index=info,review_index_repository=info")
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| ReviewIndexError::config(format!("Failed to init tracing: {}", e)))?;

        info!(
            service_name = "review-index",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| ReviewIndexError::config(format!("Failed to init tracing: {}", e)))?;

        info!(
            service_name = "review-index",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

/// Read a JSON array of commands from `path`.
fn load_commands(path: &str) -> Result<Vec<WriteCommand>, ReviewIndexError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ReviewIndexError::config(format!("Failed to read {}: {}", path, e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| ReviewIndexError::config(format!("Failed to parse {}: {}", path, e)))
}

#[tokio::main]
async fn main() -> Result<(), ReviewIndexError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting review index");

    let deps = match Dependencies::new() {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let Some(path) = deps.commands_file.as_deref() else {
        warn!("COMMANDS_FILE not set, nothing to replay");
        return Ok(());
    };
    let commands = load_commands(path)?;
    info!(path, count = commands.len(), "Replaying write commands");

    let mut failed = 0usize;
    for (index, command) in commands.into_iter().enumerate() {
        let operation = command.operation();
        // A commit already in flight finishes on its own task if this is cancelled,
        // and shutdown below waits for it.
        let result = tokio::select! {
            result = deps.coordinator.apply(command) => result,
            _ = tokio::signal::ctrl_c() => {
                info!(index, "Received shutdown signal");
                break;
            }
        };

        match result {
            Ok(outcome) => match serde_json::to_string(&outcome) {
                Ok(json) => info!(index, operation, outcome = %json, "Command applied"),
                Err(e) => warn!(index, operation, error = %e, "Command applied, outcome not serializable"),
            },
            Err(e) => {
                failed += 1;
                error!(
                    index,
                    operation,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Command failed"
                );
            }
        }
    }

    deps.coordinator.shutdown().await;
    if let Err(e) = deps.store.close().await {
        warn!(error = %e, "Failed to close document store");
    }

    info!(failed, "Replay finished");
    Ok(())
}
