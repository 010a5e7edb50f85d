//! Error types for the review index write path.

use review_index_repository::{Collection, StoreError};
use thiserror::Error;

/// Errors surfaced to callers of the consistency coordinator.
///
/// Validation, referential-integrity, dependency and not-found errors are
/// detected before anything is written. `WriteError` aborts the remaining steps
/// of a request; nothing retries it. `ConcurrencyTimeoutError` is the only
/// retryable failure.
#[derive(Error, Debug)]
pub enum ReviewIndexError {
    /// Malformed input, e.g. a rating outside [0, 5] or an empty name.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A referenced id does not resolve to an existing document.
    #[error("Referential integrity error: {collection} '{id}' does not exist")]
    ReferentialIntegrityError { collection: Collection, id: String },

    /// A landlord cannot be deleted while apartments or reviews reference it.
    #[error(
        "Dependency exists: landlord '{landlord_id}' still has {properties} properties and {reviews} reviews"
    )]
    DependencyExistsError {
        landlord_id: String,
        properties: usize,
        reviews: usize,
    },

    /// The document targeted by an update or delete does not exist.
    #[error("Not found: {collection} '{id}'")]
    NotFound { collection: Collection, id: String },

    /// The document store failed a read or write.
    #[error("Write error: {0}")]
    WriteError(#[from] StoreError),

    /// A per-entity lock was not acquired within the configured wait.
    #[error("Concurrency timeout: lock on {key} not acquired within {waited_ms} ms")]
    ConcurrencyTimeoutError { key: String, waited_ms: u64 },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ReviewIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a referential integrity error for a dangling reference.
    pub fn dangling(collection: Collection, id: impl Into<String>) -> Self {
        Self::ReferentialIntegrityError {
            collection,
            id: id.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Returns true if the caller may resubmit the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyTimeoutError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_retryable() {
        let timeout = ReviewIndexError::ConcurrencyTimeoutError {
            key: "landlord:L1".to_string(),
            waited_ms: 50,
        };
        assert!(timeout.is_retryable());
        assert!(!ReviewIndexError::validation("bad").is_retryable());
        assert!(!ReviewIndexError::from(StoreError::put("disk full")).is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = ReviewIndexError::dangling(Collection::Landlords, "L9");
        assert_eq!(
            err.to_string(),
            "Referential integrity error: landlords 'L9' does not exist"
        );

        let err = ReviewIndexError::DependencyExistsError {
            landlord_id: "L1".to_string(),
            properties: 2,
            reviews: 0,
        };
        assert!(err.to_string().contains("2 properties"));
    }
}
