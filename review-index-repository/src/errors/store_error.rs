//! Document store error types.
//!
//! This module defines the unified error type returned by every `DocumentStore`
//! implementation, from connection problems to documents landing in the wrong
//! collection.

use thiserror::Error;

use crate::types::Collection;

/// Unified errors from document store operations.
///
/// Used by the `DocumentStore` trait and `DocumentService`. A read that finds no
/// document is not an error; it is reported as `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store is unreachable or has been closed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to write a document.
    #[error("Put error: {0}")]
    PutError(String),

    /// Failed to encode or decode a stored document.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A document was found in a collection other than the one requested.
    #[error("Collection mismatch: expected {expected}, found {found}")]
    CollectionMismatch {
        expected: Collection,
        found: Collection,
    },
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a put error.
    pub fn put(msg: impl Into<String>) -> Self {
        Self::PutError(msg.into())
    }

    /// Create a collection mismatch error.
    pub fn collection_mismatch(expected: Collection, found: Collection) -> Self {
        Self::CollectionMismatch { expected, found }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_become_serialization_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{not json")
            .map_err(StoreError::from)
            .unwrap_err();
        assert!(matches!(err, StoreError::SerializationError(_)));
    }

    #[test]
    fn test_mismatch_names_both_collections() {
        let err = StoreError::collection_mismatch(Collection::Reviews, Collection::Landlords);
        assert_eq!(
            err.to_string(),
            "Collection mismatch: expected reviews, found landlords"
        );
    }
}
