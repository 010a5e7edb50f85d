//! Document store trait definition.
//!
//! This module defines the abstract interface over the document database holding
//! apartments, landlords and reviews.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::types::{Collection, Document, DocumentFilter};

/// Abstracts the underlying document database.
///
/// Implementations are constructed once at process start and injected into the
/// consistency layer as `Arc<dyn DocumentStore>`, which keeps a mock or in-memory
/// store a drop-in replacement in tests.
///
/// The store offers single-document atomicity only. There are no multi-document
/// transactions and no foreign keys; callers that need either build them on top.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Document))` - If the document exists
    /// * `Ok(None)` - If no document has that id
    /// * `Err(StoreError)` - If the read fails
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Return every document in `collection` satisfying `filter`, in insertion order.
    async fn find(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert or fully replace a document in its own collection.
    ///
    /// Replacing an existing document keeps its original insertion position, and
    /// so does putting back a document that was deleted.
    async fn put(&self, document: &Document) -> Result<(), StoreError>;

    /// Remove a document. Removing a missing document succeeds.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Release the underlying connection. Called once at shutdown.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
