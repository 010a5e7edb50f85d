//! In-memory document store implementation.
//!
//! Documents are kept as serialized JSON values, the same shape a document
//! database would persist, and decoded on every read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::interfaces::DocumentStore;
use crate::types::{Collection, Document, DocumentFilter};

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Position in insertion order; kept when the document is replaced.
    sequence: u64,
    value: serde_json::Value,
}

#[derive(Debug, Default)]
struct Collections {
    next_sequence: u64,
    documents: HashMap<Collection, HashMap<String, StoredDocument>>,
    /// Sequences of deleted documents, reused if the same id is put again.
    tombstones: HashMap<Collection, HashMap<String, u64>>,
}

/// Document store held entirely in process memory.
///
/// Used by the replay binary and by tests. Each call is atomic for the single
/// document it touches, matching the guarantees of the real store.
///
/// A document put again under an id that was deleted takes back its old
/// position in `find` results, so a rolled-back delete leaves order unchanged.
///
/// # Example
///
/// ```
/// use review_index_repository::{Collection, Document, DocumentStore, InMemoryStore};
/// use review_index_shared::{Landlord, LandlordId};
///
/// # async fn example() -> Result<(), review_index_repository::StoreError> {
/// let store = InMemoryStore::new();
/// let landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
/// store.put(&Document::from(landlord)).await?;
///
/// assert!(store.get(Collection::Landlords, "L1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Collections>,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Created in-memory document store");
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: Collection) -> usize {
        self.inner
            .read()
            .await
            .documents
            .get(&collection)
            .map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection).await == 0
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::connection("store has been closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        let inner = self.inner.read().await;
        let Some(stored) = inner
            .documents
            .get(&collection)
            .and_then(|docs| docs.get(id))
        else {
            return Ok(None);
        };
        Document::from_value(collection, stored.value.clone()).map(Some)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, StoreError> {
        self.ensure_open()?;
        let inner = self.inner.read().await;
        let Some(docs) = inner.documents.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut ordered: Vec<&StoredDocument> = docs.values().collect();
        ordered.sort_by_key(|stored| stored.sequence);

        let mut matches = Vec::new();
        for stored in ordered {
            let document = Document::from_value(collection, stored.value.clone())?;
            if document.matches(filter) {
                matches.push(document);
            }
        }

        debug!(
            collection = %collection,
            filter = ?filter,
            count = matches.len(),
            "Find completed"
        );
        Ok(matches)
    }

    async fn put(&self, document: &Document) -> Result<(), StoreError> {
        self.ensure_open()?;
        let collection = document.collection();
        let id = document.id().to_string();
        let value = document.to_value()?;

        let mut inner = self.inner.write().await;
        let inner = &mut *inner;
        let docs = inner.documents.entry(collection).or_default();
        let inserted = match docs.get_mut(&id) {
            Some(existing) => {
                existing.value = value;
                false
            }
            None => {
                let restored = inner
                    .tombstones
                    .get_mut(&collection)
                    .and_then(|tombstones| tombstones.remove(&id));
                let sequence = match restored {
                    Some(sequence) => sequence,
                    None => {
                        inner.next_sequence += 1;
                        inner.next_sequence - 1
                    }
                };
                docs.insert(id.clone(), StoredDocument { sequence, value });
                true
            }
        };

        debug!(collection = %collection, id = %id, inserted, "Document stored");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.write().await;
        let removed = inner
            .documents
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        if let Some(stored) = &removed {
            inner
                .tombstones
                .entry(collection)
                .or_default()
                .insert(id.to_string(), stored.sequence);
        }
        let removed = removed.is_some();

        debug!(collection = %collection, id = %id, removed, "Document deleted");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        info!("In-memory document store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_index_shared::{Apartment, ApartmentId, Area, Landlord, LandlordId};

    fn apartment(id: &str, landlord: Option<&str>) -> Document {
        let mut apt = Apartment::new(ApartmentId::new(id), format!("Apartment {}", id), "addr", Area::Other);
        apt.landlord_id = landlord.map(LandlordId::from);
        Document::from(apt)
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryStore::new();
        let result = store.get(Collection::Apartments, "nope").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new();
        let doc = apartment("A1", Some("L1"));
        store.put(&doc).await.unwrap();

        let fetched = store.get(Collection::Apartments, "A1").await.unwrap();
        assert_eq!(fetched, Some(doc));
        assert_eq!(store.len(Collection::Apartments).await, 1);
        assert!(store.is_empty(Collection::Reviews).await);
    }

    #[tokio::test]
    async fn test_find_preserves_insertion_order_across_replace() {
        let store = InMemoryStore::new();
        store.put(&apartment("B", Some("L1"))).await.unwrap();
        store.put(&apartment("A", Some("L1"))).await.unwrap();
        store.put(&apartment("C", Some("L2"))).await.unwrap();

        // Replacing B must not move it to the back.
        store.put(&apartment("B", Some("L1"))).await.unwrap();

        let found = store
            .find(
                Collection::Apartments,
                &DocumentFilter::ByLandlord(LandlordId::new("L1")),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_reinserted_document_keeps_its_position() {
        let store = InMemoryStore::new();
        let first = apartment("A1", Some("L1"));
        store.put(&first).await.unwrap();
        store.put(&apartment("A2", Some("L1"))).await.unwrap();

        store.delete(Collection::Apartments, "A1").await.unwrap();
        store.put(&first).await.unwrap();
        store.put(&apartment("A3", Some("L1"))).await.unwrap();

        let found = store
            .find(Collection::Apartments, &DocumentFilter::All)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["A1", "A2", "A3"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.delete(Collection::Reviews, "R1").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = InMemoryStore::new();
        store
            .put(&Document::from(Landlord::new(LandlordId::new("L1"), "Jane")))
            .await
            .unwrap();
        store.close().await.unwrap();

        let err = store.get(Collection::Landlords, "L1").await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionError(_)));
    }
}
