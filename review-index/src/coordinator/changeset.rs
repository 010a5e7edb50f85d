//! Staged multi-document writes.
//!
//! The store only guarantees atomicity per document. A `Changeset` collects every
//! document write a request needs, together with the prior version of each
//! document, and applies them in order. If a write fails part-way, the writes
//! already applied are undone in reverse order from those prior versions.

use std::sync::Arc;

use review_index_repository::{Collection, Document, DocumentStore, StoreError};
use tracing::{debug, error, instrument, warn};

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    Put(Document),
    Delete { collection: Collection, id: String },
}

impl StagedWrite {
    fn collection(&self) -> Collection {
        match self {
            StagedWrite::Put(document) => document.collection(),
            StagedWrite::Delete { collection, .. } => *collection,
        }
    }

    fn id(&self) -> &str {
        match self {
            StagedWrite::Put(document) => document.id(),
            StagedWrite::Delete { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    write: StagedWrite,
    /// The document as it was before this request; `None` if it did not exist.
    before: Option<Document>,
}

/// Ordered set of writes that commit together or not at all.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    entries: Vec<Entry>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert or replacement. `before` is the stored version, if any.
    pub fn put(&mut self, document: impl Into<Document>, before: Option<Document>) {
        self.entries.push(Entry {
            write: StagedWrite::Put(document.into()),
            before,
        });
    }

    /// Stage removal of `before`, which must be the stored version.
    pub fn delete(&mut self, before: impl Into<Document>) {
        let before = before.into();
        self.entries.push(Entry {
            write: StagedWrite::Delete {
                collection: before.collection(),
                id: before.id().to_string(),
            },
            before: Some(before),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The staged writes in commit order.
    pub fn writes(&self) -> impl Iterator<Item = &StagedWrite> {
        self.entries.iter().map(|entry| &entry.write)
    }

    /// Apply every staged write through `store`.
    ///
    /// On the first failure, writes already applied are compensated and the
    /// original error is returned. The store is never retried.
    #[instrument(skip(self, store), fields(writes = self.entries.len()))]
    pub async fn commit(self, store: Arc<dyn DocumentStore>) -> Result<(), StoreError> {
        for (applied, entry) in self.entries.iter().enumerate() {
            let result = match &entry.write {
                StagedWrite::Put(document) => store.put(document).await,
                StagedWrite::Delete { collection, id } => store.delete(*collection, id).await,
            };

            if let Err(e) = result {
                warn!(
                    collection = %entry.write.collection(),
                    id = entry.write.id(),
                    error = %e,
                    applied,
                    "Staged write failed, compensating"
                );
                self.compensate(store.as_ref(), applied).await;
                return Err(e);
            }
        }

        debug!("Changeset committed");
        Ok(())
    }

    /// Restore the prior version of the first `applied` entries, newest first.
    async fn compensate(&self, store: &dyn DocumentStore, applied: usize) {
        for entry in self.entries[..applied].iter().rev() {
            let collection = entry.write.collection();
            let id = entry.write.id();
            let result = match &entry.before {
                Some(document) => store.put(document).await,
                None => store.delete(collection, id).await,
            };
            if let Err(e) = result {
                error!(
                    collection = %collection,
                    id = id,
                    error = %e,
                    "Compensation failed, document may be inconsistent"
                );
            }
        }
    }
}
