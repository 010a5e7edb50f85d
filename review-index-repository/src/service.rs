//! Typed document service.
//!
//! This module provides the typed facade over a `DocumentStore`. Application code
//! uses it to read and write apartments, landlords and reviews without handling
//! the untyped `Document` enum directly.

use std::sync::Arc;

use review_index_shared::{Apartment, ApartmentId, Landlord, LandlordId, Review, ReviewId};
use tracing::instrument;

use crate::errors::StoreError;
use crate::interfaces::DocumentStore;
use crate::types::{Collection, Document, DocumentFilter};

/// The main service for typed access to the document store.
///
/// Cloning is cheap; every clone shares the same underlying store.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use review_index_repository::{DocumentService, InMemoryStore};
/// use review_index_shared::{Landlord, LandlordId};
///
/// # async fn example() -> Result<(), review_index_repository::StoreError> {
/// let service = DocumentService::new(Arc::new(InMemoryStore::new()));
/// service.put(Landlord::new(LandlordId::new("L1"), "Jane Doe")).await?;
///
/// let landlord = service.get_landlord(&LandlordId::new("L1")).await?;
/// assert_eq!(landlord.map(|l| l.name), Some("Jane Doe".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
}

impl DocumentService {
    /// Create a service over an injected store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The underlying untyped store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn get_apartment(&self, id: &ApartmentId) -> Result<Option<Apartment>, StoreError> {
        self.store
            .get(Collection::Apartments, id.as_str())
            .await?
            .map(Document::into_apartment)
            .transpose()
    }

    pub async fn get_landlord(&self, id: &LandlordId) -> Result<Option<Landlord>, StoreError> {
        self.store
            .get(Collection::Landlords, id.as_str())
            .await?
            .map(Document::into_landlord)
            .transpose()
    }

    pub async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        self.store
            .get(Collection::Reviews, id.as_str())
            .await?
            .map(Document::into_review)
            .transpose()
    }

    /// Apartments whose `landlord_id` is `landlord_id`, in insertion order.
    #[instrument(skip(self, landlord_id), fields(landlord_id = %landlord_id))]
    pub async fn apartments_for_landlord(
        &self,
        landlord_id: &LandlordId,
    ) -> Result<Vec<Apartment>, StoreError> {
        self.find_apartments(&DocumentFilter::ByLandlord(landlord_id.clone()))
            .await
    }

    /// Reviews whose `landlord_id` is `landlord_id`, in insertion order.
    #[instrument(skip(self, landlord_id), fields(landlord_id = %landlord_id))]
    pub async fn reviews_for_landlord(
        &self,
        landlord_id: &LandlordId,
    ) -> Result<Vec<Review>, StoreError> {
        self.find_reviews(&DocumentFilter::ByLandlord(landlord_id.clone()))
            .await
    }

    /// Reviews whose `apt_id` is `apt_id`, in insertion order.
    pub async fn reviews_for_apartment(
        &self,
        apt_id: &ApartmentId,
    ) -> Result<Vec<Review>, StoreError> {
        self.find_reviews(&DocumentFilter::ByApartment(apt_id.clone()))
            .await
    }

    pub async fn find_apartments(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<Apartment>, StoreError> {
        self.store
            .find(Collection::Apartments, filter)
            .await?
            .into_iter()
            .map(Document::into_apartment)
            .collect()
    }

    pub async fn find_landlords(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<Landlord>, StoreError> {
        self.store
            .find(Collection::Landlords, filter)
            .await?
            .into_iter()
            .map(Document::into_landlord)
            .collect()
    }

    pub async fn find_reviews(&self, filter: &DocumentFilter) -> Result<Vec<Review>, StoreError> {
        self.store
            .find(Collection::Reviews, filter)
            .await?
            .into_iter()
            .map(Document::into_review)
            .collect()
    }

    /// Insert or replace any document type.
    pub async fn put(&self, document: impl Into<Document>) -> Result<(), StoreError> {
        self.store.put(&document.into()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use review_index_shared::{Area, DetailedRatings};

    use crate::memory::InMemoryStore;

    /// Store that answers every lookup with a landlord, whatever was asked for.
    struct MisroutingStore;

    #[async_trait]
    impl DocumentStore for MisroutingStore {
        async fn get(
            &self,
            _collection: Collection,
            id: &str,
        ) -> Result<Option<Document>, StoreError> {
            Ok(Some(Document::from(Landlord::new(LandlordId::new(id), "Wrong"))))
        }

        async fn find(
            &self,
            _collection: Collection,
            _filter: &DocumentFilter,
        ) -> Result<Vec<Document>, StoreError> {
            Ok(vec![Document::from(Landlord::new(LandlordId::new("L1"), "Wrong"))])
        }

        async fn put(&self, _document: &Document) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _collection: Collection, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn service() -> DocumentService {
        DocumentService::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_reviews_for_landlord_filters() {
        let service = service();
        let l1 = LandlordId::new("L1");
        let l2 = LandlordId::new("L2");

        for (id, landlord) in [("R1", &l1), ("R2", &l2), ("R3", &l1)] {
            let review = Review::new(ReviewId::new(id), landlord.clone(), DetailedRatings::uniform(3.0));
            service.put(review).await.unwrap();
        }

        let reviews = service.reviews_for_landlord(&l1).await.unwrap();
        let ids: Vec<&str> = reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R3"]);
    }

    #[tokio::test]
    async fn test_reviews_for_apartment() {
        let service = service();
        let apt = ApartmentId::new("A1");

        let mut review = Review::new(ReviewId::new("R1"), LandlordId::new("L1"), DetailedRatings::uniform(2.0));
        review.apt_id = Some(apt.clone());
        service.put(review).await.unwrap();
        service
            .put(Review::new(ReviewId::new("R2"), LandlordId::new("L1"), DetailedRatings::uniform(2.0)))
            .await
            .unwrap();

        let reviews = service.reviews_for_apartment(&apt).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id.as_str(), "R1");
    }

    #[tokio::test]
    async fn test_apartments_for_landlord() {
        let service = service();
        let mut apt = Apartment::new(ApartmentId::new("A1"), "Court", "addr", Area::West);
        apt.landlord_id = Some(LandlordId::new("L1"));
        service.put(apt).await.unwrap();

        let apts = service.apartments_for_landlord(&LandlordId::new("L1")).await.unwrap();
        assert_eq!(apts.len(), 1);
        assert!(service
            .apartments_for_landlord(&LandlordId::new("L2"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_wrong_collection_is_reported() {
        let service = DocumentService::new(Arc::new(MisroutingStore));

        let err = service.get_review(&ReviewId::new("R1")).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionMismatch { .. }));

        let err = service.find_apartments(&DocumentFilter::All).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionMismatch { .. }));
    }
}
