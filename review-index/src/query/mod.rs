//! Keyword search and explicit joins over stored documents.
//!
//! Nothing here takes locks. Results reflect whatever has been committed at the
//! time of each read.

use std::sync::Arc;

use review_index_repository::{Collection, DocumentFilter, DocumentService, DocumentStore};
use review_index_shared::{Apartment, ApartmentId, Landlord, LandlordId, Review, Searchable};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::errors::ReviewIndexError;

/// A landlord with its properties and reviews resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LandlordView {
    pub landlord: Landlord,
    pub properties: Vec<Apartment>,
    pub reviews: Vec<Review>,
}

/// An apartment with its landlord and reviews resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentView {
    pub apartment: Apartment,
    pub landlord: Option<Landlord>,
    pub reviews: Vec<Review>,
}

/// Lowercased whitespace-separated words of a search query.
fn query_words(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Keep the documents whose keyword set contains every query word.
fn matching<D: Searchable>(candidates: Vec<D>, words: &[String]) -> Vec<D> {
    candidates
        .into_iter()
        .filter(|doc| {
            let keywords = doc.searchable_keywords();
            words.iter().all(|word| keywords.contains(word))
        })
        .collect()
}

/// Read-side helpers.
#[derive(Clone)]
pub struct ReviewQueries {
    documents: DocumentService,
}

impl ReviewQueries {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents: DocumentService::new(store),
        }
    }

    /// Apartments whose names contain a word starting with each query word.
    ///
    /// An empty query matches nothing.
    #[instrument(skip(self))]
    pub async fn search_apartments(&self, query: &str) -> Result<Vec<Apartment>, ReviewIndexError> {
        let words = query_words(query);
        let Some(first) = words.first() else {
            return Ok(Vec::new());
        };
        let candidates = self
            .documents
            .find_apartments(&DocumentFilter::HasKeyword(first.clone()))
            .await?;
        let hits = matching(candidates, &words);
        debug!(hits = hits.len(), "Apartment search finished");
        Ok(hits)
    }

    /// Landlords whose names contain a word starting with each query word.
    #[instrument(skip(self))]
    pub async fn search_landlords(&self, query: &str) -> Result<Vec<Landlord>, ReviewIndexError> {
        let words = query_words(query);
        let Some(first) = words.first() else {
            return Ok(Vec::new());
        };
        let candidates = self
            .documents
            .find_landlords(&DocumentFilter::HasKeyword(first.clone()))
            .await?;
        let hits = matching(candidates, &words);
        debug!(hits = hits.len(), "Landlord search finished");
        Ok(hits)
    }

    /// Load a landlord together with the documents its reference lists name.
    ///
    /// Ids that no longer resolve are skipped with a warning.
    #[instrument(skip(self, id), fields(landlord_id = %id))]
    pub async fn hydrate_landlord(&self, id: &LandlordId) -> Result<LandlordView, ReviewIndexError> {
        let landlord = self
            .documents
            .get_landlord(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Landlords, id.as_str()))?;

        let mut properties = Vec::with_capacity(landlord.properties.len());
        for apt_id in &landlord.properties {
            match self.documents.get_apartment(apt_id).await? {
                Some(apartment) => properties.push(apartment),
                None => warn!(apt_id = %apt_id, "Landlord property does not resolve"),
            }
        }

        let mut reviews = Vec::with_capacity(landlord.reviews.len());
        for review_id in &landlord.reviews {
            match self.documents.get_review(review_id).await? {
                Some(review) => reviews.push(review),
                None => warn!(review_id = %review_id, "Landlord review does not resolve"),
            }
        }

        Ok(LandlordView {
            landlord,
            properties,
            reviews,
        })
    }

    /// Load an apartment together with its landlord and reviews.
    #[instrument(skip(self, id), fields(apt_id = %id))]
    pub async fn hydrate_apartment(
        &self,
        id: &ApartmentId,
    ) -> Result<ApartmentView, ReviewIndexError> {
        let apartment = self
            .documents
            .get_apartment(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Apartments, id.as_str()))?;

        let landlord = match &apartment.landlord_id {
            Some(landlord_id) => self.documents.get_landlord(landlord_id).await?,
            None => None,
        };
        let reviews = self.documents.reviews_for_apartment(id).await?;

        Ok(ApartmentView {
            apartment,
            landlord,
            reviews,
        })
    }
}
