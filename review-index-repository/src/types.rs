//! Collection, document and filter types for document store operations.

use std::fmt;

use review_index_shared::{Apartment, ApartmentId, Landlord, LandlordId, Review};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// The three logical collections of the review platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Apartments,
    Landlords,
    Reviews,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Apartments => "apartments",
            Collection::Landlords => "landlords",
            Collection::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document belonging to one of the three collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Apartment(Apartment),
    Landlord(Landlord),
    Review(Review),
}

impl Document {
    /// The collection this document is stored in.
    pub fn collection(&self) -> Collection {
        match self {
            Document::Apartment(_) => Collection::Apartments,
            Document::Landlord(_) => Collection::Landlords,
            Document::Review(_) => Collection::Reviews,
        }
    }

    /// The document's identifier within its collection.
    pub fn id(&self) -> &str {
        match self {
            Document::Apartment(apt) => apt.id.as_str(),
            Document::Landlord(landlord) => landlord.id.as_str(),
            Document::Review(review) => review.id.as_str(),
        }
    }

    /// Returns true if the document satisfies `filter`.
    pub fn matches(&self, filter: &DocumentFilter) -> bool {
        match (filter, self) {
            (DocumentFilter::All, _) => true,
            (DocumentFilter::ByLandlord(id), Document::Apartment(apt)) => {
                apt.landlord_id.as_ref() == Some(id)
            }
            (DocumentFilter::ByLandlord(id), Document::Review(review)) => {
                &review.landlord_id == id
            }
            (DocumentFilter::ByApartment(id), Document::Review(review)) => {
                review.apt_id.as_ref() == Some(id)
            }
            (DocumentFilter::HasKeyword(keyword), Document::Apartment(apt)) => {
                apt.searchable_keywords.contains(keyword)
            }
            (DocumentFilter::HasKeyword(keyword), Document::Landlord(landlord)) => {
                landlord.searchable_keywords.contains(keyword)
            }
            _ => false,
        }
    }

    /// Encode the document as the JSON shape persisted by stores.
    pub fn to_value(&self) -> Result<serde_json::Value, StoreError> {
        let value = match self {
            Document::Apartment(apt) => serde_json::to_value(apt)?,
            Document::Landlord(landlord) => serde_json::to_value(landlord)?,
            Document::Review(review) => serde_json::to_value(review)?,
        };
        Ok(value)
    }

    /// Decode a persisted JSON document from `collection`.
    pub fn from_value(collection: Collection, value: serde_json::Value) -> Result<Self, StoreError> {
        let document = match collection {
            Collection::Apartments => Document::Apartment(serde_json::from_value(value)?),
            Collection::Landlords => Document::Landlord(serde_json::from_value(value)?),
            Collection::Reviews => Document::Review(serde_json::from_value(value)?),
        };
        Ok(document)
    }

    pub fn into_apartment(self) -> Result<Apartment, StoreError> {
        match self {
            Document::Apartment(apt) => Ok(apt),
            other => Err(StoreError::collection_mismatch(
                Collection::Apartments,
                other.collection(),
            )),
        }
    }

    pub fn into_landlord(self) -> Result<Landlord, StoreError> {
        match self {
            Document::Landlord(landlord) => Ok(landlord),
            other => Err(StoreError::collection_mismatch(
                Collection::Landlords,
                other.collection(),
            )),
        }
    }

    pub fn into_review(self) -> Result<Review, StoreError> {
        match self {
            Document::Review(review) => Ok(review),
            other => Err(StoreError::collection_mismatch(
                Collection::Reviews,
                other.collection(),
            )),
        }
    }
}

impl From<Apartment> for Document {
    fn from(apt: Apartment) -> Self {
        Document::Apartment(apt)
    }
}

impl From<Landlord> for Document {
    fn from(landlord: Landlord) -> Self {
        Document::Landlord(landlord)
    }
}

impl From<Review> for Document {
    fn from(review: Review) -> Self {
        Document::Review(review)
    }
}

/// Field predicate for `DocumentStore::find`.
///
/// Filters that do not apply to a collection (e.g. `ByApartment` on landlords)
/// match nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Every document in the collection.
    All,
    /// Apartments or reviews whose `landlord_id` equals the given id.
    ByLandlord(LandlordId),
    /// Reviews whose `apt_id` equals the given id.
    ByApartment(ApartmentId),
    /// Apartments or landlords whose keyword set contains the exact keyword.
    HasKeyword(String),
}
