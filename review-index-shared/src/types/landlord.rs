//! Landlord document type.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApartmentId, LandlordId, ReviewId};
use super::Searchable;

/// Free-form postal address with every component optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    /// Returns true if no component is set.
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

/// Landlord as stored in the landlords collection.
///
/// # Derived fields
///
/// - `avg_rating`: mean `overall_rating` of the landlord's reviews, `None` until one exists
/// - `reviews`: ids of reviews naming this landlord, in insertion order
/// - `properties`: ids of apartments naming this landlord, in insertion order
/// - `searchable_keywords`: prefix keywords of `name`
///
/// None of these are ever set by a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Landlord {
    pub id: LandlordId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub avg_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<ReviewId>,
    #[serde(default)]
    pub properties: Vec<ApartmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub searchable_keywords: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Landlord {
    /// Create a landlord with no reviews, no properties and no rating.
    pub fn new(id: LandlordId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            contact: None,
            avg_rating: None,
            profile_photo: None,
            photos: Vec::new(),
            reviews: Vec::new(),
            properties: Vec::new(),
            address: None,
            searchable_keywords: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if any apartment or review still points at this landlord.
    pub fn has_dependents(&self) -> bool {
        !self.properties.is_empty() || !self.reviews.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Searchable for Landlord {
    fn search_name(&self) -> &str {
        &self.name
    }

    fn searchable_keywords(&self) -> &BTreeSet<String> {
        &self.searchable_keywords
    }

    fn replace_searchable_keywords(&mut self, keywords: BTreeSet<String>) {
        self.searchable_keywords = keywords;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_landlord_has_null_rating() {
        let landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
        assert!(landlord.avg_rating.is_none());
        assert!(!landlord.has_dependents());

        let value = serde_json::to_value(&landlord).unwrap();
        assert!(value["avgRating"].is_null());
    }

    #[test]
    fn test_has_dependents() {
        let mut landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
        landlord.reviews.push(ReviewId::new("R1"));
        assert!(landlord.has_dependents());

        landlord.reviews.clear();
        landlord.properties.push(ApartmentId::new("A1"));
        assert!(landlord.has_dependents());
    }

    #[test]
    fn test_address_components_are_optional() {
        let address: Address = serde_json::from_str(r#"{"city":"Ithaca"}"#).unwrap();
        assert_eq!(address.city.as_deref(), Some("Ithaca"));
        assert!(address.street.is_none());
        assert!(!address.is_empty());
        assert!(Address::default().is_empty());
    }
}
