//! Apartment document type.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApartmentId, LandlordId};
use super::Searchable;

/// Neighbourhood an apartment is located in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Area {
    Collegetown,
    West,
    North,
    Downtown,
    #[default]
    Other,
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Area::Collegetown => "COLLEGETOWN",
            Area::West => "WEST",
            Area::North => "NORTH",
            Area::Downtown => "DOWNTOWN",
            Area::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// Apartment as stored in the apartments collection.
///
/// `landlord_id` is a back-reference to the owning landlord. The landlord's
/// `properties` list mirrors it and is maintained by the aggregate layer.
/// `searchable_keywords` is derived from `name` and must not be edited directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Apartment {
    pub id: ApartmentId,
    pub name: String,
    pub address: String,
    pub num_baths: u32,
    pub num_beds: u32,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub area: Area,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landlord_id: Option<LandlordId>,
    #[serde(default)]
    pub searchable_keywords: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Apartment {
    /// Create an apartment with empty derived fields and both timestamps set to now.
    pub fn new(
        id: ApartmentId,
        name: impl Into<String>,
        address: impl Into<String>,
        area: Area,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            address: address.into(),
            num_baths: 0,
            num_beds: 0,
            photos: Vec::new(),
            area,
            landlord_id: None,
            searchable_keywords: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the document as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Searchable for Apartment {
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
    fn test_area_serializes_screaming_case() {
        let json = serde_json::to_string(&Area::Collegetown).unwrap();
        assert_eq!(json, "\"COLLEGETOWN\"");

        let area: Area = serde_json::from_str("\"DOWNTOWN\"").unwrap();
        assert_eq!(area, Area::Downtown);
    }

    #[test]
    fn test_new_apartment_has_no_derived_state() {
        let apt = Apartment::new(ApartmentId::new("A1"), "Collegetown Court", "111 Dryden Rd", Area::Collegetown);
        assert!(apt.landlord_id.is_none());
        assert!(apt.searchable_keywords.is_empty());
        assert_eq!(apt.created_at, apt.updated_at);
    }

    #[test]
    fn test_camel_case_field_names() {
        let apt = Apartment::new(ApartmentId::new("A1"), "Court", "addr", Area::West);
        let value = serde_json::to_value(&apt).unwrap();
        assert!(value.get("numBaths").is_some());
        assert!(value.get("searchableKeywords").is_some());
        assert!(value.get("landlordId").is_none());
    }
}
