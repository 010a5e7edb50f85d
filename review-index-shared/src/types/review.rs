//! Review document type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApartmentId, LandlordId, ReviewId};

/// Lowest accepted rating value.
pub const RATING_MIN: f64 = 0.0;

/// Highest accepted rating value.
pub const RATING_MAX: f64 = 5.0;

/// Returns true if `value` is a finite rating within [`RATING_MIN`, `RATING_MAX`].
pub fn rating_in_range(value: f64) -> bool {
    value.is_finite() && (RATING_MIN..=RATING_MAX).contains(&value)
}

/// The six named sub-scores a reviewer gives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetailedRatings {
    pub location: f64,
    pub safety: f64,
    pub value: f64,
    pub maintenance: f64,
    pub communication: f64,
    pub conditions: f64,
}

impl DetailedRatings {
    /// Set every sub-score to the same value.
    pub fn uniform(score: f64) -> Self {
        Self {
            location: score,
            safety: score,
            value: score,
            maintenance: score,
            communication: score,
            conditions: score,
        }
    }

    /// Sub-scores paired with their field names.
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("location", self.location),
            ("safety", self.safety),
            ("value", self.value),
            ("maintenance", self.maintenance),
            ("communication", self.communication),
            ("conditions", self.conditions),
        ]
    }

    /// Arithmetic mean of the six sub-scores.
    pub fn mean(&self) -> f64 {
        let named = self.named();
        named.iter().map(|(_, score)| score).sum::<f64>() / named.len() as f64
    }

    /// Name of the first sub-score outside the accepted range, if any.
    pub fn first_out_of_range(&self) -> Option<(&'static str, f64)> {
        self.named()
            .into_iter()
            .find(|(_, score)| !rating_in_range(*score))
    }
}

/// Review as stored in the reviews collection.
///
/// `landlord_id` is always set and drives the landlord's derived fields.
/// `apt_id` is optional and may dangle after the apartment is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apt_id: Option<ApartmentId>,
    pub landlord_id: LandlordId,
    pub date: DateTime<Utc>,
    pub detailed_ratings: DetailedRatings,
    pub overall_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<u32>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub review_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Create a review whose overall rating is the mean of its detailed ratings.
    pub fn new(id: ReviewId, landlord_id: LandlordId, detailed_ratings: DetailedRatings) -> Self {
        let now = Utc::now();
        Self {
            id,
            apt_id: None,
            landlord_id,
            date: now,
            overall_rating: detailed_ratings.mean(),
            detailed_ratings,
            likes: None,
            photos: Vec::new(),
            review_text: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
