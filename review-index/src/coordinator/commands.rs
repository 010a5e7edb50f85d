//! Write request types accepted by the coordinator.
//!
//! None of these carry derived fields: keyword sets, ratings and reference lists
//! are computed, never supplied.

use chrono::{DateTime, Utc};
use review_index_repository::Collection;
use review_index_shared::{
    Address, Apartment, ApartmentId, Area, DetailedRatings, Landlord, LandlordId, Review,
    ReviewId,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Absent → `None` (leave unchanged), `null` → `Some(None)` (clear),
/// value → `Some(Some(v))` (set).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Request to create an apartment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewApartment {
    /// Caller-chosen id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ApartmentId>,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub num_baths: u32,
    #[serde(default)]
    pub num_beds: u32,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub area: Area,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_id: Option<LandlordId>,
}

impl NewApartment {
    pub fn new(name: impl Into<String>, address: impl Into<String>, area: Area) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: address.into(),
            num_baths: 0,
            num_beds: 0,
            photos: Vec::new(),
            area,
            landlord_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ApartmentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_landlord(mut self, landlord_id: impl Into<LandlordId>) -> Self {
        self.landlord_id = Some(landlord_id.into());
        self
    }

    /// Build the document, without keywords or links.
    pub(crate) fn into_document(self) -> Apartment {
        let mut apt = Apartment::new(
            self.id.unwrap_or_else(ApartmentId::generate),
            self.name,
            self.address,
            self.area,
        );
        apt.num_baths = self.num_baths;
        apt.num_beds = self.num_beds;
        apt.photos = self.photos;
        apt.landlord_id = self.landlord_id;
        apt
    }
}

/// Partial update of an apartment. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_baths: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    /// `Some(None)` unlinks the apartment from its landlord.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub landlord_id: Option<Option<LandlordId>>,
}

/// Request to create a landlord.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewLandlord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LandlordId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl NewLandlord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            contact: None,
            profile_photo: None,
            photos: Vec::new(),
            address: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<LandlordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn into_document(self) -> Landlord {
        let mut landlord = Landlord::new(self.id.unwrap_or_else(LandlordId::generate), self.name);
        landlord.contact = self.contact;
        landlord.profile_photo = self.profile_photo;
        landlord.photos = self.photos;
        landlord.address = self.address.filter(|address| !address.is_empty());
        landlord
    }
}

/// Partial update of a landlord's caller-owned fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LandlordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_photo: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<Option<Address>>,
}

/// Request to create a review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ReviewId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apt_id: Option<ApartmentId>,
    pub landlord_id: LandlordId,
    /// Defaults to the time of creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub detailed_ratings: DetailedRatings,
    /// Overrides the mean of `detailed_ratings` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_rating: Option<f64>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub review_text: String,
}

impl NewReview {
    pub fn new(landlord_id: impl Into<LandlordId>, detailed_ratings: DetailedRatings) -> Self {
        Self {
            id: None,
            apt_id: None,
            landlord_id: landlord_id.into(),
            date: None,
            detailed_ratings,
            overall_rating: None,
            photos: Vec::new(),
            review_text: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ReviewId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_apartment(mut self, apt_id: impl Into<ApartmentId>) -> Self {
        self.apt_id = Some(apt_id.into());
        self
    }

    pub fn with_overall_rating(mut self, rating: f64) -> Self {
        self.overall_rating = Some(rating);
        self
    }

    pub(crate) fn into_document(self) -> Review {
        let mut review = Review::new(
            self.id.unwrap_or_else(ReviewId::generate),
            self.landlord_id,
            self.detailed_ratings,
        );
        if let Some(overall) = self.overall_rating {
            review.overall_rating = overall;
        }
        if let Some(date) = self.date {
            review.date = date;
        }
        review.apt_id = self.apt_id;
        review.photos = self.photos;
        review.review_text = self.review_text;
        review
    }
}

/// Partial update of a review.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub apt_id: Option<Option<ApartmentId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_id: Option<LandlordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Also recomputes `overall_rating` unless that is supplied as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_ratings: Option<DetailedRatings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
}

/// A write request in serialized form, tagged by operation.
///
/// ```
/// use review_index::coordinator::WriteCommand;
///
/// let command: WriteCommand = serde_json::from_str(
///     r#"{"op":"createLandlord","id":"L1","name":"Jane Doe"}"#,
/// ).unwrap();
/// assert!(matches!(command, WriteCommand::CreateLandlord(_)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum WriteCommand {
    CreateApartment(NewApartment),
    UpdateApartment {
        id: ApartmentId,
        update: ApartmentUpdate,
    },
    DeleteApartment {
        id: ApartmentId,
    },
    CreateLandlord(NewLandlord),
    UpdateLandlord {
        id: LandlordId,
        update: LandlordUpdate,
    },
    DeleteLandlord {
        id: LandlordId,
    },
    CreateReview(NewReview),
    UpdateReview {
        id: ReviewId,
        update: ReviewUpdate,
    },
    DeleteReview {
        id: ReviewId,
    },
    LikeReview {
        id: ReviewId,
    },
}

impl WriteCommand {
    /// Operation name used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            WriteCommand::CreateApartment(_) => "create_apartment",
            WriteCommand::UpdateApartment { .. } => "update_apartment",
            WriteCommand::DeleteApartment { .. } => "delete_apartment",
            WriteCommand::CreateLandlord(_) => "create_landlord",
            WriteCommand::UpdateLandlord { .. } => "update_landlord",
            WriteCommand::DeleteLandlord { .. } => "delete_landlord",
            WriteCommand::CreateReview(_) => "create_review",
            WriteCommand::UpdateReview { .. } => "update_review",
            WriteCommand::DeleteReview { .. } => "delete_review",
            WriteCommand::LikeReview { .. } => "like_review",
        }
    }
}

/// Result of a committed write.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WriteOutcome {
    Apartment(Apartment),
    Landlord(Landlord),
    Review(Review),
    Deleted { collection: Collection, id: String },
}
