//! # Review Index Shared
//!
//! This crate defines the document types shared across the apartment review index:
//! apartments, landlords and reviews, plus the typed identifiers that reference them.

pub mod types;

pub use types::{
    rating_in_range, Address, Apartment, ApartmentId, Area, DetailedRatings, Landlord,
    LandlordId, Review, ReviewId, Searchable, RATING_MAX, RATING_MIN,
};
