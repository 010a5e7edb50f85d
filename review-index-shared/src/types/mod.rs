//! This module defines the document types stored in the three collections and the
//! typed identifiers that link them.

use std::collections::BTreeSet;

pub mod apartment;
pub mod ids;
pub mod landlord;
pub mod review;

pub use apartment::{Apartment, Area};
pub use ids::{ApartmentId, LandlordId, ReviewId};
pub use landlord::{Address, Landlord};
pub use review::{rating_in_range, DetailedRatings, Review, RATING_MAX, RATING_MIN};

/// A document whose name is expanded into prefix keywords for search.
pub trait Searchable {
    /// The name-bearing field the keyword set is computed from.
    fn search_name(&self) -> &str;

    /// The currently materialised keyword set.
    fn searchable_keywords(&self) -> &BTreeSet<String>;

    /// Overwrite the keyword set. Only the indexing engine calls this.
    fn replace_searchable_keywords(&mut self, keywords: BTreeSet<String>);
}
