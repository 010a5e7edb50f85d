//! Landlord aggregate maintenance.
//!
//! A landlord carries three derived fields: `avg_rating`, `reviews` and
//! `properties`. This module is the only code that writes them. Each handler
//! mutates staged copies of the affected landlords; persisting them is left to
//! the coordinator's changeset.

use review_index_repository::{DocumentService, StoreError};
use review_index_shared::{ApartmentId, Landlord, Review, ReviewId};
use tracing::{debug, instrument};

use crate::errors::ReviewIndexError;

/// A staged change to the review set that is not yet in the store.
///
/// Rating recomputation reads the live reviews of a landlord and applies the
/// overlay on top, so the mean reflects the write being prepared.
#[derive(Debug, Clone, Copy)]
pub enum ReviewOverlay<'a> {
    /// The review is being created or replaced with this version.
    Upsert(&'a Review),
    /// The review is being deleted.
    Remove(&'a ReviewId),
}

impl ReviewOverlay<'_> {
    fn review_id(&self) -> &ReviewId {
        match self {
            ReviewOverlay::Upsert(review) => &review.id,
            ReviewOverlay::Remove(id) => id,
        }
    }
}

/// Arithmetic mean of `ratings`, or `None` when there are none.
pub fn mean_rating(ratings: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = ratings
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), rating| (sum + rating, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn append_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn remove_item<T: PartialEq>(list: &mut Vec<T>, item: &T) -> bool {
    let before = list.len();
    list.retain(|existing| existing != item);
    list.len() != before
}

/// Maintains the derived fields of landlords.
#[derive(Clone)]
pub struct AggregateMaintainer {
    documents: DocumentService,
}

impl AggregateMaintainer {
    pub fn new(documents: DocumentService) -> Self {
        Self { documents }
    }

    /// Recompute `avg_rating` from the landlord's live reviews plus `overlay`.
    ///
    /// The mean is always rebuilt from the full review set, never adjusted from
    /// the previous value.
    #[instrument(skip(self, landlord, overlay), fields(landlord_id = %landlord.id))]
    pub async fn recompute_rating(
        &self,
        landlord: &mut Landlord,
        overlay: ReviewOverlay<'_>,
    ) -> Result<Option<f64>, StoreError> {
        let live = self.documents.reviews_for_landlord(&landlord.id).await?;
        let overlay_id = overlay.review_id();

        let mut ratings: Vec<f64> = live
            .iter()
            .filter(|review| &review.id != overlay_id)
            .map(|review| review.overall_rating)
            .collect();
        if let ReviewOverlay::Upsert(review) = overlay {
            if review.landlord_id == landlord.id {
                ratings.push(review.overall_rating);
            }
        }

        landlord.avg_rating = mean_rating(ratings.iter().copied());
        debug!(
            review_count = ratings.len(),
            avg_rating = ?landlord.avg_rating,
            "Recomputed landlord rating"
        );
        Ok(landlord.avg_rating)
    }

    /// A new review names `landlord`.
    pub async fn on_review_created(
        &self,
        landlord: &mut Landlord,
        review: &Review,
    ) -> Result<(), ReviewIndexError> {
        append_unique(&mut landlord.reviews, review.id.clone());
        self.recompute_rating(landlord, ReviewOverlay::Upsert(review))
            .await?;
        landlord.touch();
        Ok(())
    }

    /// A review kept its landlord but its rating changed.
    pub async fn on_review_rating_changed(
        &self,
        landlord: &mut Landlord,
        review: &Review,
    ) -> Result<(), ReviewIndexError> {
        self.recompute_rating(landlord, ReviewOverlay::Upsert(review))
            .await?;
        landlord.touch();
        Ok(())
    }

    /// A review moved from `old_landlord` to `new_landlord`.
    pub async fn on_review_moved(
        &self,
        old_landlord: &mut Landlord,
        new_landlord: &mut Landlord,
        review: &Review,
    ) -> Result<(), ReviewIndexError> {
        remove_item(&mut old_landlord.reviews, &review.id);
        self.recompute_rating(old_landlord, ReviewOverlay::Upsert(review))
            .await?;
        old_landlord.touch();

        append_unique(&mut new_landlord.reviews, review.id.clone());
        self.recompute_rating(new_landlord, ReviewOverlay::Upsert(review))
            .await?;
        new_landlord.touch();
        Ok(())
    }

    /// A review naming `landlord` is being deleted.
    pub async fn on_review_deleted(
        &self,
        landlord: &mut Landlord,
        review_id: &ReviewId,
    ) -> Result<(), ReviewIndexError> {
        remove_item(&mut landlord.reviews, review_id);
        self.recompute_rating(landlord, ReviewOverlay::Remove(review_id))
            .await?;
        landlord.touch();
        Ok(())
    }

    /// An apartment's landlord changed from `old_landlord` to `new_landlord`.
    ///
    /// Either side may be absent: a newly created apartment has no previous
    /// landlord, and an apartment may be unlinked entirely.
    pub fn on_apartment_relinked(
        &self,
        apt_id: &ApartmentId,
        old_landlord: Option<&mut Landlord>,
        new_landlord: Option<&mut Landlord>,
    ) {
        if let Some(old) = old_landlord {
            if remove_item(&mut old.properties, apt_id) {
                old.touch();
            }
        }
        if let Some(new) = new_landlord {
            append_unique(&mut new.properties, apt_id.clone());
            new.touch();
        }
    }

    /// An apartment owned by `landlord` is being deleted.
    ///
    /// Reviews that reference the apartment are left as they are; their
    /// `apt_id` dangles from now on.
    pub fn on_apartment_deleted(&self, landlord: &mut Landlord, apt_id: &ApartmentId) {
        if remove_item(&mut landlord.properties, apt_id) {
            landlord.touch();
        }
    }

    /// Fail unless `landlord` has no properties and no reviews.
    pub fn ensure_deletable(&self, landlord: &Landlord) -> Result<(), ReviewIndexError> {
        if landlord.has_dependents() {
            return Err(ReviewIndexError::DependencyExistsError {
                landlord_id: landlord.id.to_string(),
                properties: landlord.properties.len(),
                reviews: landlord.reviews.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use review_index_repository::InMemoryStore;
    use review_index_shared::{DetailedRatings, LandlordId};

    fn review(id: &str, landlord: &str, rating: f64) -> Review {
        let mut review = Review::new(
            ReviewId::new(id),
            LandlordId::new(landlord),
            DetailedRatings::uniform(rating),
        );
        review.overall_rating = rating;
        review
    }

    async fn maintainer_with(reviews: Vec<Review>) -> (AggregateMaintainer, DocumentService) {
        let documents = DocumentService::new(Arc::new(InMemoryStore::new()));
        for review in reviews {
            documents.put(review).await.unwrap();
        }
        (AggregateMaintainer::new(documents.clone()), documents)
    }

    #[test]
    fn test_mean_rating() {
        assert_eq!(mean_rating(Vec::<f64>::new()), None);
        assert_eq!(mean_rating([4.0, 2.0]), Some(3.0));
        assert_eq!(mean_rating([5.0]), Some(5.0));
    }

    #[tokio::test]
    async fn test_created_review_is_counted_before_commit() {
        let (maintainer, _) = maintainer_with(vec![review("R1", "L1", 4.0)]).await;
        let mut landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
        landlord.reviews.push(ReviewId::new("R1"));

        maintainer
            .on_review_created(&mut landlord, &review("R2", "L1", 2.0))
            .await
            .unwrap();

        assert_eq!(landlord.avg_rating, Some(3.0));
        assert_eq!(landlord.reviews, vec![ReviewId::new("R1"), ReviewId::new("R2")]);
    }

    #[tokio::test]
    async fn test_rating_change_replaces_stored_version() {
        let (maintainer, _) =
            maintainer_with(vec![review("R1", "L1", 4.0), review("R2", "L1", 2.0)]).await;
        let mut landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");

        maintainer
            .on_review_rating_changed(&mut landlord, &review("R2", "L1", 5.0))
            .await
            .unwrap();

        assert_eq!(landlord.avg_rating, Some(4.5));
    }

    #[tokio::test]
    async fn test_deleting_last_review_clears_rating() {
        let (maintainer, _) = maintainer_with(vec![review("R1", "L1", 4.0)]).await;
        let mut landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
        landlord.reviews.push(ReviewId::new("R1"));
        landlord.avg_rating = Some(4.0);

        maintainer
            .on_review_deleted(&mut landlord, &ReviewId::new("R1"))
            .await
            .unwrap();

        assert!(landlord.avg_rating.is_none());
        assert!(landlord.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_review_moved_between_landlords() {
        let (maintainer, _) = maintainer_with(vec![
            review("R1", "L1", 4.0),
            review("R2", "L1", 2.0),
            review("R3", "L2", 1.0),
        ])
        .await;
        let mut old = Landlord::new(LandlordId::new("L1"), "Old");
        old.reviews = vec![ReviewId::new("R1"), ReviewId::new("R2")];
        let mut new = Landlord::new(LandlordId::new("L2"), "New");
        new.reviews = vec![ReviewId::new("R3")];

        let moved = review("R2", "L2", 2.0);
        maintainer
            .on_review_moved(&mut old, &mut new, &moved)
            .await
            .unwrap();

        assert_eq!(old.reviews, vec![ReviewId::new("R1")]);
        assert_eq!(old.avg_rating, Some(4.0));
        assert_eq!(new.reviews, vec![ReviewId::new("R3"), ReviewId::new("R2")]);
        assert_eq!(new.avg_rating, Some(1.5));
    }

    #[tokio::test]
    async fn test_apartment_relink_and_delete() {
        let (maintainer, _) = maintainer_with(vec![]).await;
        let apt = ApartmentId::new("A1");
        let mut old = Landlord::new(LandlordId::new("L1"), "Old");
        let mut new = Landlord::new(LandlordId::new("L2"), "New");

        maintainer.on_apartment_relinked(&apt, None, Some(&mut old));
        assert_eq!(old.properties, vec![apt.clone()]);

        maintainer.on_apartment_relinked(&apt, Some(&mut old), Some(&mut new));
        assert!(old.properties.is_empty());
        assert_eq!(new.properties, vec![apt.clone()]);

        maintainer.on_apartment_deleted(&mut new, &apt);
        assert!(new.properties.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_deletable() {
        let (maintainer, _) = maintainer_with(vec![]).await;
        let mut landlord = Landlord::new(LandlordId::new("L1"), "Jane Doe");
        assert!(maintainer.ensure_deletable(&landlord).is_ok());

        landlord.properties.push(ApartmentId::new("A1"));
        let err = maintainer.ensure_deletable(&landlord).unwrap_err();
        assert!(matches!(
            err,
            ReviewIndexError::DependencyExistsError { properties: 1, reviews: 0, .. }
        ));
    }
}
