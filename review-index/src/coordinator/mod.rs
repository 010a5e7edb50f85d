//! Consistency coordinator.
//!
//! Every caller-facing write goes through [`ConsistencyCoordinator`]. A request
//! locks the document it targets, then every landlord whose derived fields it
//! changes, validates its input against the store, reindexes and recomputes
//! aggregates on staged copies, and finally commits all staged documents as a
//! single [`Changeset`].
//!
//! ## Lock order
//!
//! A request holds at most one apartment or review lock, always taken first.
//! Landlord locks follow in sorted order. Landlord-only requests take a single
//! landlord lock. No request waits for an entity lock while holding a landlord
//! lock, so acquisition never cycles.

mod changeset;
mod commands;
mod locks;
mod pipeline;

pub use changeset::{Changeset, StagedWrite};
pub use commands::{
    ApartmentUpdate, LandlordUpdate, NewApartment, NewLandlord, NewReview, ReviewUpdate,
    WriteCommand, WriteOutcome,
};
pub use locks::{LockGuard, LockKey, LockRegistry};
pub use pipeline::{WritePipeline, WriteStage};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use review_index_repository::{Collection, DocumentService, DocumentStore, StoreError};
use review_index_shared::{
    rating_in_range, Apartment, ApartmentId, DetailedRatings, Landlord, LandlordId, Review,
    ReviewId,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::aggregates::AggregateMaintainer;
use crate::config::CoordinatorConfig;
use crate::errors::ReviewIndexError;
use crate::indexing::KeywordIndexer;

fn require_name(field: &str, value: &str) -> Result<(), ReviewIndexError> {
    if value.trim().is_empty() {
        return Err(ReviewIndexError::validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn validate_ratings(ratings: &DetailedRatings, overall: f64) -> Result<(), ReviewIndexError> {
    if let Some((name, value)) = ratings.first_out_of_range() {
        return Err(ReviewIndexError::validation(format!(
            "detailed rating '{}' is {}, expected a value in [0, 5]",
            name, value
        )));
    }
    if !rating_in_range(overall) {
        return Err(ReviewIndexError::validation(format!(
            "overall rating is {}, expected a value in [0, 5]",
            overall
        )));
    }
    Ok(())
}

/// Serializes and applies writes so that derived fields never drift from the
/// documents they summarize.
#[derive(Clone)]
pub struct ConsistencyCoordinator {
    documents: DocumentService,
    aggregates: AggregateMaintainer,
    indexer: KeywordIndexer,
    locks: Arc<LockRegistry>,
    /// Every running commit task holds a read permit.
    commits: Arc<RwLock<()>>,
    closing: Arc<AtomicBool>,
    config: CoordinatorConfig,
}

impl ConsistencyCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, config: CoordinatorConfig) -> Self {
        let documents = DocumentService::new(store);
        Self {
            aggregates: AggregateMaintainer::new(documents.clone()),
            indexer: KeywordIndexer::new(),
            locks: Arc::new(LockRegistry::new(config.lock_timeout)),
            commits: Arc::new(RwLock::new(())),
            closing: Arc::new(AtomicBool::new(false)),
            documents,
            config,
        }
    }

    /// Typed read access to the underlying store.
    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    pub fn lock_registry(&self) -> &LockRegistry {
        &self.locks
    }

    /// Refuse new commits and wait for the ones already running.
    ///
    /// Call before closing the store. Commits started by a request whose
    /// caller was cancelled still run to completion here, so the store is
    /// never left holding half of a changeset.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let _drained = self.commits.write().await;
        info!("Coordinator drained in-flight commits");
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Dispatch a serialized command to the matching operation.
    pub async fn apply(&self, command: WriteCommand) -> Result<WriteOutcome, ReviewIndexError> {
        match command {
            WriteCommand::CreateApartment(request) => self
                .create_apartment(request)
                .await
                .map(WriteOutcome::Apartment),
            WriteCommand::UpdateApartment { id, update } => self
                .update_apartment(&id, update)
                .await
                .map(WriteOutcome::Apartment),
            WriteCommand::DeleteApartment { id } => {
                self.delete_apartment(&id).await?;
                Ok(WriteOutcome::Deleted {
                    collection: Collection::Apartments,
                    id: id.into_inner(),
                })
            }
            WriteCommand::CreateLandlord(request) => self
                .create_landlord(request)
                .await
                .map(WriteOutcome::Landlord),
            WriteCommand::UpdateLandlord { id, update } => self
                .update_landlord(&id, update)
                .await
                .map(WriteOutcome::Landlord),
            WriteCommand::DeleteLandlord { id } => {
                self.delete_landlord(&id).await?;
                Ok(WriteOutcome::Deleted {
                    collection: Collection::Landlords,
                    id: id.into_inner(),
                })
            }
            WriteCommand::CreateReview(request) => {
                self.create_review(request).await.map(WriteOutcome::Review)
            }
            WriteCommand::UpdateReview { id, update } => self
                .update_review(&id, update)
                .await
                .map(WriteOutcome::Review),
            WriteCommand::DeleteReview { id } => {
                self.delete_review(&id).await?;
                Ok(WriteOutcome::Deleted {
                    collection: Collection::Reviews,
                    id: id.into_inner(),
                })
            }
            WriteCommand::LikeReview { id } => {
                self.like_review(&id).await.map(WriteOutcome::Review)
            }
        }
    }

    // =========================================================================
    // Apartments
    // =========================================================================

    /// Create an apartment, optionally linked to an existing landlord.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_apartment(
        &self,
        request: NewApartment,
    ) -> Result<Apartment, ReviewIndexError> {
        let apartment = request.into_document();
        let mut pipeline = WritePipeline::start("create_apartment", apartment.id.as_str());
        let result = self.try_create_apartment(&mut pipeline, apartment).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_create_apartment(
        &self,
        pipeline: &mut WritePipeline,
        mut apartment: Apartment,
    ) -> Result<Apartment, ReviewIndexError> {
        let mut guards = vec![
            self.locks
                .acquire(LockKey::Apartment(apartment.id.clone()))
                .await?,
        ];
        guards.extend(
            self.locks
                .acquire_all(apartment.landlord_id.iter().cloned().map(LockKey::Landlord))
                .await?,
        );

        require_name("apartment name", &apartment.name)?;
        if self.documents.get_apartment(&apartment.id).await?.is_some() {
            return Err(ReviewIndexError::validation(format!(
                "apartment '{}' already exists",
                apartment.id
            )));
        }
        let landlord = match &apartment.landlord_id {
            Some(id) => Some(self.require_landlord(id).await?),
            None => None,
        };
        pipeline.advance(WriteStage::Validated);

        self.indexer.reindex(&mut apartment);
        pipeline.advance(WriteStage::Indexed);

        let mut changeset = Changeset::new();
        changeset.put(apartment.clone(), None);
        if let Some(before) = landlord {
            let mut after = before.clone();
            self.aggregates
                .on_apartment_relinked(&apartment.id, None, Some(&mut after));
            changeset.put(after, Some(before.into()));
        }
        pipeline.advance(WriteStage::Aggregated);

        self.commit(changeset, guards).await?;
        Ok(apartment)
    }

    /// Update an apartment. Renames reindex it; landlord changes move it
    /// between the landlords' `properties`.
    #[instrument(skip(self, id, update), fields(apt_id = %id))]
    pub async fn update_apartment(
        &self,
        id: &ApartmentId,
        update: ApartmentUpdate,
    ) -> Result<Apartment, ReviewIndexError> {
        let mut pipeline = WritePipeline::start("update_apartment", id.as_str());
        let result = self.try_update_apartment(&mut pipeline, id, update).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_update_apartment(
        &self,
        pipeline: &mut WritePipeline,
        id: &ApartmentId,
        update: ApartmentUpdate,
    ) -> Result<Apartment, ReviewIndexError> {
        let mut guards = vec![self.locks.acquire(LockKey::Apartment(id.clone())).await?];
        let before = self
            .documents
            .get_apartment(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Apartments, id.as_str()))?;

        let relink = match update.landlord_id {
            Some(new_owner) if new_owner != before.landlord_id => Some(new_owner),
            _ => None,
        };
        if let Some(new_owner) = &relink {
            let keys = before
                .landlord_id
                .iter()
                .chain(new_owner.iter())
                .cloned()
                .map(LockKey::Landlord);
            guards.extend(self.locks.acquire_all(keys).await?);
        }

        let mut apartment = before.clone();
        if let Some(name) = update.name {
            require_name("apartment name", &name)?;
            apartment.name = name;
        }
        if let Some(address) = update.address {
            apartment.address = address;
        }
        if let Some(num_baths) = update.num_baths {
            apartment.num_baths = num_baths;
        }
        if let Some(num_beds) = update.num_beds {
            apartment.num_beds = num_beds;
        }
        if let Some(photos) = update.photos {
            apartment.photos = photos;
        }
        if let Some(area) = update.area {
            apartment.area = area;
        }

        let mut new_landlord = None;
        let mut old_landlord = None;
        if let Some(new_owner) = &relink {
            if let Some(new_id) = new_owner {
                new_landlord = Some(self.require_landlord(new_id).await?);
            }
            if let Some(old_id) = &before.landlord_id {
                old_landlord = self.documents.get_landlord(old_id).await?;
                if old_landlord.is_none() {
                    warn!(apt_id = %id, landlord_id = %old_id, "Previous landlord is missing");
                }
            }
            apartment.landlord_id = new_owner.clone();
        }
        pipeline.advance(WriteStage::Validated);

        self.indexer.reindex(&mut apartment);
        apartment.touch();
        pipeline.advance(WriteStage::Indexed);

        let mut changeset = Changeset::new();
        changeset.put(apartment.clone(), Some(before.into()));
        if relink.is_some() {
            let mut old_after = old_landlord.clone();
            let mut new_after = new_landlord.clone();
            self.aggregates
                .on_apartment_relinked(id, old_after.as_mut(), new_after.as_mut());
            for (after, before) in [(old_after, old_landlord), (new_after, new_landlord)] {
                if let (Some(after), Some(before)) = (after, before) {
                    changeset.put(after, Some(before.into()));
                }
            }
        }
        pipeline.advance(WriteStage::Aggregated);

        self.commit(changeset, guards).await?;
        Ok(apartment)
    }

    /// Delete an apartment and drop it from its landlord's `properties`.
    ///
    /// Reviews of the apartment are kept; their `apt_id` no longer resolves.
    #[instrument(skip(self, id), fields(apt_id = %id))]
    pub async fn delete_apartment(&self, id: &ApartmentId) -> Result<(), ReviewIndexError> {
        let mut pipeline = WritePipeline::start("delete_apartment", id.as_str());
        let result = self.try_delete_apartment(&mut pipeline, id).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_delete_apartment(
        &self,
        pipeline: &mut WritePipeline,
        id: &ApartmentId,
    ) -> Result<(), ReviewIndexError> {
        let mut guards = vec![self.locks.acquire(LockKey::Apartment(id.clone())).await?];
        let apartment = self
            .documents
            .get_apartment(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Apartments, id.as_str()))?;
        guards.extend(
            self.locks
                .acquire_all(apartment.landlord_id.iter().cloned().map(LockKey::Landlord))
                .await?,
        );

        let landlord = match &apartment.landlord_id {
            Some(owner) => self.documents.get_landlord(owner).await?,
            None => None,
        };
        pipeline.advance(WriteStage::Validated);

        let mut changeset = Changeset::new();
        if let Some(before) = landlord {
            let mut after = before.clone();
            self.aggregates.on_apartment_deleted(&mut after, id);
            changeset.put(after, Some(before.into()));
        }
        changeset.delete(apartment);
        pipeline.advance(WriteStage::Aggregated);

        self.commit(changeset, guards).await
    }

    // =========================================================================
    // Landlords
    // =========================================================================

    /// Create a landlord with empty derived fields.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_landlord(
        &self,
        request: NewLandlord,
    ) -> Result<Landlord, ReviewIndexError> {
        let landlord = request.into_document();
        let mut pipeline = WritePipeline::start("create_landlord", landlord.id.as_str());
        let result = self.try_create_landlord(&mut pipeline, landlord).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_create_landlord(
        &self,
        pipeline: &mut WritePipeline,
        mut landlord: Landlord,
    ) -> Result<Landlord, ReviewIndexError> {
        let guard = self
            .locks
            .acquire(LockKey::Landlord(landlord.id.clone()))
            .await?;

        require_name("landlord name", &landlord.name)?;
        if self.documents.get_landlord(&landlord.id).await?.is_some() {
            return Err(ReviewIndexError::validation(format!(
                "landlord '{}' already exists",
                landlord.id
            )));
        }
        pipeline.advance(WriteStage::Validated);

        self.indexer.reindex(&mut landlord);
        pipeline.advance(WriteStage::Indexed);

        let mut changeset = Changeset::new();
        changeset.put(landlord.clone(), None);
        self.commit(changeset, vec![guard]).await?;
        Ok(landlord)
    }

    /// Update a landlord's own fields. Derived fields are left alone.
    #[instrument(skip(self, id, update), fields(landlord_id = %id))]
    pub async fn update_landlord(
        &self,
        id: &LandlordId,
        update: LandlordUpdate,
    ) -> Result<Landlord, ReviewIndexError> {
        let mut pipeline = WritePipeline::start("update_landlord", id.as_str());
        let result = self.try_update_landlord(&mut pipeline, id, update).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_update_landlord(
        &self,
        pipeline: &mut WritePipeline,
        id: &LandlordId,
        update: LandlordUpdate,
    ) -> Result<Landlord, ReviewIndexError> {
        let guard = self.locks.acquire(LockKey::Landlord(id.clone())).await?;
        let before = self
            .documents
            .get_landlord(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Landlords, id.as_str()))?;

        let mut landlord = before.clone();
        if let Some(name) = update.name {
            require_name("landlord name", &name)?;
            landlord.name = name;
        }
        if let Some(contact) = update.contact {
            landlord.contact = contact;
        }
        if let Some(profile_photo) = update.profile_photo {
            landlord.profile_photo = profile_photo;
        }
        if let Some(photos) = update.photos {
            landlord.photos = photos;
        }
        if let Some(address) = update.address {
            landlord.address = address.filter(|address| !address.is_empty());
        }
        pipeline.advance(WriteStage::Validated);

        self.indexer.reindex(&mut landlord);
        landlord.touch();
        pipeline.advance(WriteStage::Indexed);

        let mut changeset = Changeset::new();
        changeset.put(landlord.clone(), Some(before.into()));
        self.commit(changeset, vec![guard]).await?;
        Ok(landlord)
    }

    /// Delete a landlord that no apartment or review references.
    #[instrument(skip(self, id), fields(landlord_id = %id))]
    pub async fn delete_landlord(&self, id: &LandlordId) -> Result<(), ReviewIndexError> {
        let mut pipeline = WritePipeline::start("delete_landlord", id.as_str());
        let result = self.try_delete_landlord(&mut pipeline, id).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_delete_landlord(
        &self,
        pipeline: &mut WritePipeline,
        id: &LandlordId,
    ) -> Result<(), ReviewIndexError> {
        let guard = self.locks.acquire(LockKey::Landlord(id.clone())).await?;
        let landlord = self
            .documents
            .get_landlord(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Landlords, id.as_str()))?;

        self.aggregates.ensure_deletable(&landlord)?;
        pipeline.advance(WriteStage::Validated);

        let mut changeset = Changeset::new();
        changeset.delete(landlord);
        self.commit(changeset, vec![guard]).await
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Create a review and fold it into its landlord's aggregates.
    #[instrument(skip(self, request), fields(landlord_id = %request.landlord_id))]
    pub async fn create_review(&self, request: NewReview) -> Result<Review, ReviewIndexError> {
        let review = request.into_document();
        let mut pipeline = WritePipeline::start("create_review", review.id.as_str());
        let result = self.try_create_review(&mut pipeline, review).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_create_review(
        &self,
        pipeline: &mut WritePipeline,
        review: Review,
    ) -> Result<Review, ReviewIndexError> {
        let mut guards = vec![self.locks.acquire(LockKey::Review(review.id.clone())).await?];
        guards.extend(
            self.locks
                .acquire_all([LockKey::Landlord(review.landlord_id.clone())])
                .await?,
        );

        validate_ratings(&review.detailed_ratings, review.overall_rating)?;
        if self.documents.get_review(&review.id).await?.is_some() {
            return Err(ReviewIndexError::validation(format!(
                "review '{}' already exists",
                review.id
            )));
        }
        let before = self.require_landlord(&review.landlord_id).await?;
        if let Some(apt_id) = &review.apt_id {
            self.require_apartment(apt_id).await?;
        }
        pipeline.advance(WriteStage::Validated);

        let mut landlord = before.clone();
        self.aggregates
            .on_review_created(&mut landlord, &review)
            .await?;
        pipeline.advance(WriteStage::Aggregated);

        let mut changeset = Changeset::new();
        changeset.put(review.clone(), None);
        changeset.put(landlord, Some(before.into()));
        self.commit(changeset, guards).await?;
        Ok(review)
    }

    /// Update a review.
    ///
    /// `overall_rating` is taken from the update when supplied, otherwise it is
    /// recomputed from new `detailed_ratings`. Moving a review to another
    /// landlord updates both landlords.
    #[instrument(skip(self, id, update), fields(review_id = %id))]
    pub async fn update_review(
        &self,
        id: &ReviewId,
        update: ReviewUpdate,
    ) -> Result<Review, ReviewIndexError> {
        let mut pipeline = WritePipeline::start("update_review", id.as_str());
        let result = self.try_update_review(&mut pipeline, id, update).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_update_review(
        &self,
        pipeline: &mut WritePipeline,
        id: &ReviewId,
        update: ReviewUpdate,
    ) -> Result<Review, ReviewIndexError> {
        let mut guards = vec![self.locks.acquire(LockKey::Review(id.clone())).await?];
        let before = self
            .documents
            .get_review(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Reviews, id.as_str()))?;

        let old_owner = before.landlord_id.clone();
        let new_owner = update.landlord_id.clone().unwrap_or_else(|| old_owner.clone());
        guards.extend(
            self.locks
                .acquire_all([
                    LockKey::Landlord(old_owner.clone()),
                    LockKey::Landlord(new_owner.clone()),
                ])
                .await?,
        );

        let mut review = before.clone();
        if let Some(ratings) = update.detailed_ratings {
            if ratings != review.detailed_ratings {
                review.overall_rating = ratings.mean();
            }
            review.detailed_ratings = ratings;
        }
        if let Some(overall) = update.overall_rating {
            review.overall_rating = overall;
        }
        validate_ratings(&review.detailed_ratings, review.overall_rating)?;

        if let Some(apt_id) = update.apt_id {
            if let Some(apt) = &apt_id {
                if review.apt_id.as_ref() != Some(apt) {
                    self.require_apartment(apt).await?;
                }
            }
            review.apt_id = apt_id;
        }
        if let Some(date) = update.date {
            review.date = date;
        }
        if let Some(photos) = update.photos {
            review.photos = photos;
        }
        if let Some(text) = update.review_text {
            review.review_text = text;
        }
        review.landlord_id = new_owner.clone();
        review.touch();

        let moved = new_owner != old_owner;
        let rating_changed = review.overall_rating != before.overall_rating;
        let new_before = if moved {
            Some(self.require_landlord(&new_owner).await?)
        } else {
            None
        };
        let old_before = if moved || rating_changed {
            let landlord = self.documents.get_landlord(&old_owner).await?;
            if landlord.is_none() {
                warn!(review_id = %id, landlord_id = %old_owner, "Review landlord is missing");
            }
            landlord
        } else {
            None
        };
        pipeline.advance(WriteStage::Validated);

        let mut changeset = Changeset::new();
        changeset.put(review.clone(), Some(before.into()));
        match (old_before, new_before) {
            (Some(old_before), Some(new_before)) => {
                let mut old_after = old_before.clone();
                let mut new_after = new_before.clone();
                self.aggregates
                    .on_review_moved(&mut old_after, &mut new_after, &review)
                    .await?;
                changeset.put(old_after, Some(old_before.into()));
                changeset.put(new_after, Some(new_before.into()));
            }
            (None, Some(new_before)) => {
                let mut new_after = new_before.clone();
                self.aggregates
                    .on_review_created(&mut new_after, &review)
                    .await?;
                changeset.put(new_after, Some(new_before.into()));
            }
            (Some(old_before), None) => {
                let mut old_after = old_before.clone();
                self.aggregates
                    .on_review_rating_changed(&mut old_after, &review)
                    .await?;
                changeset.put(old_after, Some(old_before.into()));
            }
            (None, None) => {
                debug!(review_id = %id, "No aggregate change");
            }
        }
        pipeline.advance(WriteStage::Aggregated);

        self.commit(changeset, guards).await?;
        Ok(review)
    }

    /// Delete a review and recompute its landlord's aggregates.
    #[instrument(skip(self, id), fields(review_id = %id))]
    pub async fn delete_review(&self, id: &ReviewId) -> Result<(), ReviewIndexError> {
        let mut pipeline = WritePipeline::start("delete_review", id.as_str());
        let result = self.try_delete_review(&mut pipeline, id).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_delete_review(
        &self,
        pipeline: &mut WritePipeline,
        id: &ReviewId,
    ) -> Result<(), ReviewIndexError> {
        let mut guards = vec![self.locks.acquire(LockKey::Review(id.clone())).await?];
        let review = self
            .documents
            .get_review(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Reviews, id.as_str()))?;
        guards.extend(
            self.locks
                .acquire_all([LockKey::Landlord(review.landlord_id.clone())])
                .await?,
        );

        let landlord = self.documents.get_landlord(&review.landlord_id).await?;
        pipeline.advance(WriteStage::Validated);

        let mut changeset = Changeset::new();
        match landlord {
            Some(before) => {
                let mut after = before.clone();
                self.aggregates.on_review_deleted(&mut after, id).await?;
                changeset.put(after, Some(before.into()));
            }
            None => {
                warn!(review_id = %id, landlord_id = %review.landlord_id, "Review landlord is missing");
            }
        }
        changeset.delete(review);
        pipeline.advance(WriteStage::Aggregated);

        self.commit(changeset, guards).await
    }

    /// Increment a review's like count. Aggregates are unaffected.
    #[instrument(skip(self, id), fields(review_id = %id))]
    pub async fn like_review(&self, id: &ReviewId) -> Result<Review, ReviewIndexError> {
        let mut pipeline = WritePipeline::start("like_review", id.as_str());
        let result = self.try_like_review(&mut pipeline, id).await;
        self.finish(&mut pipeline, result)
    }

    async fn try_like_review(
        &self,
        pipeline: &mut WritePipeline,
        id: &ReviewId,
    ) -> Result<Review, ReviewIndexError> {
        let guard = self.locks.acquire(LockKey::Review(id.clone())).await?;
        let before = self
            .documents
            .get_review(id)
            .await?
            .ok_or_else(|| ReviewIndexError::not_found(Collection::Reviews, id.as_str()))?;
        pipeline.advance(WriteStage::Validated);

        let mut review = before.clone();
        review.likes = Some(review.likes.unwrap_or(0).saturating_add(1));
        review.touch();

        let mut changeset = Changeset::new();
        changeset.put(review.clone(), Some(before.into()));
        self.commit(changeset, vec![guard]).await?;
        Ok(review)
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    async fn require_landlord(&self, id: &LandlordId) -> Result<Landlord, ReviewIndexError> {
        self.documents
            .get_landlord(id)
            .await?
            .ok_or_else(|| ReviewIndexError::dangling(Collection::Landlords, id.as_str()))
    }

    async fn require_apartment(&self, id: &ApartmentId) -> Result<Apartment, ReviewIndexError> {
        self.documents
            .get_apartment(id)
            .await?
            .ok_or_else(|| ReviewIndexError::dangling(Collection::Apartments, id.as_str()))
    }

    /// Apply `changeset` on a separate task that owns the lock guards.
    ///
    /// Once started, the commit runs to completion even if the caller stops
    /// polling, and the locks are released only after it finishes. After
    /// [`shutdown`](Self::shutdown) no new commit starts.
    async fn commit(
        &self,
        changeset: Changeset,
        guards: Vec<LockGuard>,
    ) -> Result<(), ReviewIndexError> {
        let permit = self.commits.clone().read_owned().await;
        if self.closing.load(Ordering::SeqCst) {
            return Err(ReviewIndexError::WriteError(StoreError::connection(
                "coordinator is shutting down",
            )));
        }

        let store = self.documents.store().clone();
        let task = tokio::spawn(async move {
            let result = changeset.commit(store).await;
            drop(guards);
            drop(permit);
            result
        });

        match task.await {
            Ok(result) => result.map_err(ReviewIndexError::from),
            Err(e) => Err(ReviewIndexError::WriteError(StoreError::put(format!(
                "commit task failed: {}",
                e
            )))),
        }
    }

    fn finish<T>(
        &self,
        pipeline: &mut WritePipeline,
        result: Result<T, ReviewIndexError>,
    ) -> Result<T, ReviewIndexError> {
        if self.locks.len() > self.config.prune_threshold {
            self.locks.prune();
        }
        match result {
            Ok(value) => {
                pipeline.committed();
                Ok(value)
            }
            Err(e) => Err(pipeline.fail(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use review_index_repository::InMemoryStore;
    use review_index_shared::RATING_MAX;

    fn coordinator() -> ConsistencyCoordinator {
        ConsistencyCoordinator::new(
            Arc::new(InMemoryStore::new()),
            CoordinatorConfig::default().with_lock_timeout(Duration::from_millis(100)),
        )
    }

    #[tokio::test]
    async fn test_create_landlord_indexes_name() {
        let coordinator = coordinator();
        let landlord = coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();

        assert!(landlord.searchable_keywords.contains("jane"));
        assert!(landlord.searchable_keywords.contains("d"));
        assert!(landlord.avg_rating.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_blank_landlords_rejected() {
        let coordinator = coordinator();
        coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();

        let duplicate = coordinator
            .create_landlord(NewLandlord::new("Someone").with_id("L1"))
            .await;
        assert!(matches!(duplicate, Err(ReviewIndexError::ValidationError(_))));

        let blank = coordinator.create_landlord(NewLandlord::new("   ")).await;
        assert!(matches!(blank, Err(ReviewIndexError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_review_with_unknown_landlord_writes_nothing() {
        let coordinator = coordinator();
        let err = coordinator
            .create_review(NewReview::new("missing", DetailedRatings::uniform(3.0)).with_id("R1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReviewIndexError::ReferentialIntegrityError {
                collection: Collection::Landlords,
                ..
            }
        ));
        assert!(coordinator
            .documents()
            .get_review(&ReviewId::new("R1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_rating_rejected() {
        let coordinator = coordinator();
        coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();

        let mut ratings = DetailedRatings::uniform(4.0);
        ratings.safety = 6.0;
        let err = coordinator
            .create_review(NewReview::new("L1", ratings))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewIndexError::ValidationError(ref msg) if msg.contains("safety")));

        let landlord = coordinator
            .documents()
            .get_landlord(&LandlordId::new("L1"))
            .await
            .unwrap()
            .unwrap();
        assert!(landlord.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_supplied_overall_rating_checked() {
        let coordinator = coordinator();
        coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();

        for overall in [7.0, -0.5, f64::NAN] {
            let err = coordinator
                .create_review(
                    NewReview::new("L1", DetailedRatings::uniform(4.0)).with_overall_rating(overall),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, ReviewIndexError::ValidationError(ref msg) if msg.contains("overall")));
        }

        let review = coordinator
            .create_review(
                NewReview::new("L1", DetailedRatings::uniform(4.0))
                    .with_id("R1")
                    .with_overall_rating(RATING_MAX),
            )
            .await
            .unwrap();
        assert_eq!(review.overall_rating, 5.0);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_later_commits() {
        let coordinator = coordinator();
        coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();

        coordinator.shutdown().await;
        let err = coordinator
            .create_landlord(NewLandlord::new("John Roe").with_id("L2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewIndexError::WriteError(StoreError::ConnectionError(_))));
        assert!(coordinator
            .documents()
            .get_landlord(&LandlordId::new("L2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_missing_target_is_not_found() {
        let coordinator = coordinator();
        let err = coordinator
            .update_apartment(&ApartmentId::new("A404"), ApartmentUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewIndexError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_like_review_counts_up() {
        let coordinator = coordinator();
        coordinator
            .create_landlord(NewLandlord::new("Jane Doe").with_id("L1"))
            .await
            .unwrap();
        let review = coordinator
            .create_review(NewReview::new("L1", DetailedRatings::uniform(4.0)).with_id("R1"))
            .await
            .unwrap();
        assert_eq!(review.likes, None);

        coordinator.like_review(&review.id).await.unwrap();
        let liked = coordinator.like_review(&review.id).await.unwrap();
        assert_eq!(liked.likes, Some(2));
    }

    #[tokio::test]
    async fn test_registry_pruned_past_threshold() {
        let coordinator = ConsistencyCoordinator::new(
            Arc::new(InMemoryStore::new()),
            CoordinatorConfig::default().with_prune_threshold(2),
        );
        for name in ["A", "B", "C", "D"] {
            coordinator
                .create_landlord(NewLandlord::new(name))
                .await
                .unwrap();
        }
        assert!(coordinator.lock_registry().len() <= 2);
    }
}
