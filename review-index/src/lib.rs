//! # Review Index
//!
//! Write-side core of the apartment review platform. Keeps keyword search
//! fields and landlord aggregates consistent with the documents they derive
//! from.
//!
//! ## Architecture
//!
//! Every write flows through the coordinator:
//!
//! 1. **Coordinator**: Locks the affected entities, validates, stages and commits
//! 2. **Indexing**: Rebuilds prefix keyword sets from names
//! 3. **Aggregates**: Recomputes landlord ratings and reference lists
//! 4. **Query**: Keyword search and explicit joins on the read side
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`coordinator`]: Per-request pipeline, locks and changesets
//! - [`indexing`]: Tokenizer and keyword indexer
//! - [`aggregates`]: Landlord derived-field maintenance
//! - [`query`]: Search and hydration helpers
//! - [`errors`]: Error types for the write path

pub mod aggregates;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod indexing;
pub mod query;

pub use config::{CoordinatorConfig, Dependencies};
pub use coordinator::{ConsistencyCoordinator, WriteCommand, WriteOutcome};
pub use errors::ReviewIndexError;
pub use query::{ApartmentView, LandlordView, ReviewQueries};
