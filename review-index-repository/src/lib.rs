//! # Review Index Repository
//!
//! This crate provides the document store interface for the apartment review
//! index. It includes definitions for errors, the `DocumentStore` trait, a typed
//! service facade, and an in-memory store implementation.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod service;
pub mod types;

pub use errors::StoreError;
pub use interfaces::DocumentStore;
pub use memory::InMemoryStore;
pub use service::DocumentService;
pub use types::{Collection, Document, DocumentFilter};
