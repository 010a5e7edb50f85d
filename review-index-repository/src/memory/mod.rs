//! In-memory implementation of the document store.

mod store;

pub use store::InMemoryStore;
