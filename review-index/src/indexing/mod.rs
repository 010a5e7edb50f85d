//! Search keyword indexing for apartments and landlords.

mod engine;
mod tokenizer;

pub use engine::{KeywordIndexer, Reindexed};
pub use tokenizer::expand;
