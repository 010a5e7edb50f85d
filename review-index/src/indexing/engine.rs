//! Keyword indexing engine.
//!
//! Recomputes the `searchable_keywords` field of apartments and landlords from
//! their names. The new set always replaces the old one wholesale; it is never
//! patched.

use std::collections::BTreeSet;

use review_index_shared::Searchable;
use tracing::debug;

use super::tokenizer::expand;

/// Result of reindexing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reindexed {
    /// The keyword set now held by the document.
    pub keywords: BTreeSet<String>,
    /// Whether the set differs from what the document held before.
    pub changed: bool,
}

/// Writes prefix keyword sets onto searchable documents.
///
/// The engine only mutates the in-memory document. Persisting it is the
/// caller's job, as part of the same staged write as the name change.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIndexer;

impl KeywordIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Replace the document's keyword set with the expansion of its name.
    pub fn reindex<D: Searchable>(&self, doc: &mut D) -> Reindexed {
        let keywords = expand(doc.search_name());
        let changed = &keywords != doc.searchable_keywords();
        if changed {
            doc.replace_searchable_keywords(keywords.clone());
        }

        debug!(
            name = doc.search_name(),
            keyword_count = keywords.len(),
            changed,
            "Reindexed document"
        );

        Reindexed { keywords, changed }
    }
}
