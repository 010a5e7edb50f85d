//! Prefix keyword expansion.
//!
//! The document store has no text search, so every prefix of every word of a
//! name is materialised up front. A prefix query then becomes a plain membership
//! test against the stored keyword set.

use std::collections::BTreeSet;

/// Expand `text` into the set of prefixes of each of its words.
///
/// The text is lowercased and split on whitespace. For each word, every
/// non-empty prefix (by character) is added. Prefixes never span two words.
/// Punctuation is kept as part of the word it appears in.
///
/// # Example
///
/// ```
/// use review_index::indexing::expand;
///
/// let keywords = expand("Jane Doe");
/// assert!(keywords.contains("ja"));
/// assert!(keywords.contains("doe"));
/// assert!(!keywords.contains("jane d"));
/// ```
pub fn expand(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let mut keywords = BTreeSet::new();

    for word in lowered.split_whitespace() {
        for (start, ch) in word.char_indices() {
            keywords.insert(word[..start + ch.len_utf8()].to_string());
        }
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(word: &str) -> Vec<String> {
        (1..=word.chars().count())
            .map(|n| word.chars().take(n).collect())
            .collect()
    }

    #[test]
    fn test_collegetown_court() {
        let keywords = expand("Collegetown Court");

        let mut expected: BTreeSet<String> = prefixes("collegetown").into_iter().collect();
        expected.extend(prefixes("court"));

        assert_eq!(keywords, expected);
        // "c" and "co" are shared by both words but appear once.
        assert_eq!(keywords.len(), 11 + 5 - 2);
    }

    #[test]
    fn test_no_cross_word_concatenation() {
        let keywords = expand("ab cd");
        assert_eq!(
            keywords,
            ["a", "ab", "c", "cd"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );
        assert!(!keywords.iter().any(|k| k.contains(' ')));
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(expand("").is_empty());
        assert!(expand("   \t\n ").is_empty());
    }

    #[test]
    fn test_repeated_whitespace_creates_no_empty_words() {
        assert_eq!(expand("a    b"), expand("a b"));
        assert!(!expand("  a  b  ").contains(""));
    }

    #[test]
    fn test_lowercases_input() {
        assert_eq!(expand("DOE"), expand("doe"));
    }

    #[test]
    fn test_punctuation_is_kept() {
        let keywords = expand("O'Neil St.");
        assert!(keywords.contains("o'"));
        assert!(keywords.contains("o'neil"));
        assert!(keywords.contains("st."));
        assert!(!keywords.contains("oneil"));
    }

    #[test]
    fn test_multibyte_characters() {
        let keywords = expand("Café Ñu");
        assert!(keywords.contains("caf"));
        assert!(keywords.contains("café"));
        assert!(keywords.contains("ñ"));
        assert!(keywords.contains("ñu"));
        assert_eq!(keywords.len(), 6);
    }

    #[test]
    fn test_every_keyword_is_a_word_prefix() {
        let text = "The Lofts at  Eddy Street";
        let words: Vec<String> = text.to_lowercase().split_whitespace().map(String::from).collect();

        for keyword in expand(text) {
            assert!(words.iter().any(|w| w.starts_with(&keyword)), "{keyword}");
        }
    }
}
