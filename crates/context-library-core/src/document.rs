//! Lexical index over a single document.
//!
//! A [`Document`] is built once from its raw content and never mutated:
//! the word-frequency map and the sentence list are derived from the content
//! in full, so they cannot drift from it. Replacing a document means building
//! a new one.
//!
//! # Tokenization
//!
//! Tokenization is intentionally approximate:
//!
//! - Sentences are the pieces of the content between `.` characters.
//! - Words are the whitespace-separated tokens of the lower-cased content.
//!   A token that carries the sentence delimiter at either end (`"blue."`)
//!   is also counted with the delimiter trimmed (`"blue"`).
//!
//! There is no other punctuation or locale handling: `"sky,"` and `"sky"`
//! are different words.
//!
//! # Example
//!
//! ```rust
//! use context_library_core::document::{query_terms, Document};
//!
//! let doc = Document::new("The sky is blue. Water is wet.");
//! let terms = query_terms("Sky BLUE");
//! assert!(doc.matches_query(&terms));
//! assert_eq!(doc.relevant_excerpts(&terms), vec!["The sky is blue"]);
//! ```

use std::collections::HashMap;

/// Sentence delimiter used for both sentence splitting and word trimming.
const SENTENCE_DELIMITER: char = '.';

/// An indexed document: raw content plus derived word counts and sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    content: String,
    words: HashMap<String, usize>,
    sentences: Vec<String>,
}

impl Document {
    /// Build the index for `content`.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let sentences = content
            .split(SENTENCE_DELIMITER)
            .map(str::to_string)
            .collect();

        let mut words: HashMap<String, usize> = HashMap::new();
        for token in content.to_lowercase().split_whitespace() {
            *words.entry(token.to_string()).or_insert(0) += 1;
            let trimmed = token.trim_matches(SENTENCE_DELIMITER);
            if !trimmed.is_empty() && trimmed != token {
                *words.entry(trimmed.to_string()).or_insert(0) += 1;
            }
        }

        Self {
            content,
            words,
            sentences,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Lower-cased word → occurrence count.
    pub fn word_frequencies(&self) -> &HashMap<String, usize> {
        &self.words
    }

    /// Sentence substrings in order of appearance (untrimmed).
    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    /// True iff every term is a key of the word map (conjunctive match).
    ///
    /// Terms are expected to be lower-cased already (see [`query_terms`]).
    /// An empty term list matches every document.
    pub fn matches_query<S: AsRef<str>>(&self, terms: &[S]) -> bool {
        terms
            .iter()
            .all(|term| self.words.contains_key(term.as_ref()))
    }

    /// Every sentence containing at least one term, trimmed, in original order.
    ///
    /// A sentence hit by several terms is returned once.
    pub fn relevant_excerpts<S: AsRef<str>>(&self, terms: &[S]) -> Vec<String> {
        self.sentences
            .iter()
            .filter_map(|sentence| {
                let trimmed = sentence.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let lower = trimmed.to_lowercase();
                terms
                    .iter()
                    .any(|term| lower.contains(term.as_ref()))
                    .then(|| trimmed.to_string())
            })
            .collect()
    }
}

/// Lower-case `query` and split it on whitespace.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_frequencies_are_lowercased() {
        let doc = Document::new("Rust rust RUST crates");
        assert_eq!(doc.word_frequencies().get("rust"), Some(&3));
        assert_eq!(doc.word_frequencies().get("crates"), Some(&1));
        assert!(!doc.word_frequencies().contains_key("Rust"));
    }

    #[test]
    fn test_trailing_delimiter_indexes_both_forms() {
        let doc = Document::new("The sky is blue.");
        assert!(doc.matches_query(&["blue"]));
        assert!(doc.matches_query(&["blue."]));
    }

    #[test]
    fn test_other_punctuation_is_not_stripped() {
        let doc = Document::new("Hello, world");
        assert!(doc.matches_query(&["hello,"]));
        assert!(!doc.matches_query(&["hello"]));
    }

    #[test]
    fn test_matches_query_is_conjunctive() {
        let doc = Document::new("cats are mammals");
        assert!(doc.matches_query(&["cats", "mammals"]));
        assert!(!doc.matches_query(&["cats", "reptiles"]));
    }

    #[test]
    fn test_empty_terms_match() {
        let doc = Document::new("anything");
        let terms: Vec<String> = Vec::new();
        assert!(doc.matches_query(&terms));
        assert!(doc.relevant_excerpts(&terms).is_empty());
    }

    #[test]
    fn test_excerpts_preserve_order_without_duplicates() {
        let doc = Document::new("Alpha beta. Gamma. Beta alpha again. Delta.");
        let excerpts = doc.relevant_excerpts(&query_terms("alpha beta"));
        assert_eq!(excerpts, vec!["Alpha beta", "Beta alpha again"]);
    }

    #[test]
    fn test_excerpts_are_substrings_of_content() {
        let content = "  Leading space. Middle one .  Trailing  ";
        let doc = Document::new(content);
        for excerpt in doc.relevant_excerpts(&["e"]) {
            assert!(content.contains(&excerpt));
            assert_eq!(excerpt, excerpt.trim());
        }
    }

    #[test]
    fn test_excerpt_substring_match() {
        // Excerpt selection uses substring containment, not word lookup.
        let doc = Document::new("Skyline views. Nothing here.");
        assert_eq!(doc.relevant_excerpts(&["sky"]), vec!["Skyline views"]);
        assert!(!doc.matches_query(&["sky"]));
    }

    #[test]
    fn test_index_is_deterministic() {
        let a = Document::new("One. Two two. Three");
        let b = Document::new("One. Two two. Three");
        assert_eq!(a, b);
        assert_eq!(a.sentences().len(), 3);
    }

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("  Sky\tBLUE \n"), vec!["sky", "blue"]);
        assert!(query_terms("   ").is_empty());
    }
}
