//! Word-set similarity between normalized lines.
//!
//! Lines are compared as *sets* of lowercased whitespace-separated tokens
//! using the Jaccard index `|A ∩ B| / |A ∪ B|`. Repeated words do not count
//! twice.

use std::collections::HashSet;

/// Lowercased token set of a line, computed once and reused across
/// comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenSet {
    tokens: HashSet<String>,
}

impl TokenSet {
    /// Tokenize `text` on whitespace.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            tokens: text.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the line had no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate the distinct tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Jaccard index against another token set.
    #[must_use]
    pub fn jaccard(&self, other: &TokenSet) -> f64 {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            (false, false) => {}
        }

        let (small, large) = if self.len() <= other.len() {
            (&self.tokens, &other.tokens)
        } else {
            (&other.tokens, &self.tokens)
        };
        let intersection = small.iter().filter(|t| large.contains(*t)).count();
        let union = self.len() + other.len() - intersection;

        intersection as f64 / union as f64
    }
}

/// Similarity score in `[0, 1]` between two lines.
///
/// Two blank lines are maximally similar; a blank and a non-blank line
/// share nothing.
///
/// ```
/// use linedupe::engine::similarity;
///
/// assert_eq!(similarity("hello world", "hello world"), 1.0);
/// assert_eq!(similarity("hello world", "goodbye universe"), 0.0);
/// assert_eq!(similarity("", ""), 1.0);
/// ```
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    TokenSet::new(a).jaccard(&TokenSet::new(b))
}
