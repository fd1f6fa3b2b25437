//! Comparison modes and line normalization.
//!
//! Every line is reduced to a [`ComparisonKey`] before it is compared with
//! lines seen earlier in the same run. Two lines are exact duplicates when
//! their keys are equal; under [`ComparisonMode::Fuzzy`] the key is only a
//! pre-filter in front of the similarity check.
//!
//! # Example
//!
//! ```
//! use linedupe::engine::{normalize, ComparisonKey, ComparisonMode};
//!
//! let key = normalize("  Hello World\n", ComparisonMode::CaseInsensitive);
//! assert_eq!(key, ComparisonKey::Text("hello world".to_string()));
//!
//! // Word order does not matter for content hashes.
//! assert_eq!(
//!     normalize("Hello World", ComparisonMode::ContentHash),
//!     normalize("World Hello", ComparisonMode::ContentHash),
//! );
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::language::LanguageNormalizer;

/// How two lines are compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ComparisonMode {
    /// Exact text comparison, only the line terminator is ignored
    CaseSensitive,
    /// Ignore surrounding whitespace and letter case
    #[default]
    CaseInsensitive,
    /// Ignore all whitespace and letter case
    WhitespaceInsensitive,
    /// Compare the sorted set of words through a 128-bit fingerprint
    ContentHash,
    /// Compare only letters and digits, ignoring case
    AlphanumericOnly,
    /// Treat lines with similar word sets as duplicates
    Fuzzy,
}

impl ComparisonMode {
    /// All modes, in declaration order.
    pub const ALL: [ComparisonMode; 6] = [
        Self::CaseSensitive,
        Self::CaseInsensitive,
        Self::WhitespaceInsensitive,
        Self::ContentHash,
        Self::AlphanumericOnly,
        Self::Fuzzy,
    ];

    /// External (kebab-case) name of the mode.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CaseSensitive => "case-sensitive",
            Self::CaseInsensitive => "case-insensitive",
            Self::WhitespaceInsensitive => "whitespace-insensitive",
            Self::ContentHash => "content-hash",
            Self::AlphanumericOnly => "alphanumeric-only",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Whether this mode consults the approximate-match index.
    #[must_use]
    pub fn is_fuzzy(self) -> bool {
        matches!(self, Self::Fuzzy)
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComparisonMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if let Some(mode) = Self::ALL.iter().find(|m| m.name() == wanted) {
            return Ok(*mode);
        }

        let suggestion = Self::ALL
            .iter()
            .map(|m| (m.name(), strsim::jaro_winkler(&wanted, m.name())))
            .filter(|(_, score)| *score > 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name);

        match suggestion {
            Some(name) => Err(format!(
                "unknown comparison mode '{s}' (did you mean '{name}'?)"
            )),
            None => Err(format!("unknown comparison mode '{s}'")),
        }
    }
}

impl TryFrom<String> for ComparisonMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Canonical key a line is reduced to under a [`ComparisonMode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComparisonKey {
    /// Normalized text
    Text(String),
    /// 128-bit fingerprint of the sorted word list
    Fingerprint(u128),
}

impl ComparisonKey {
    /// Whether the key carries no content.
    ///
    /// Lines without words reduce to the empty text key in every mode, so a
    /// fingerprint is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Fingerprint(_) => false,
        }
    }

    /// Normalized text, if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Fingerprint(_) => None,
        }
    }
}

/// Strip a trailing `\n`, `\r\n` or lone `\r`.
#[must_use]
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Normalize a line with the generic (language independent) rules.
#[must_use]
pub fn normalize(line: &str, mode: ComparisonMode) -> ComparisonKey {
    let line = strip_terminator(line);
    match mode {
        ComparisonMode::CaseSensitive => ComparisonKey::Text(line.to_string()),
        ComparisonMode::CaseInsensitive | ComparisonMode::Fuzzy => {
            ComparisonKey::Text(line.trim().to_lowercase())
        }
        ComparisonMode::WhitespaceInsensitive => ComparisonKey::Text(
            line.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase(),
        ),
        ComparisonMode::AlphanumericOnly => ComparisonKey::Text(
            line.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase(),
        ),
        ComparisonMode::ContentHash => content_fingerprint(line)
            .map_or_else(|| ComparisonKey::Text(String::new()), ComparisonKey::Fingerprint),
    }
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("word pattern is valid"))
}

/// Fingerprint of the lowercased, sorted word list of `text`, or `None`
/// when the text has no words.
fn content_fingerprint(text: &str) -> Option<u128> {
    let mut words: Vec<String> = word_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if words.is_empty() {
        return None;
    }
    words.sort_unstable();
    let joined = words.join(" ");

    let digest = blake3::hash(joined.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Some(u128::from_le_bytes(bytes))
}

/// Normalizer bound to a mode and an optional script-specific strategy.
///
/// The strategy rewrites the text before the mode rules run, so
/// e.g. full-width and half-width forms compare equal under the CJK strategy.
#[derive(Clone)]
pub struct Normalizer {
    mode: ComparisonMode,
    language: Option<Arc<dyn LanguageNormalizer>>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("mode", &self.mode)
            .field("language", &self.language.as_ref().map(|l| l.tag()))
            .finish()
    }
}

impl Normalizer {
    /// Create a normalizer using only the generic rules.
    #[must_use]
    pub fn new(mode: ComparisonMode) -> Self {
        Self {
            mode,
            language: None,
        }
    }

    /// Attach a script-specific strategy.
    #[must_use]
    pub fn with_language(mut self, language: Option<Arc<dyn LanguageNormalizer>>) -> Self {
        self.language = language;
        self
    }

    /// The active comparison mode.
    #[must_use]
    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    /// Compute the comparison key for a line.
    #[must_use]
    pub fn key(&self, line: &str) -> ComparisonKey {
        match &self.language {
            Some(language) => {
                let prepared = language.prepare(strip_terminator(line));
                normalize(&prepared, self.mode)
            }
            None => normalize(line, self.mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(key: ComparisonKey) -> String {
        key.as_text().unwrap().to_string()
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(text(normalize("Hello World", ComparisonMode::CaseInsensitive)), "hello world");
        assert_eq!(text(normalize("HELLO WORLD", ComparisonMode::CaseInsensitive)), "hello world");
        assert_eq!(text(normalize("  hello world \n", ComparisonMode::CaseInsensitive)), "hello world");
    }

    #[test]
    fn test_case_sensitive_keeps_content() {
        assert_eq!(text(normalize("Hello World", ComparisonMode::CaseSensitive)), "Hello World");
        assert_eq!(text(normalize(" Hello \r\n", ComparisonMode::CaseSensitive)), " Hello ");
    }

    #[test]
    fn test_whitespace_insensitive() {
        let mode = ComparisonMode::WhitespaceInsensitive;
        assert_eq!(text(normalize("Hello  World", mode)), "helloworld");
        assert_eq!(text(normalize("Hello\tWorld", mode)), "helloworld");
        assert_eq!(text(normalize("Hello\nWorld", mode)), "helloworld");
    }

    #[test]
    fn test_alphanumeric_only() {
        let mode = ComparisonMode::AlphanumericOnly;
        assert_eq!(text(normalize("Hello, World!", mode)), "helloworld");
        assert_eq!(text(normalize("Hello-World", mode)), "helloworld");
        assert_eq!(text(normalize("Hello_123", mode)), "hello123");
    }

    #[test]
    fn test_content_hash_ignores_word_order() {
        let a = normalize("Hello World", ComparisonMode::ContentHash);
        let b = normalize("World Hello", ComparisonMode::ContentHash);
        let c = normalize("world, HELLO!", ComparisonMode::ContentHash);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, normalize("Hello There", ComparisonMode::ContentHash));
    }

    #[test]
    fn test_content_hash_keeps_repeated_words() {
        // The sorted token list is hashed, not the token set.
        assert_ne!(
            normalize("go go", ComparisonMode::ContentHash),
            normalize("go", ComparisonMode::ContentHash)
        );
    }

    #[test]
    fn test_fuzzy_uses_case_insensitive_key() {
        assert_eq!(
            normalize(" Some Line ", ComparisonMode::Fuzzy),
            normalize(" Some Line ", ComparisonMode::CaseInsensitive)
        );
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator("a\r\n"), "a");
        assert_eq!(strip_terminator("a\n"), "a");
        assert_eq!(strip_terminator("a"), "a");
        assert_eq!(strip_terminator("a\n\n"), "a\n");
    }

    #[test]
    fn test_mode_parse_and_suggestion() {
        assert_eq!("fuzzy".parse::<ComparisonMode>(), Ok(ComparisonMode::Fuzzy));
        assert_eq!(
            "Content-Hash".parse::<ComparisonMode>(),
            Ok(ComparisonMode::ContentHash)
        );

        let err = "case-insensitiv".parse::<ComparisonMode>().unwrap_err();
        assert!(err.contains("did you mean 'case-insensitive'"), "{err}");

        let err = "zzz".parse::<ComparisonMode>().unwrap_err();
        assert!(!err.contains("did you mean"));
    }

    #[test]
    fn test_mode_display_roundtrip() {
        for mode in ComparisonMode::ALL {
            assert_eq!(mode.to_string().parse::<ComparisonMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_empty_key() {
        assert!(normalize("   \n", ComparisonMode::CaseInsensitive).is_empty());
        assert!(normalize("--- ***", ComparisonMode::ContentHash).is_empty());
        assert!(!normalize("a ---", ComparisonMode::ContentHash).is_empty());
    }
}
