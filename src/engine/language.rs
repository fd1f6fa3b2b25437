//! Script-specific normalization strategies.
//!
//! A strategy rewrites a line before the comparison-mode rules run. It is
//! selected by a language tag from configuration and injected into the
//! [`Normalizer`](super::Normalizer); a tag without a strategy falls back to
//! the generic rules.

use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

/// Rewrites text for a particular script before comparison.
pub trait LanguageNormalizer: Send + Sync {
    /// Language tag this strategy was selected for (e.g. `"zh"`).
    fn tag(&self) -> &str;

    /// Rewrite `text` into a form where equivalent lines compare equal and
    /// words are separated by whitespace.
    fn prepare(&self, text: &str) -> String;
}

/// Chinese, Japanese and Korean text.
///
/// Applies NFKC (folds full-width forms) and segments CJK characters into
/// single-character words, since these scripts do not separate words with
/// spaces.
#[derive(Debug, Clone)]
pub struct CjkNormalizer {
    tag: String,
}

impl CjkNormalizer {
    /// Create the strategy for the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// Whether `c` belongs to a CJK script block that is written without spaces.
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F      // Hiragana
        | 0x30A0..=0x30FF    // Katakana
        | 0x3400..=0x4DBF    // CJK Extension A
        | 0x4E00..=0x9FFF    // CJK Unified Ideographs
        | 0xAC00..=0xD7AF    // Hangul Syllables
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
        | 0x20000..=0x2A6DF  // CJK Extension B
    )
}

impl LanguageNormalizer for CjkNormalizer {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn prepare(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 2);
        for c in text.nfkc() {
            if is_cjk(c) {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push(c);
                out.push(' ');
            } else {
                out.push(c);
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Arabic text.
///
/// Removes harakat and tatweel and unifies common letter variants so that
/// vocalized and unvocalized spellings compare equal.
#[derive(Debug, Clone, Default)]
pub struct ArabicNormalizer;

impl LanguageNormalizer for ArabicNormalizer {
    fn tag(&self) -> &str {
        "ar"
    }

    fn prepare(&self, text: &str) -> String {
        text.nfkc()
            .filter(|c| !matches!(*c as u32, 0x064B..=0x065F | 0x0670 | 0x0640))
            .map(|c| match c {
                'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
                'ى' => 'ي',
                'ة' => 'ه',
                other => other,
            })
            .collect()
    }
}

/// Look up the strategy registered for a language tag.
///
/// Tags are matched on their primary subtag, so `zh-Hant` selects the CJK
/// strategy. Unknown tags log a warning and return `None`, which keeps the
/// generic rules in effect.
#[must_use]
pub fn strategy_for(tag: &str) -> Option<Arc<dyn LanguageNormalizer>> {
    let primary = tag
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match primary.as_str() {
        "zh" | "ja" | "ko" => Some(Arc::new(CjkNormalizer::new(primary))),
        "ar" => Some(Arc::new(ArabicNormalizer)),
        _ => {
            log::warn!(
                "No normalizer for language '{}', using generic normalization",
                tag
            );
            None
        }
    }
}
