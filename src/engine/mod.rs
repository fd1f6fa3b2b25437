//! Line-uniqueness engine.
//!
//! This module provides:
//! - Line normalization per comparison mode ([`normalize`])
//! - Script-specific normalization strategies ([`language`])
//! - Word-set similarity ([`similarity`](similarity::similarity))
//! - The bounded approximate-match index ([`fuzzy`])
//! - The single-pass dedup engine ([`dedup`])

pub mod dedup;
pub mod fuzzy;
pub mod language;
pub mod line;
pub mod normalize;
pub mod similarity;
pub mod stats;

pub use dedup::{
    compile_exclude, process_lines, DedupEngine, DedupOutcome, EngineConfig, FuzzySampling,
    LineCounts, LineVerdict, DEFAULT_BLANK_LOOKBACK, DEFAULT_THRESHOLD,
};
pub use fuzzy::{FuzzyConfig, FuzzyIndex, MatchTier, TierPolicy};
pub use language::{strategy_for, LanguageNormalizer};
pub use line::{split_lines, Line, LineEnding};
pub use normalize::{normalize, ComparisonKey, ComparisonMode, Normalizer};
pub use similarity::{similarity, TokenSet};
pub use stats::RunStatistics;
