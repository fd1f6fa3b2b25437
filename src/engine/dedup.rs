//! Single-pass line deduplication.
//!
//! # Overview
//!
//! [`DedupEngine`] decides, line by line, whether a line is new under the
//! configured [`ComparisonMode`]. For every line it applies, in order:
//!
//! 1. **Empty-line policy** - a blank line is kept unless one of the last
//!    few retained lines is blank, collapsing runs of blank lines
//! 2. **Exclude filter** - lines matching the exclude pattern are kept
//!    untouched and never recorded
//! 3. **Exact check** - the comparison key is looked up in the seen set
//! 4. **Fuzzy check** - under fuzzy mode, a sampled similarity lookup in the
//!    [`FuzzyIndex`]
//!
//! One engine spans every chunk of one input, so duplicates that cross
//! chunk boundaries are still found. Separate inputs use separate engines.
//!
//! # Example
//!
//! ```
//! use linedupe::engine::{process_lines, split_lines, ComparisonMode, EngineConfig};
//!
//! let lines = split_lines("Line 1\nLine 2\nLine 1\nLINE 1\nLine 3\n");
//! let config = EngineConfig::default().with_mode(ComparisonMode::CaseInsensitive);
//! let outcome = process_lines(lines, &config);
//!
//! assert_eq!(outcome.counts.unique, 3);
//! assert_eq!(outcome.counts.duplicates, 2);
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use regex::Regex;
use serde::Serialize;

use super::fuzzy::{FuzzyConfig, FuzzyIndex};
use super::language::{self, LanguageNormalizer};
use super::line::Line;
use super::normalize::{ComparisonKey, ComparisonMode, Normalizer};
use crate::error::DedupError;

/// Default similarity threshold for fuzzy mode.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Default number of retained lines inspected by the empty-line policy.
pub const DEFAULT_BLANK_LOOKBACK: usize = 3;

/// How often a fuzzy lookup is performed for lines that are not exact
/// duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FuzzySampling {
    /// Check every line of small inputs, and progressively fewer as the
    /// input grows: all of the first 10 000 lines, half up to 100 000,
    /// then one in ten.
    #[default]
    Progressive,
    /// Check each line with a fixed probability in `(0, 1]`.
    Fixed(f64),
}

impl FuzzySampling {
    /// Probability that line number `lines_seen` gets a fuzzy lookup.
    #[must_use]
    pub fn rate_for(&self, lines_seen: usize) -> f64 {
        match *self {
            Self::Fixed(rate) => rate,
            Self::Progressive if lines_seen <= 10_000 => 1.0,
            Self::Progressive if lines_seen <= 100_000 => 0.5,
            Self::Progressive => 0.1,
        }
    }
}

/// Compile an exclude pattern, disabling the filter if it is malformed.
///
/// A malformed pattern is logged and treated as "no filter" so processing
/// can continue.
#[must_use]
pub fn compile_exclude(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(source) => {
            let err = DedupError::InvalidExcludePattern {
                pattern: pattern.to_string(),
                source,
            };
            log::warn!("{}; continuing without an exclude filter", err);
            None
        }
    }
}

/// Configuration of one dedup run.
#[derive(Clone)]
pub struct EngineConfig {
    /// Comparison mode.
    pub mode: ComparisonMode,
    /// Similarity threshold for fuzzy mode, in `[0, 1]`.
    pub threshold: f64,
    /// Lines matching this pattern are always kept.
    pub exclude: Option<Regex>,
    /// Optional script-specific normalization strategy.
    pub language: Option<Arc<dyn LanguageNormalizer>>,
    /// Retained lines inspected by the empty-line policy.
    pub blank_lookback: usize,
    /// Fuzzy working set bounds and tier policy.
    pub fuzzy: FuzzyConfig,
    /// Fuzzy lookup sampling.
    pub sampling: FuzzySampling,
    /// Seed for all sampling decisions; entropy when `None`.
    pub seed: Option<u64>,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("mode", &self.mode)
            .field("threshold", &self.threshold)
            .field("exclude", &self.exclude.as_ref().map(Regex::as_str))
            .field("language", &self.language.as_ref().map(|l| l.tag()))
            .field("blank_lookback", &self.blank_lookback)
            .field("fuzzy", &self.fuzzy)
            .field("sampling", &self.sampling)
            .field("seed", &self.seed)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::default(),
            threshold: DEFAULT_THRESHOLD,
            exclude: None,
            language: None,
            blank_lookback: DEFAULT_BLANK_LOOKBACK,
            fuzzy: FuzzyConfig::default(),
            sampling: FuzzySampling::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Set the comparison mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the fuzzy similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the exclude pattern. A malformed pattern disables the filter.
    #[must_use]
    pub fn with_exclude_pattern(mut self, pattern: &str) -> Self {
        self.exclude = compile_exclude(pattern);
        self
    }

    /// Select a normalization strategy by language tag.
    #[must_use]
    pub fn with_language_tag(mut self, tag: &str) -> Self {
        self.language = language::strategy_for(tag);
        self
    }

    /// Set the empty-line lookback window.
    #[must_use]
    pub fn with_blank_lookback(mut self, lookback: usize) -> Self {
        self.blank_lookback = lookback;
        self
    }

    /// Set the fuzzy working set configuration.
    #[must_use]
    pub fn with_fuzzy_config(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Set the fuzzy lookup sampling.
    #[must_use]
    pub fn with_sampling(mut self, sampling: FuzzySampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Make sampling deterministic.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the configuration before any input is processed.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] for a threshold outside
    /// `[0, 1]`, a sample rate outside `(0, 1]`, or an empty working set.
    pub fn validate(&self) -> Result<(), DedupError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DedupError::InvalidConfiguration(format!(
                "similarity threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        if let FuzzySampling::Fixed(rate) = self.sampling {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(DedupError::InvalidConfiguration(format!(
                    "fuzzy sample rate must be in (0, 1], got {rate}"
                )));
            }
        }
        if self.fuzzy.working_set_cap == 0 || self.fuzzy.eviction_block == 0 {
            return Err(DedupError::InvalidConfiguration(
                "fuzzy working set cap and eviction block must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decision taken for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    /// First occurrence under the comparison mode; kept.
    Unique,
    /// Blank line kept by the empty-line policy.
    Blank,
    /// Matched the exclude pattern; kept without comparison.
    Excluded,
    /// Exact or fuzzy duplicate; dropped.
    Duplicate,
    /// Blank line dropped by the empty-line policy.
    CollapsedBlank,
}

impl LineVerdict {
    /// Whether the line is part of the output.
    #[must_use]
    pub fn is_retained(self) -> bool {
        matches!(self, Self::Unique | Self::Blank | Self::Excluded)
    }
}

/// Running line counts of one engine.
///
/// `unique` counts every retained line (including kept blank and excluded
/// lines), so `unique + duplicates == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineCounts {
    /// Lines evaluated.
    pub total: usize,
    /// Lines retained.
    pub unique: usize,
    /// Lines dropped.
    pub duplicates: usize,
    /// Retained lines that matched the exclude pattern.
    pub excluded: usize,
    /// Retained blank lines.
    pub blank: usize,
    /// Dropped lines found by the fuzzy lookup.
    pub fuzzy_matches: usize,
    /// Lines that skipped the fuzzy lookup because of sampling.
    pub unsampled: usize,
}

/// Stateful line-uniqueness engine for one input.
pub struct DedupEngine {
    normalizer: Normalizer,
    threshold: f64,
    exclude: Option<Regex>,
    blank_lookback: usize,
    sampling: FuzzySampling,
    seen: HashSet<ComparisonKey>,
    fuzzy: Option<FuzzyIndex>,
    /// Blankness of the most recently retained lines, newest last.
    recent: VecDeque<bool>,
    rng: Box<dyn RngCore + Send>,
    counts: LineCounts,
}

impl fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupEngine")
            .field("normalizer", &self.normalizer)
            .field("threshold", &self.threshold)
            .field("seen", &self.seen.len())
            .field("fuzzy", &self.fuzzy)
            .field("counts", &self.counts)
            .finish()
    }
}

impl DedupEngine {
    /// Create an engine with an empty seen set.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self::with_rng(config, rng)
    }

    /// Create an engine drawing all sampling decisions from `rng`.
    #[must_use]
    pub fn with_rng(config: &EngineConfig, mut rng: Box<dyn RngCore + Send>) -> Self {
        let fuzzy = config.mode.is_fuzzy().then(|| {
            let index_rng = StdRng::seed_from_u64(rng.next_u64());
            FuzzyIndex::new(config.fuzzy).with_rng(Box::new(index_rng))
        });

        Self {
            normalizer: Normalizer::new(config.mode).with_language(config.language.clone()),
            threshold: config.threshold,
            exclude: config.exclude.clone(),
            blank_lookback: config.blank_lookback,
            sampling: config.sampling,
            seen: HashSet::new(),
            fuzzy,
            recent: VecDeque::with_capacity(config.blank_lookback),
            rng,
            counts: LineCounts::default(),
        }
    }

    /// Counts accumulated so far.
    #[must_use]
    pub fn counts(&self) -> LineCounts {
        self.counts
    }

    /// Number of keys in the seen set.
    #[must_use]
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Consume the engine, returning its seen set.
    #[must_use]
    pub fn into_seen(self) -> HashSet<ComparisonKey> {
        self.seen
    }

    /// Evaluate one line of a file, applying the empty-line policy.
    pub fn process_line(&mut self, line: &Line) -> LineVerdict {
        self.counts.total += 1;
        let verdict = self.classify(&line.text, true);
        if verdict.is_retained() {
            self.remember(verdict == LineVerdict::Blank);
        }
        verdict
    }

    /// Evaluate one line of a stream.
    ///
    /// There is no retained-line history in a stream, so blank lines are
    /// dropped instead of going through the empty-line policy.
    pub fn process_streamed(&mut self, text: &str) -> LineVerdict {
        self.counts.total += 1;
        self.classify(text, false)
    }

    /// Evaluate a chunk of lines, returning the retained ones in order.
    pub fn process_chunk<I>(&mut self, lines: I) -> Vec<Line>
    where
        I: IntoIterator<Item = Line>,
    {
        lines
            .into_iter()
            .filter(|line| self.process_line(line).is_retained())
            .collect()
    }

    fn remember(&mut self, blank: bool) {
        if self.blank_lookback == 0 {
            return;
        }
        if self.recent.len() == self.blank_lookback {
            self.recent.pop_front();
        }
        self.recent.push_back(blank);
    }

    fn classify(&mut self, text: &str, blank_policy: bool) -> LineVerdict {
        let blank = text.trim().is_empty();

        if !blank && self.exclude.as_ref().is_some_and(|re| re.is_match(text)) {
            self.counts.unique += 1;
            self.counts.excluded += 1;
            return LineVerdict::Excluded;
        }

        let key = if blank {
            None
        } else {
            Some(self.normalizer.key(text)).filter(|key| !key.is_empty())
        };

        match key {
            Some(key) => self.classify_key(key),
            None if blank_policy && !self.recent.iter().any(|b| *b) => {
                self.counts.unique += 1;
                self.counts.blank += 1;
                LineVerdict::Blank
            }
            None => {
                self.counts.duplicates += 1;
                LineVerdict::CollapsedBlank
            }
        }
    }

    fn classify_key(&mut self, key: ComparisonKey) -> LineVerdict {
        if self.seen.contains(&key) {
            self.counts.duplicates += 1;
            return LineVerdict::Duplicate;
        }

        if let Some(fuzzy) = self.fuzzy.as_mut() {
            let candidate = key.as_text().unwrap_or_default();
            let rate = self.sampling.rate_for(self.counts.total);
            let checked = rate >= 1.0 || self.rng.gen_bool(rate);

            if checked {
                if fuzzy.is_duplicate(candidate, self.threshold) {
                    self.counts.duplicates += 1;
                    self.counts.fuzzy_matches += 1;
                    return LineVerdict::Duplicate;
                }
            } else {
                self.counts.unsampled += 1;
            }
            fuzzy.insert(candidate);
        }

        self.seen.insert(key);
        self.counts.unique += 1;
        LineVerdict::Unique
    }
}

/// Retained lines, final seen set and counts of a whole run.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Retained lines in input order.
    pub retained: Vec<Line>,
    /// Comparison keys recorded during the run.
    pub seen: HashSet<ComparisonKey>,
    /// Line counts.
    pub counts: LineCounts,
}

/// Deduplicate an in-memory sequence of lines with a fresh engine.
pub fn process_lines<I>(lines: I, config: &EngineConfig) -> DedupOutcome
where
    I: IntoIterator<Item = Line>,
{
    let mut engine = DedupEngine::new(config);
    let retained = engine.process_chunk(lines);
    let counts = engine.counts();
    DedupOutcome {
        retained,
        seen: engine.into_seen(),
        counts,
    }
}
