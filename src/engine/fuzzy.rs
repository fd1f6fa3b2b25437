//! Approximate-match index over previously retained lines.
//!
//! # Overview
//!
//! The index holds a bounded working set of normalized lines and answers
//! "is this line within the similarity threshold of something already
//! seen". The cost of one query is bounded by a three-tier policy keyed on
//! the working-set size:
//!
//! 1. **Exhaustive** - small sets are compared entry by entry (exact recall)
//! 2. **Sampled** - medium sets are compared against a random sample
//! 3. **Indexed** - large sets are narrowed through an inverted index of
//!    long tokens, then scored
//!
//! Tiers 2 and 3 trade recall for latency: a near-duplicate that is not
//! sampled, or that shares no long token with the candidate, is accepted as
//! unique.
//!
//! # Example
//!
//! ```
//! use linedupe::engine::{FuzzyConfig, FuzzyIndex};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut index = FuzzyIndex::new(FuzzyConfig::default())
//!     .with_rng(Box::new(StdRng::seed_from_u64(7)));
//! index.insert("hello world goodbye");
//!
//! assert!(index.is_duplicate("hello world hi", 0.5));
//! assert!(!index.is_duplicate("hello world hi", 0.9));
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::similarity::TokenSet;

/// Tokens this long or shorter are not indexed.
const SHORT_TOKEN_LEN: usize = 3;

/// Strategy used to answer one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Compare against every entry.
    Exhaustive,
    /// Compare against a fixed-size random sample.
    Sampled,
    /// Compare against entries sharing a long token with the candidate.
    Indexed,
}

/// Size thresholds and sample sizes of the tiered lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Working sets smaller than this are searched exhaustively.
    pub exhaustive_limit: usize,
    /// Working sets at least this large use the inverted index.
    pub indexed_from: usize,
    /// Sample size for the sampled tier.
    pub sample_size: usize,
    /// Maximum candidates scored in the indexed tier.
    pub candidate_limit: usize,
    /// Sample size when no indexed candidate shares a token.
    pub fallback_sample: usize,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            exhaustive_limit: 1_000,
            indexed_from: 10_000,
            sample_size: 100,
            candidate_limit: 1_000,
            fallback_sample: 50,
        }
    }
}

impl TierPolicy {
    /// Tier used for a working set of `size` entries.
    #[must_use]
    pub fn tier_for(&self, size: usize) -> MatchTier {
        if size < self.exhaustive_limit {
            MatchTier::Exhaustive
        } else if size < self.indexed_from {
            MatchTier::Sampled
        } else {
            MatchTier::Indexed
        }
    }
}

/// Configuration for the approximate-match index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyConfig {
    /// Tiered lookup thresholds.
    pub policy: TierPolicy,
    /// Maximum entries kept in the working set.
    pub working_set_cap: usize,
    /// Oldest entries dropped at once when the cap is exceeded.
    pub eviction_block: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            policy: TierPolicy::default(),
            working_set_cap: 20_000,
            eviction_block: 2_000,
        }
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    tokens: TokenSet,
}

/// Bounded working set of normalized lines with tiered similarity lookup.
pub struct FuzzyIndex {
    config: FuzzyConfig,
    entries: VecDeque<Entry>,
    /// Long token -> ids of entries containing it. Ids below `first_id`
    /// were evicted and are skipped on lookup.
    postings: HashMap<String, Vec<u64>>,
    next_id: u64,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for FuzzyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzyIndex")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .field("postings", &self.postings.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl FuzzyIndex {
    /// Create an empty index with an entropy-seeded random source.
    #[must_use]
    pub fn new(config: FuzzyConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
            postings: HashMap::new(),
            next_id: 0,
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source used for sampling.
    #[must_use]
    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }

    /// Number of entries in the working set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the working set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tier the next query will use.
    #[must_use]
    pub fn tier(&self) -> MatchTier {
        self.config.policy.tier_for(self.entries.len())
    }

    fn first_id(&self) -> u64 {
        self.entries.front().map_or(self.next_id, |e| e.id)
    }

    /// Add a normalized line to the working set, evicting the oldest block
    /// once the cap is exceeded.
    pub fn insert(&mut self, normalized: &str) {
        let id = self.next_id;
        self.next_id += 1;

        let tokens = TokenSet::new(normalized);
        for token in tokens.iter().filter(|t| t.chars().count() > SHORT_TOKEN_LEN) {
            self.postings.entry(token.to_string()).or_default().push(id);
        }
        self.entries.push_back(Entry { id, tokens });

        if self.entries.len() > self.config.working_set_cap {
            self.evict();
        }
    }

    fn evict(&mut self) {
        let count = self.config.eviction_block.clamp(1, self.entries.len());
        self.entries.drain(..count);

        let first_id = self.first_id();
        self.postings.retain(|_, ids| {
            ids.retain(|id| *id >= first_id);
            !ids.is_empty()
        });

        log::debug!(
            "Fuzzy working set evicted {} entries, {} remain",
            count,
            self.entries.len()
        );
    }

    /// Whether `candidate` scores at least `threshold` against an entry
    /// chosen by the current tier.
    ///
    /// A threshold of 1.0 or more disables fuzzy matching and always
    /// returns `false`.
    pub fn is_duplicate(&mut self, candidate: &str, threshold: f64) -> bool {
        if threshold >= 1.0 || self.entries.is_empty() {
            return false;
        }

        let tokens = TokenSet::new(candidate);
        let positions = match self.tier() {
            MatchTier::Exhaustive => (0..self.entries.len()).collect(),
            MatchTier::Sampled => self.sample_positions(self.config.policy.sample_size),
            MatchTier::Indexed => {
                let candidates = self.indexed_positions(&tokens);
                if candidates.is_empty() {
                    self.sample_positions(self.config.policy.fallback_sample)
                } else {
                    candidates
                }
            }
        };

        positions
            .into_iter()
            .any(|pos| self.entries[pos].tokens.jaccard(&tokens) >= threshold)
    }

    fn sample_positions(&mut self, amount: usize) -> Vec<usize> {
        let len = self.entries.len();
        rand::seq::index::sample(&mut *self.rng, len, amount.min(len)).into_vec()
    }

    /// Positions of entries sharing a long token with `tokens`, sampled
    /// down to the candidate limit.
    fn indexed_positions(&mut self, tokens: &TokenSet) -> Vec<usize> {
        let first_id = self.first_id();
        let mut ids: HashSet<u64> = HashSet::new();
        for token in tokens.iter().filter(|t| t.chars().count() > SHORT_TOKEN_LEN) {
            if let Some(postings) = self.postings.get(token) {
                ids.extend(postings.iter().filter(|id| **id >= first_id));
            }
        }

        let mut positions: Vec<usize> = ids
            .into_iter()
            .map(|id| (id - first_id) as usize)
            .collect();

        let limit = self.config.policy.candidate_limit;
        if positions.len() > limit {
            let keep = rand::seq::index::sample(&mut *self.rng, positions.len(), limit);
            positions = keep.into_iter().map(|i| positions[i]).collect();
        }
        positions
    }
}
