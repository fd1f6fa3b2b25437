//! Layered application configuration.
//!
//! Settings are merged from, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, or `linedupe/config.toml` in the platform
//!    config directory)
//! 3. A named `[profile.NAME]` section of that file (`--profile`)
//! 4. `LINEDUPE_*` environment variables (e.g. `LINEDUPE_MODE=fuzzy`)
//! 5. Command-line flags
//!
//! ```toml
//! mode = "case-insensitive"
//! chunk_size = 50000
//! backup = true
//!
//! [profile.logs]
//! mode = "fuzzy"
//! threshold = 0.7
//! exclude = "^#"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use encoding_rs::Encoding;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cli::{DedupeArgs, EngineArgs, WatchArgs};
use crate::engine::{
    ComparisonMode, EngineConfig, FuzzySampling, DEFAULT_BLANK_LOOKBACK, DEFAULT_THRESHOLD,
};
use crate::error::DedupError;
use crate::input::{resolve_encoding, DEFAULT_CHUNK_SIZE};
use crate::output::ReportFormat;
use crate::processor::{default_workers, ProcessorConfig};
use crate::streaming::{StreamConfig, DEFAULT_BUFFER_SIZE, DEFAULT_POLL_INTERVAL};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "LINEDUPE_";

const KNOWN_KEYS: &[&str] = &[
    "mode",
    "threshold",
    "exclude",
    "language",
    "chunk_size",
    "workers",
    "blank_lookback",
    "fuzzy_sample_rate",
    "seed",
    "backup",
    "encoding",
    "report_format",
    "recursive",
    "poll_interval_ms",
    "buffer_size",
    "max_runtime_ms",
    "profile",
];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Comparison mode
    pub mode: ComparisonMode,
    /// Fuzzy similarity threshold
    pub threshold: f64,
    /// Lines matching this regular expression are always kept
    pub exclude: Option<String>,
    /// Language tag for script-specific normalization
    pub language: Option<String>,
    /// Lines read per chunk
    pub chunk_size: usize,
    /// Worker threads (default: available parallelism)
    pub workers: Option<usize>,
    /// Retained lines checked before keeping another blank line
    pub blank_lookback: usize,
    /// Fixed fuzzy lookup probability; progressive when unset
    pub fuzzy_sample_rate: Option<f64>,
    /// Seed for fuzzy sampling
    pub seed: Option<u64>,
    /// Copy files to `.bak` before rewriting them
    pub backup: bool,
    /// Input encoding label; byte order mark detection when unset
    pub encoding: Option<String>,
    /// Report format of the dedupe command
    pub report_format: ReportFormat,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Watch poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Recent unique lines kept by the watch command
    pub buffer_size: usize,
    /// Watch session limit in milliseconds
    pub max_runtime_ms: Option<u64>,
    /// Named profiles
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub profile: HashMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::default(),
            threshold: DEFAULT_THRESHOLD,
            exclude: None,
            language: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: None,
            blank_lookback: DEFAULT_BLANK_LOOKBACK,
            fuzzy_sample_rate: None,
            seed: None,
            backup: false,
            encoding: None,
            report_format: ReportFormat::default(),
            recursive: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_runtime_ms: None,
            profile: HashMap::new(),
        }
    }
}

impl Config {
    /// Default configuration file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "linedupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the configuration from `cli_path` or the default location.
    ///
    /// A missing default file is not an error; a missing `--config` file is.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] if the file is missing
    /// (explicit path only), malformed, or holds values of the wrong type.
    pub fn load(cli_path: Option<&Path>, profile: Option<&str>) -> Result<Self, DedupError> {
        match cli_path {
            Some(path) if !path.exists() => Err(DedupError::InvalidConfiguration(format!(
                "configuration file not found: {}",
                path.display()
            ))),
            Some(path) => Self::load_from_path(path, profile),
            None => match Self::default_path() {
                Some(path) => Self::load_from_path(path, profile),
                None => {
                    log::debug!("No configuration directory, using defaults and environment");
                    Self::extract(Self::base_figment(), None)
                }
            },
        }
    }

    /// Load the configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] if the file is malformed
    /// or holds values of the wrong type.
    pub fn load_from_path(
        path: impl AsRef<Path>,
        profile: Option<&str>,
    ) -> Result<Self, DedupError> {
        let path = path.as_ref();
        let mut figment = Self::base_figment();
        if path.exists() {
            log::debug!("Loading configuration from {}", path.display());
            warn_unknown_keys(path);
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment, profile)
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn extract(mut figment: Figment, profile: Option<&str>) -> Result<Self, DedupError> {
        if let Some(name) = profile {
            let key = format!("profile.{name}");
            if figment.find_value(&key).is_ok() {
                log::debug!("Applying configuration profile '{}'", name);
                let overlay = figment.focus(&key);
                figment = figment.merge(overlay);
            } else {
                log::warn!("Configuration profile '{}' not found", name);
            }
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]))
            .extract()
            .map_err(|e| DedupError::InvalidConfiguration(e.to_string()))
    }

    /// Apply comparison options given on the command line.
    pub fn merge_engine_args(&mut self, args: &EngineArgs) {
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(ref exclude) = args.exclude {
            self.exclude = Some(exclude.clone());
        }
        if let Some(ref language) = args.language {
            self.language = Some(language.clone());
        }
        if let Some(rate) = args.sample_rate {
            self.fuzzy_sample_rate = Some(rate);
        }
        if let Some(seed) = args.seed {
            self.seed = Some(seed);
        }
        if let Some(lookback) = args.blank_lookback {
            self.blank_lookback = lookback;
        }
        if let Some(ref encoding) = args.encoding {
            self.encoding = Some(encoding.clone());
        }
    }

    /// Apply `dedupe` options given on the command line.
    pub fn merge_dedupe_args(&mut self, args: &DedupeArgs) {
        self.merge_engine_args(&args.engine);
        if args.recursive {
            self.recursive = true;
        }
        if let Some(backup) = args.backup_override() {
            self.backup = backup;
        }
        if let Some(chunk_size) = args.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(workers) = args.workers {
            self.workers = Some(workers);
        }
        if let Some(format) = args.format {
            self.report_format = format;
        }
    }

    /// Apply `watch` options given on the command line.
    pub fn merge_watch_args(&mut self, args: &WatchArgs) {
        self.merge_engine_args(&args.engine);
        if let Some(interval) = args.poll_interval {
            self.poll_interval_ms = interval.as_millis() as u64;
        }
        if let Some(size) = args.buffer_size {
            self.buffer_size = size;
        }
        if let Some(max) = args.max_runtime {
            self.max_runtime_ms = Some(max.as_millis() as u64);
        }
    }

    /// Check every value before processing starts.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] naming the first
    /// offending setting.
    pub fn validate(&self) -> Result<(), DedupError> {
        let invalid = |msg: String| Err(DedupError::InvalidConfiguration(msg));

        if !(0.0..=1.0).contains(&self.threshold) {
            return invalid(format!(
                "threshold must be between 0 and 1, got {}",
                self.threshold
            ));
        }
        if self.chunk_size == 0 {
            return invalid("chunk_size must be greater than zero".to_string());
        }
        if self.buffer_size == 0 {
            return invalid("buffer_size must be greater than zero".to_string());
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be greater than zero".to_string());
        }
        if self.workers == Some(0) {
            return invalid("workers must be greater than zero".to_string());
        }
        if let Some(rate) = self.fuzzy_sample_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return invalid(format!("fuzzy_sample_rate must be in (0, 1], got {rate}"));
            }
        }
        self.input_encoding()?;
        Ok(())
    }

    /// Forced input encoding, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] for an unknown label.
    pub fn input_encoding(&self) -> Result<Option<&'static Encoding>, DedupError> {
        self.encoding.as_deref().map(resolve_encoding).transpose()
    }

    /// Engine settings for this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default()
            .with_mode(self.mode)
            .with_threshold(self.threshold)
            .with_blank_lookback(self.blank_lookback);
        if let Some(ref pattern) = self.exclude {
            engine = engine.with_exclude_pattern(pattern);
        }
        if let Some(ref tag) = self.language {
            engine = engine.with_language_tag(tag);
        }
        if let Some(rate) = self.fuzzy_sample_rate {
            engine = engine.with_sampling(FuzzySampling::Fixed(rate));
        }
        if let Some(seed) = self.seed {
            engine = engine.with_seed(seed);
        }
        engine
    }

    /// Batch settings for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] for an unknown encoding.
    pub fn processor_config(&self) -> Result<ProcessorConfig, DedupError> {
        Ok(ProcessorConfig::default()
            .with_engine(self.engine_config())
            .with_chunk_size(self.chunk_size)
            .with_workers(self.workers.unwrap_or_else(default_workers))
            .with_backup(self.backup)
            .with_encoding(self.input_encoding()?))
    }

    /// Streaming settings for this configuration.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default()
            .with_engine(self.engine_config())
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_buffer_size(self.buffer_size)
            .with_max_runtime(self.max_runtime_ms.map(Duration::from_millis))
    }
}

/// Log a warning for every top-level key of `path` that is not a setting.
fn warn_unknown_keys(path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    let Ok(table) = content.parse::<toml::Table>() else {
        return;
    };

    for key in table.keys() {
        if KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        let suggestion = KNOWN_KEYS
            .iter()
            .map(|known| (*known, strsim::jaro_winkler(key, known)))
            .filter(|(_, score)| *score > 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(known, _)| known);

        match suggestion {
            Some(known) => log::warn!(
                "Unknown configuration key '{}' in {} (did you mean '{}'?)",
                key,
                path.display(),
                known
            ),
            None => log::warn!(
                "Unknown configuration key '{}' in {}",
                key,
                path.display()
            ),
        }
    }
}
