//! Command-line interface definitions for linedupe.
//!
//! Global options (verbosity, color, config file) apply to every
//! subcommand. Options left unset fall back to the configuration file and
//! `LINEDUPE_*` environment variables (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Remove duplicate lines in place, ignoring case
//! linedupe dedupe notes.txt
//!
//! # Preview a fuzzy run over a directory as JSON
//! linedupe dedupe logs/ --recursive --mode fuzzy --threshold 0.7 --dry-run --format json
//!
//! # Print new unique lines of a growing log
//! linedupe watch /var/log/app.log --poll-interval 250ms
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::engine::ComparisonMode;
use crate::output::ReportFormat;

/// Remove duplicate lines from text files.
///
/// Lines are compared exactly, case- or whitespace-insensitively, by their
/// set of words, by letters and digits only, or by word-set similarity.
#[derive(Debug, Parser)]
#[command(name = "linedupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir, linedupe/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Named profile from the configuration file
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Remove duplicate lines from files
    Dedupe(DedupeArgs),
    /// Follow a growing file and emit each new unique line
    Watch(WatchArgs),
}

/// Comparison options shared by all subcommands.
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Comparison mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ComparisonMode>,

    /// Similarity threshold for fuzzy mode (0.0 to 1.0)
    #[arg(short, long, value_name = "RATIO")]
    pub threshold: Option<f64>,

    /// Keep lines matching this regular expression untouched
    #[arg(short, long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Language tag selecting script-specific normalization (zh, ja, ko, ar)
    #[arg(long, value_name = "TAG")]
    pub language: Option<String>,

    /// Fixed probability of a fuzzy lookup per line (default: by input size)
    #[arg(long, value_name = "RATE")]
    pub sample_rate: Option<f64>,

    /// Seed for fuzzy sampling, for reproducible runs
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Recent kept lines checked before keeping another blank line
    #[arg(long, value_name = "N")]
    pub blank_lookback: Option<usize>,

    /// Input encoding label (default: detect from byte order mark, else UTF-8)
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Files or directories to process
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Comparison options
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Descend into subdirectories of directory arguments
    #[arg(short, long)]
    pub recursive: bool,

    /// Compute statistics without modifying any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Copy each file to <FILE>.bak before rewriting it
    #[arg(short, long, overrides_with = "no_backup")]
    pub backup: bool,

    /// Do not create backups, even if the configuration enables them
    #[arg(long, overrides_with = "backup")]
    pub no_backup: bool,

    /// Write results into this directory instead of in place
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Lines read per chunk
    #[arg(long, value_name = "LINES")]
    pub chunk_size: Option<usize>,

    /// Files processed in parallel (default: available parallelism)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub report_file: Option<PathBuf>,
}

impl DedupeArgs {
    /// Backup override given on the command line, if any.
    #[must_use]
    pub fn backup_override(&self) -> Option<bool> {
        if self.backup {
            Some(true)
        } else if self.no_backup {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the watch subcommand.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// File to follow
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Comparison options
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Time between polls (e.g. 500ms, 2s)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Recent unique lines kept in memory
    #[arg(long, value_name = "LINES")]
    pub buffer_size: Option<usize>,

    /// Stop after this long (e.g. 30s, 10m, 2h)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub max_runtime: Option<Duration>,

    /// Read what is there and stop instead of following the file
    #[arg(long)]
    pub no_follow: bool,

    /// Append unique lines to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Parse a human-readable duration into a [`Duration`].
///
/// Supports suffixes: ms, s, m, h. Case-insensitive. Numbers without
/// suffix are treated as seconds.
///
/// # Examples
///
/// ```
/// use linedupe::cli::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
/// assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, an unknown suffix, or a fraction of a millisecond.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_lowercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let millis_per_unit = match suffix.as_str() {
        "ms" => 1.0,
        "" | "s" | "sec" | "secs" => 1_000.0,
        "m" | "min" | "mins" => 60_000.0,
        "h" | "hr" | "hrs" => 3_600_000.0,
        _ => return Err(format!("Unknown duration suffix: '{suffix}'")),
    };

    // Intervals are stored as whole milliseconds
    let micros = (num * millis_per_unit * 1_000.0).round() as u64;
    if micros % 1_000 != 0 {
        return Err(format!(
            "Duration '{s}' is not a whole number of milliseconds"
        ));
    }
    Ok(Duration::from_millis(micros / 1_000))
}
