//! Integration tests for configuration functionality.
//!
//! These tests verify the full configuration stack including defaults,
//! TOML file parsing, named profiles, environment variable overrides, CLI
//! flag overrides and validation.

use clap::Parser;
use linedupe::cli::{Cli, Commands};
use linedupe::config::Config;
use linedupe::engine::ComparisonMode;
use linedupe::error::DedupError;
use linedupe::output::ReportFormat;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

// =============================================================================
// Helper Functions
// =============================================================================

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all LINEDUPE_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("LINEDUPE_") {
            std::env::remove_var(key);
        }
    }
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

fn apply_dedupe(config: &mut Config, argv: &[&str]) {
    let cli = Cli::try_parse_from(argv).unwrap();
    match cli.command {
        Commands::Dedupe(ref args) => config.merge_dedupe_args(args),
        Commands::Watch(_) => panic!("Expected Dedupe command"),
    }
}

// =============================================================================
// Basic Configuration Tests
// =============================================================================

#[test]
fn test_config_missing_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("nope.toml"), None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
mode = "whitespace-insensitive"
threshold = 0.65
exclude = "^#"
chunk_size = 500
workers = 3
backup = true
report_format = "json"
poll_interval_ms = 250
"#,
    );

    let config = Config::load_from_path(&path, None).unwrap();
    assert_eq!(config.mode, ComparisonMode::WhitespaceInsensitive);
    assert_eq!(config.threshold, 0.65);
    assert_eq!(config.exclude.as_deref(), Some("^#"));
    assert_eq!(config.chunk_size, 500);
    assert_eq!(config.workers, Some(3));
    assert!(config.backup);
    assert_eq!(config.report_format, ReportFormat::Json);
    assert_eq!(config.stream_config().poll_interval, Duration::from_millis(250));
}

#[test]
fn test_config_unknown_mode_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "mode = \"case-insensitiv\"\n");

    let err = Config::load_from_path(&path, None).unwrap_err();
    assert!(matches!(err, DedupError::InvalidConfiguration(_)));
    assert!(err.to_string().contains("did you mean 'case-insensitive'"));
}

#[test]
fn test_config_malformed_toml_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "mode = [unterminated\n");

    assert!(Config::load_from_path(&path, None).is_err());
}

#[test]
fn test_explicit_missing_config_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();

    let result = Config::load(Some(&dir.path().join("missing.toml")), None);
    assert!(matches!(result, Err(DedupError::InvalidConfiguration(_))));
}

// =============================================================================
// Profiles
// =============================================================================

#[test]
fn test_config_load_profile() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
mode = "case-sensitive"
chunk_size = 100

[profile.logs]
mode = "fuzzy"
threshold = 0.7

[profile.csv]
exclude = "^id,"
"#,
    );

    let logs = Config::load_from_path(&path, Some("logs")).unwrap();
    assert_eq!(logs.mode, ComparisonMode::Fuzzy);
    assert_eq!(logs.threshold, 0.7);
    assert_eq!(logs.chunk_size, 100);

    let csv = Config::load_from_path(&path, Some("csv")).unwrap();
    assert_eq!(csv.mode, ComparisonMode::CaseSensitive);
    assert_eq!(csv.exclude.as_deref(), Some("^id,"));

    let base = Config::load_from_path(&path, None).unwrap();
    assert!(base.profile.contains_key("logs"));
    assert!(base.profile.contains_key("csv"));
}

#[test]
fn test_config_profile_not_found() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "chunk_size = 42\n[profile.logs]\nchunk_size = 7\n");

    let config = Config::load_from_path(&path, Some("nonexistent")).unwrap();
    assert_eq!(config.chunk_size, 42);
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_hierarchy_defaults_file_env_cli() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "mode = \"case-sensitive\"\nchunk_size = 100\n");

    std::env::set_var("LINEDUPE_CHUNK_SIZE", "200");
    std::env::set_var("LINEDUPE_MODE", "alphanumeric-only");
    let mut config = Config::load_from_path(&path, None).unwrap();
    clear_env();

    assert_eq!(config.mode, ComparisonMode::AlphanumericOnly);
    assert_eq!(config.chunk_size, 200);

    apply_dedupe(
        &mut config,
        &["linedupe", "dedupe", "a.txt", "--chunk-size", "300"],
    );
    assert_eq!(config.chunk_size, 300);
    assert_eq!(config.mode, ComparisonMode::AlphanumericOnly);
}

#[test]
fn test_backup_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "backup = true\n");

    let mut config = Config::load_from_path(&path, None).unwrap();
    apply_dedupe(&mut config, &["linedupe", "dedupe", "a.txt"]);
    assert!(config.backup);

    apply_dedupe(&mut config, &["linedupe", "dedupe", "a.txt", "--no-backup"]);
    assert!(!config.backup);

    let mut fresh = Config::default();
    apply_dedupe(&mut fresh, &["linedupe", "dedupe", "a.txt", "-b"]);
    assert!(fresh.backup);
}

#[test]
fn test_watch_args_override() {
    let mut config = Config::default();
    let cli = Cli::try_parse_from([
        "linedupe",
        "watch",
        "app.log",
        "--poll-interval",
        "100ms",
        "--max-runtime",
        "2s",
        "--buffer-size",
        "10",
        "--mode",
        "content-hash",
    ])
    .unwrap();
    match cli.command {
        Commands::Watch(ref args) => config.merge_watch_args(args),
        Commands::Dedupe(_) => panic!("Expected Watch command"),
    }

    let stream = config.stream_config();
    assert_eq!(stream.poll_interval, Duration::from_millis(100));
    assert_eq!(stream.max_runtime, Some(Duration::from_secs(2)));
    assert_eq!(stream.buffer_size, 10);
    assert_eq!(stream.engine.mode, ComparisonMode::ContentHash);
}

#[test]
fn test_watch_rejects_sub_millisecond_interval() {
    let result = Cli::try_parse_from(["linedupe", "watch", "app.log", "--poll-interval", "0.5ms"]);
    assert!(result.is_err());

    let mut config = Config::default();
    let cli = Cli::try_parse_from(["linedupe", "watch", "app.log", "--poll-interval", "1.5s"])
        .unwrap();
    match cli.command {
        Commands::Watch(ref args) => config.merge_watch_args(args),
        Commands::Dedupe(_) => panic!("Expected Watch command"),
    }
    assert_eq!(config.poll_interval_ms, 1_500);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_after_merge() {
    let mut config = Config::default();
    apply_dedupe(
        &mut config,
        &["linedupe", "dedupe", "a.txt", "--threshold", "1.5"],
    );
    assert!(config.validate().is_err());

    let mut config = Config::default();
    apply_dedupe(
        &mut config,
        &["linedupe", "dedupe", "a.txt", "--sample-rate", "0.25"],
    );
    assert!(config.validate().is_ok());
}
