//! linedupe - Duplicate line remover
//!
//! Removes duplicate lines from text files under a configurable notion of
//! equality (exact, case- or whitespace-insensitive, word set, letters and
//! digits only, or word-set similarity), across many files in parallel or
//! continuously against a growing file.

pub mod actions;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod logging;
pub mod output;
pub mod processor;
pub mod progress;
pub mod signal;
pub mod streaming;

use std::fs::OpenOptions;
use std::io::{BufWriter, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::actions::Destination;
use crate::cli::{Cli, Commands, DedupeArgs, WatchArgs};
use crate::config::Config;
use crate::error::{DedupError, ExitCode};
use crate::input::expand_targets;
use crate::output::{render_report, ReportFormat};
use crate::processor::{process_files, BatchSummary};
use crate::progress::Progress;
use crate::signal::ShutdownHandler;
use crate::streaming::{StopReason, StreamController};

/// Run the application with parsed command-line arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, when no input file is
/// found, or when the report or stream output cannot be written. Per-file
/// failures of a batch are reported, not returned.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    log::debug!("linedupe v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref(), cli.profile.as_deref())
        .context("Failed to load configuration")?;
    let handler = signal::install_handler().context("Failed to set up signal handling")?;

    match cli.command {
        Commands::Dedupe(ref args) => {
            config.merge_dedupe_args(args);
            config.validate()?;
            log::debug!("Effective configuration: {:?}", config);
            run_dedupe(&cli, args, &config, &handler)
        }
        Commands::Watch(ref args) => {
            config.merge_watch_args(args);
            config.validate()?;
            log::debug!("Effective configuration: {:?}", config);
            run_watch(args, &config, &handler)
        }
    }
}

fn run_dedupe(
    cli: &Cli,
    args: &DedupeArgs,
    config: &Config,
    handler: &ShutdownHandler,
) -> anyhow::Result<ExitCode> {
    let targets = expand_targets(&args.paths, config.recursive);
    if targets.is_empty() {
        bail!("No input files found");
    }

    let format = config.report_format;
    let mut processor = config
        .processor_config()?
        .with_dry_run(args.dry_run)
        .with_destination(Destination::from_output_dir(args.output_dir.clone()))
        .with_shutdown_flag(handler.get_flag());
    if !cli.quiet && !format.is_machine_readable() {
        processor = processor.with_progress_callback(Arc::new(Progress::new(false)));
    }
    processor.validate()?;

    if args.dry_run {
        log::info!("Dry run: no file will be modified");
    }
    let reports = process_files(&targets, &processor);
    let exit_code = BatchSummary::from_reports(&reports).exit_code();

    if cli.quiet && format == ReportFormat::Text {
        return Ok(exit_code);
    }

    let color = !cli.no_color && args.report_file.is_none() && std::io::stdout().is_terminal();
    let report = render_report(format, &reports, exit_code, color)?;
    match args.report_file {
        Some(ref path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.as_bytes())?;
            if !report.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }

    Ok(exit_code)
}

fn run_watch(
    args: &WatchArgs,
    config: &Config,
    handler: &ShutdownHandler,
) -> anyhow::Result<ExitCode> {
    if !args.file.exists() {
        return Err(DedupError::InputNotFound(args.file.clone()).into());
    }

    let stream_config = config
        .stream_config()
        .with_follow(!args.no_follow)
        .with_shutdown_flag(handler.get_flag());
    stream_config.validate()?;

    let stats = match args.output {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| DedupError::OutputWriteFailure {
                    path: path.clone(),
                    source,
                })?;
            StreamController::new(&args.file, stream_config, BufWriter::new(file)).run()
        }
        None => StreamController::new(&args.file, stream_config, std::io::stdout().lock()).run(),
    };

    match stats.stop_reason {
        StopReason::Interrupted => Ok(ExitCode::Interrupted),
        StopReason::OutputFailed => bail!("Failed to write unique lines"),
        StopReason::Completed | StopReason::MaxRuntime | StopReason::SourceMissing => {
            Ok(ExitCode::Success)
        }
    }
}
