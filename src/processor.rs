//! Per-file deduplication and the parallel multi-file driver.
//!
//! # Overview
//!
//! [`process_file`] runs one target through the engine: it reads the file
//! in chunks of `chunk_size` lines, feeds every chunk to a single
//! [`DedupEngine`] (so duplicates across chunk boundaries are found) and
//! streams the retained lines to the output sink.
//!
//! [`process_files`] runs many targets on a rayon pool of `workers` threads.
//! Each target gets its own engine, failures are captured in that target's
//! [`TargetReport`], and reports come back in input order.
//!
//! # Example
//!
//! ```no_run
//! use linedupe::processor::{process_files, ProcessorConfig};
//! use std::path::PathBuf;
//!
//! let config = ProcessorConfig::default().with_dry_run(true);
//! let reports = process_files(&[PathBuf::from("a.txt"), PathBuf::from("b.txt")], &config);
//! for report in &reports {
//!     println!("{}: {}", report.target.display(), report.status_label());
//! }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use encoding_rs::Encoding;
use rayon::prelude::*;

use crate::actions::{create_backup, Destination, RetainedWriter};
use crate::engine::{DedupEngine, EngineConfig, RunStatistics};
use crate::error::{DedupError, ExitCode};
use crate::input::{detect_encoding, LineReader, DEFAULT_CHUNK_SIZE};
use crate::progress::ProgressCallback;

/// Configuration of a batch run.
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Engine settings shared by every target
    pub engine: EngineConfig,
    /// Lines per chunk
    pub chunk_size: usize,
    /// Worker threads for multi-file runs
    pub workers: usize,
    /// Compute statistics without writing
    pub dry_run: bool,
    /// Copy each target to `<target>.bak` before rewriting it
    pub backup: bool,
    /// Where retained lines go
    pub destination: Destination,
    /// Forced input encoding; BOM sniffing otherwise
    pub encoding: Option<&'static Encoding>,
    /// Shutdown flag checked between chunks
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress callback for the files phase
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("engine", &self.engine)
            .field("chunk_size", &self.chunk_size)
            .field("workers", &self.workers)
            .field("dry_run", &self.dry_run)
            .field("backup", &self.backup)
            .field("destination", &self.destination)
            .field("encoding", &self.encoding.map(Encoding::name))
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Number of worker threads used when none is configured.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: default_workers(),
            dry_run: false,
            backup: false,
            destination: Destination::InPlace,
            encoding: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ProcessorConfig {
    /// Set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Set the number of lines per chunk.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable backups.
    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Set the output destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Force an input encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Option<&'static Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check the configuration before any target is touched.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] for a zero chunk size,
    /// zero workers, or an invalid engine configuration.
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.chunk_size == 0 {
            return Err(DedupError::InvalidConfiguration(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(DedupError::InvalidConfiguration(
                "worker count must be positive".to_string(),
            ));
        }
        self.engine.validate()
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Result of one requested target.
#[derive(Debug)]
pub enum TargetOutcome {
    /// Processed to the end.
    Completed(RunStatistics),
    /// Stopped with an error; nothing was written.
    Failed(DedupError),
}

/// Report for one requested target.
#[derive(Debug)]
pub struct TargetReport {
    /// Target as requested
    pub target: PathBuf,
    /// What happened
    pub outcome: TargetOutcome,
}

impl TargetReport {
    /// Wrap the result of [`process_file`].
    #[must_use]
    pub fn from_result(target: &Path, result: Result<RunStatistics, DedupError>) -> Self {
        let outcome = match result {
            Ok(stats) => TargetOutcome::Completed(stats),
            Err(err) => TargetOutcome::Failed(err),
        };
        Self {
            target: target.to_path_buf(),
            outcome,
        }
    }

    /// Statistics, if the target completed.
    #[must_use]
    pub fn stats(&self) -> Option<&RunStatistics> {
        match &self.outcome {
            TargetOutcome::Completed(stats) => Some(stats),
            TargetOutcome::Failed(_) => None,
        }
    }

    /// Error, if the target failed.
    #[must_use]
    pub fn error(&self) -> Option<&DedupError> {
        match &self.outcome {
            TargetOutcome::Completed(_) => None,
            TargetOutcome::Failed(err) => Some(err),
        }
    }

    /// Short status used in reports.
    #[must_use]
    pub fn status_label(&self) -> String {
        match &self.outcome {
            TargetOutcome::Completed(stats) if stats.dry_run => "Dry run".to_string(),
            TargetOutcome::Completed(_) => "Success".to_string(),
            TargetOutcome::Failed(err) => format!("ERROR: {err}"),
        }
    }
}

/// Totals over a batch of reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Targets requested
    pub files_total: usize,
    /// Targets that completed
    pub files_processed: usize,
    /// Targets that failed
    pub files_failed: usize,
    /// Lines read across completed targets
    pub total_lines: usize,
    /// Lines retained across completed targets
    pub unique_lines: usize,
    /// Lines removed across completed targets
    pub duplicates_removed: usize,
    /// Whether any target was stopped by a shutdown request
    pub interrupted: bool,
}

impl BatchSummary {
    /// Sum up a batch.
    #[must_use]
    pub fn from_reports(reports: &[TargetReport]) -> Self {
        let mut summary = Self {
            files_total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match &report.outcome {
                TargetOutcome::Completed(stats) => {
                    summary.files_processed += 1;
                    summary.total_lines += stats.total_lines;
                    summary.unique_lines += stats.unique_lines;
                    summary.duplicates_removed += stats.duplicates_removed;
                }
                TargetOutcome::Failed(err) => {
                    summary.files_failed += 1;
                    summary.interrupted |= err.is_interrupted();
                }
            }
        }
        summary
    }

    /// Process exit code for this batch.
    ///
    /// An interruption wins over failures; a batch where every target failed
    /// is an error, some failures a partial success.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            ExitCode::Interrupted
        } else if self.files_failed > 0 && self.files_processed == 0 {
            ExitCode::GeneralError
        } else if self.files_failed > 0 {
            ExitCode::PartialSuccess
        } else if self.duplicates_removed == 0 {
            ExitCode::NothingRemoved
        } else {
            ExitCode::Success
        }
    }
}

/// Deduplicate one file.
///
/// The output is written to a temporary file and only replaces the
/// destination after the last chunk, so a failed or interrupted target
/// leaves the destination as it was.
///
/// # Errors
///
/// - [`DedupError::InputNotFound`] / [`DedupError::InputUnreadable`] when
///   the file cannot be read
/// - [`DedupError::OutputWriteFailure`] when the backup or the output
///   cannot be written
/// - [`DedupError::Interrupted`] when the shutdown flag is raised between
///   chunks
pub fn process_file(path: &Path, config: &ProcessorConfig) -> Result<RunStatistics, DedupError> {
    let start = Instant::now();
    if config.is_shutdown_requested() {
        return Err(DedupError::Interrupted);
    }

    let encoding = match config.encoding {
        Some(encoding) => encoding.name(),
        None => detect_encoding(path)?,
    };
    log::debug!("Reading {} as {}", path.display(), encoding);
    let mut reader = LineReader::open(path, config.encoding)?;

    let mut stats = RunStatistics::new(path, config.engine.mode);
    stats.dry_run = config.dry_run;

    let mut writer = if config.dry_run {
        None
    } else {
        let output = config.destination.resolve(path)?;
        if config.backup {
            stats.backup_path = Some(create_backup(path)?);
        }
        Some(RetainedWriter::create(&output)?)
    };

    let mut engine = DedupEngine::new(&config.engine);
    let mut chunks = 0usize;
    loop {
        if config.is_shutdown_requested() {
            log::debug!("Shutdown requested, abandoning {}", path.display());
            return Err(DedupError::Interrupted);
        }

        let chunk = reader.next_chunk(config.chunk_size)?;
        if chunk.is_empty() {
            break;
        }
        chunks += 1;

        let retained = engine.process_chunk(chunk);
        if let Some(writer) = writer.as_mut() {
            writer.write_lines(&retained)?;
        }
        log::trace!(
            "{}: chunk {} done, {} keys seen",
            path.display(),
            chunks,
            engine.seen_len()
        );
    }

    stats.output_path = writer.map(RetainedWriter::finish).transpose()?;
    stats.record_counts(engine.counts());
    stats.bytes_read = reader.bytes_read();
    stats.elapsed = start.elapsed();

    log::info!(
        "{}: {} lines ({}), {} unique, {} removed{}",
        path.display(),
        stats.total_lines,
        stats.bytes_display(),
        stats.unique_lines,
        stats.duplicates_removed,
        if stats.dry_run { " (dry run)" } else { "" }
    );
    Ok(stats)
}

/// Output collisions within a batch, one entry per target.
///
/// A target gets an error when an earlier target already writes to the same
/// output file (the same input listed twice, or two inputs sharing a file
/// name under one output directory). Targets whose destination cannot be
/// resolved are left to [`process_file`] to report.
fn output_conflicts(paths: &[PathBuf], config: &ProcessorConfig) -> Vec<Option<DedupError>> {
    if config.dry_run {
        return paths.iter().map(|_| None).collect();
    }

    let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
    paths
        .iter()
        .map(|path| {
            let output = config.destination.resolve(path).ok()?;
            match owners.entry(output_key(&output)) {
                Entry::Occupied(owner) => Some(DedupError::InvalidConfiguration(format!(
                    "output path {} already used by {}",
                    output.display(),
                    owner.get().display()
                ))),
                Entry::Vacant(slot) => {
                    slot.insert(path);
                    None
                }
            }
        })
        .collect()
}

/// Comparable form of an output path that may not exist yet.
fn output_key(output: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(output) {
        return canonical;
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), output.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => output.to_path_buf(),
    }
}

/// Deduplicate many files in parallel.
///
/// Returns exactly one report per entry of `paths`, in the same order.
/// Targets that would write to an output already claimed by an earlier
/// target fail with [`DedupError::InvalidConfiguration`] and are not read.
pub fn process_files(paths: &[PathBuf], config: &ProcessorConfig) -> Vec<TargetReport> {
    if paths.is_empty() {
        return Vec::new();
    }

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start("dedupe", paths.len());
    }
    log::info!(
        "Processing {} file(s) with {} worker(s)",
        paths.len(),
        config.workers
    );

    let conflicts = output_conflicts(paths, config);
    let done = AtomicUsize::new(0);
    let run = || -> Vec<TargetReport> {
        paths
            .par_iter()
            .zip(conflicts)
            .map(|(path, conflict)| {
                let result = match conflict {
                    Some(err) => Err(err),
                    None => process_file(path, config),
                };
                let report = TargetReport::from_result(path, result);
                if let Some(err) = report.error() {
                    if !err.is_interrupted() {
                        log::error!("{}", err);
                    }
                }
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = config.progress_callback {
                    callback.on_progress(current, path.to_string_lossy().as_ref());
                }
                report
            })
            .collect()
    };

    let reports = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            log::warn!(
                "Failed to create worker pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            run()
        }
    };

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end("dedupe");
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ComparisonMode;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "Line 1\nLine 2\nLine 1\nLINE 1\nLine 3\n";

    #[test]
    fn test_process_file_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();

        let stats = process_file(&path, &ProcessorConfig::default()).unwrap();
        assert_eq!(stats.total_lines, 5);
        assert_eq!(stats.unique_lines, 3);
        assert_eq!(stats.duplicates_removed, 2);
        assert_eq!(stats.output_path.as_deref(), Some(path.as_path()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "Line 1\nLine 2\nLine 3\n");
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();

        let config = ProcessorConfig::default()
            .with_chunk_size(1)
            .with_dry_run(true);
        let stats = process_file(&path, &config).unwrap();
        assert_eq!(stats.unique_lines, 3);
        assert_eq!(stats.duplicates_removed, 2);
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();

        let config = ProcessorConfig::default().with_dry_run(true).with_backup(true);
        let stats = process_file(&path, &config).unwrap();
        assert!(stats.dry_run);
        assert!(stats.output_path.is_none());
        assert!(stats.backup_path.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn test_backup_and_output_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        let out = dir.path().join("out");
        fs::write(&path, SAMPLE).unwrap();

        let config = ProcessorConfig::default()
            .with_backup(true)
            .with_destination(Destination::Directory(out.clone()));
        let stats = process_file(&path, &config).unwrap();

        assert_eq!(fs::read_to_string(path.with_extension("txt.bak")).unwrap(), SAMPLE);
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
        assert_eq!(
            fs::read_to_string(out.join("sample.txt")).unwrap(),
            "Line 1\nLine 2\nLine 3\n"
        );
        assert_eq!(stats.output_path, Some(out.join("sample.txt")));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = process_file(&dir.path().join("nope.txt"), &ProcessorConfig::default())
            .unwrap_err();
        assert!(matches!(err, DedupError::InputNotFound(_)));
    }

    #[test]
    fn test_interrupted_before_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let config = ProcessorConfig::default().with_shutdown_flag(flag);
        let err = process_file(&path, &config).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn test_process_files_keeps_order_and_isolation() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let missing = dir.path().join("missing.txt");
        fs::write(&a, "x\nx\ny\n").unwrap();
        fs::write(&b, "x\ny\n").unwrap();

        let config = ProcessorConfig::default().with_workers(2).with_dry_run(true);
        let reports = process_files(&[a.clone(), missing.clone(), b.clone()], &config);

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].target, a);
        assert_eq!(reports[1].target, missing);
        assert_eq!(reports[2].target, b);

        assert_eq!(reports[0].stats().unwrap().duplicates_removed, 1);
        assert!(matches!(reports[1].error(), Some(DedupError::InputNotFound(_))));
        // No suppression across files
        assert_eq!(reports[2].stats().unwrap().duplicates_removed, 0);

        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.total_lines, 5);
        assert!(!summary.interrupted);
        assert_eq!(summary.exit_code(), ExitCode::PartialSuccess);
    }

    #[test]
    fn test_same_file_name_into_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let one = dir.path().join("one").join("a.txt");
        let two = dir.path().join("two").join("a.txt");
        fs::create_dir_all(one.parent().unwrap()).unwrap();
        fs::create_dir_all(two.parent().unwrap()).unwrap();
        fs::write(&one, "alpha\nalpha\n").unwrap();
        fs::write(&two, "beta\nbeta\n").unwrap();

        let config = ProcessorConfig::default()
            .with_workers(2)
            .with_destination(Destination::Directory(out.clone()));
        let reports = process_files(&[one.clone(), two.clone()], &config);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].stats().unwrap().output_path, Some(out.join("a.txt")));
        let err = reports[1].error().unwrap();
        assert!(matches!(err, DedupError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("already used by"), "{err}");

        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "alpha\n");
        assert_eq!(fs::read_to_string(&two).unwrap(), "beta\nbeta\n");
        assert_eq!(
            BatchSummary::from_reports(&reports).exit_code(),
            ExitCode::PartialSuccess
        );
    }

    #[test]
    fn test_repeated_target_in_place_keeps_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();
        let alias = dir.path().join(".").join("sample.txt");

        let config = ProcessorConfig::default().with_workers(2).with_backup(true);
        let reports = process_files(&[path.clone(), alias], &config);

        assert!(reports[0].stats().is_some());
        assert!(matches!(
            reports[1].error(),
            Some(DedupError::InvalidConfiguration(_))
        ));
        assert_eq!(fs::read_to_string(path.with_extension("txt.bak")).unwrap(), SAMPLE);
        assert_eq!(fs::read_to_string(&path).unwrap(), "Line 1\nLine 2\nLine 3\n");
    }

    #[test]
    fn test_dry_run_allows_repeated_targets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, SAMPLE).unwrap();

        let config = ProcessorConfig::default().with_dry_run(true);
        let reports = process_files(&[path.clone(), path], &config);
        assert!(reports.iter().all(|r| r.stats().is_some()));
    }

    #[test]
    fn test_batch_exit_codes() {
        let base = BatchSummary {
            files_total: 2,
            files_processed: 2,
            total_lines: 10,
            unique_lines: 8,
            duplicates_removed: 2,
            ..Default::default()
        };
        assert_eq!(base.exit_code(), ExitCode::Success);

        let nothing = BatchSummary {
            unique_lines: 10,
            duplicates_removed: 0,
            ..base.clone()
        };
        assert_eq!(nothing.exit_code(), ExitCode::NothingRemoved);

        let all_failed = BatchSummary {
            files_processed: 0,
            files_failed: 2,
            ..Default::default()
        };
        assert_eq!(all_failed.exit_code(), ExitCode::GeneralError);

        let interrupted = BatchSummary {
            files_failed: 1,
            interrupted: true,
            ..base
        };
        assert_eq!(interrupted.exit_code(), ExitCode::Interrupted);
    }

    #[test]
    fn test_status_labels() {
        let ok = TargetReport::from_result(
            Path::new("a"),
            Ok(RunStatistics::new("a", ComparisonMode::CaseSensitive)),
        );
        assert_eq!(ok.status_label(), "Success");

        let failed = TargetReport::from_result(
            Path::new("b"),
            Err(DedupError::InputNotFound(PathBuf::from("b"))),
        );
        assert_eq!(failed.status_label(), "ERROR: File not found: b");
    }

    #[test]
    fn test_validate() {
        assert!(ProcessorConfig::default().validate().is_ok());
        assert!(ProcessorConfig::default().with_chunk_size(0).validate().is_err());
        assert!(ProcessorConfig::default().with_workers(0).validate().is_err());
    }
}
