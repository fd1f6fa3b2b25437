//! Follow a growing file and emit each new unique line.
//!
//! # Overview
//!
//! A [`StreamController`] polls one file. Every poll reads the bytes
//! appended since the previous poll, splits them into complete lines and
//! runs each line through a [`DedupEngine`] whose seen set lives for the
//! whole session. Unique lines are written and flushed to the sink as soon
//! as they are found. A trailing partial line stays pending until its
//! terminator arrives.
//!
//! ```text
//! Idle --start--> Polling --(EOF without follow | shutdown | max runtime)--> Draining --> Stopped
//! ```
//!
//! When the file shrinks below the read offset it is treated as truncated
//! (for example by log rotation): reading restarts at offset 0 and the seen
//! set is kept, so lines already emitted are not emitted again.
//!
//! # Example
//!
//! ```no_run
//! use linedupe::streaming::{StreamConfig, StreamController};
//! use std::time::Duration;
//!
//! let config = StreamConfig::default()
//!     .with_poll_interval(Duration::from_millis(250))
//!     .with_max_runtime(Some(Duration::from_secs(60)));
//! let stats = StreamController::new("app.log", config, std::io::stdout()).run();
//! eprintln!("{} unique of {} lines", stats.unique_lines, stats.total_lines);
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use serde::Serialize;

use crate::engine::{DedupEngine, EngineConfig, LineVerdict};
use crate::error::DedupError;

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of recent unique lines kept in memory.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Longest single sleep, so shutdown requests are noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Read buffer for the appended range; only one line is held at a time.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Lifecycle of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, nothing read yet
    Idle,
    /// Reading appended data
    Polling,
    /// Processing the pending partial line before stopping
    Draining,
    /// Session over
    Stopped,
}

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The file was read to its end without follow mode
    Completed,
    /// A shutdown was requested
    Interrupted,
    /// The maximum runtime elapsed
    MaxRuntime,
    /// The file disappeared
    SourceMissing,
    /// Unique lines could not be written to the sink
    OutputFailed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::MaxRuntime => "maximum runtime reached",
            Self::SourceMissing => "source file missing",
            Self::OutputFailed => "output failed",
        };
        f.write_str(text)
    }
}

/// Streaming session settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Engine settings for the session
    pub engine: EngineConfig,
    /// Time between polls
    pub poll_interval: Duration,
    /// Recent unique lines kept in the ring buffer
    pub buffer_size: usize,
    /// Stop after this long
    pub max_runtime: Option<Duration>,
    /// Keep polling after reaching the end of the file
    pub follow: bool,
    /// Shutdown flag checked at the top of every poll
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_runtime: None,
            follow: true,
            shutdown_flag: None,
        }
    }
}

impl StreamConfig {
    /// Set the engine settings.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the ring buffer capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the maximum runtime.
    #[must_use]
    pub fn with_max_runtime(mut self, max_runtime: Option<Duration>) -> Self {
        self.max_runtime = max_runtime;
        self
    }

    /// Enable or disable follow mode.
    #[must_use]
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] for a zero poll interval
    /// or buffer size, or an invalid engine configuration.
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.poll_interval.is_zero() {
            return Err(DedupError::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(DedupError::InvalidConfiguration(
                "buffer size must be greater than zero".to_string(),
            ));
        }
        self.engine.validate()
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Totals of a streaming session.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatistics {
    /// Followed file
    pub source: PathBuf,
    /// Lines read
    pub total_lines: usize,
    /// Lines written to the sink
    pub unique_lines: usize,
    /// Duplicate and blank lines dropped
    pub duplicates_removed: usize,
    /// Bytes read from the file, across truncations
    pub bytes_read: u64,
    /// Times the file shrank below the read offset
    pub truncations: usize,
    /// Session duration
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Why the session ended
    pub stop_reason: StopReason,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl StreamStatistics {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            total_lines: 0,
            unique_lines: 0,
            duplicates_removed: 0,
            bytes_read: 0,
            truncations: 0,
            elapsed: Duration::ZERO,
            stop_reason: StopReason::Completed,
        }
    }
}

/// Polls a file and writes each new unique line to `sink`.
pub struct StreamController<W: Write> {
    path: PathBuf,
    config: StreamConfig,
    sink: W,
    state: StreamState,
    engine: Option<DedupEngine>,
    offset: u64,
    pending: Vec<u8>,
    recent: VecDeque<String>,
    stats: StreamStatistics,
}

impl<W: Write> std::fmt::Debug for StreamController<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("pending", &self.pending.len())
            .field("recent", &self.recent.len())
            .finish_non_exhaustive()
    }
}

impl<W: Write> StreamController<W> {
    /// Create an idle controller for `path`.
    pub fn new(path: impl Into<PathBuf>, config: StreamConfig, sink: W) -> Self {
        let path = path.into();
        let stats = StreamStatistics::new(&path);
        Self {
            path,
            config,
            sink,
            state: StreamState::Idle,
            engine: None,
            offset: 0,
            pending: Vec::new(),
            recent: VecDeque::new(),
            stats,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Statistics so far.
    #[must_use]
    pub fn statistics(&self) -> &StreamStatistics {
        &self.stats
    }

    /// Most recent unique lines, oldest first.
    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Consume the controller, returning the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Move from `Idle` to `Polling` with an empty seen set.
    pub fn start(&mut self) {
        if self.state != StreamState::Idle {
            return;
        }
        self.engine = Some(DedupEngine::new(&self.config.engine));
        self.recent = VecDeque::with_capacity(self.config.buffer_size);
        self.state = StreamState::Polling;
        log::debug!("Watching {}", self.path.display());
    }

    /// Read whatever was appended since the last poll.
    ///
    /// Returns the number of unique lines written.
    ///
    /// # Errors
    ///
    /// - [`DedupError::InputNotFound`] when the file no longer exists
    /// - [`DedupError::InputUnreadable`] when it cannot be read
    /// - [`DedupError::OutputWriteFailure`] when the sink rejects a line
    pub fn poll_once(&mut self) -> Result<usize, DedupError> {
        self.start();

        let size = std::fs::metadata(&self.path)
            .map_err(|e| DedupError::from_read(&self.path, e))?
            .len();

        if size < self.offset {
            log::warn!(
                "{} was truncated ({} < {}), reading from the start",
                self.path.display(),
                ByteSize(size),
                ByteSize(self.offset)
            );
            self.offset = 0;
            self.pending.clear();
            self.stats.truncations += 1;
        }
        if size == self.offset {
            return Ok(0);
        }

        let mut file = File::open(&self.path).map_err(|e| DedupError::from_read(&self.path, e))?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| DedupError::from_read(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file.take(size - self.offset));

        let mut written = 0;
        loop {
            let read = reader
                .read_until(b'\n', &mut self.pending)
                .map_err(|e| DedupError::from_read(&self.path, e))?;
            if read == 0 {
                break;
            }
            self.offset += read as u64;
            self.stats.bytes_read += read as u64;

            // A line without its terminator stays pending until the next poll
            if self.pending.last() != Some(&b'\n') {
                break;
            }
            let line = std::mem::take(&mut self.pending);
            written += self.handle_raw(&line[..line.len() - 1])?;
        }
        log::trace!("{}: read up to offset {}", self.path.display(), ByteSize(self.offset));

        self.sink.flush().map_err(Self::write_error)?;
        Ok(written)
    }

    /// Poll until the file is exhausted (without follow mode), a shutdown
    /// is requested, the maximum runtime elapses or the file disappears.
    ///
    /// Statistics are returned in every case.
    pub fn run(mut self) -> StreamStatistics {
        let started = Instant::now();
        self.start();

        let reason = loop {
            if self.config.is_shutdown_requested() {
                break StopReason::Interrupted;
            }
            if self
                .config
                .max_runtime
                .is_some_and(|max| started.elapsed() >= max)
            {
                break StopReason::MaxRuntime;
            }

            match self.poll_once() {
                Ok(written) => {
                    if written > 0 {
                        log::debug!("{}: {} new unique line(s)", self.path.display(), written);
                    }
                }
                Err(DedupError::InputNotFound(path)) => {
                    log::warn!("{} is gone, stopping", path.display());
                    break StopReason::SourceMissing;
                }
                Err(err @ DedupError::OutputWriteFailure { .. }) => {
                    log::error!("{}", err);
                    break StopReason::OutputFailed;
                }
                Err(err) => log::warn!("Poll failed: {}", err),
            }

            if !self.config.follow {
                break StopReason::Completed;
            }
            self.sleep_until_next_poll(started);
        };

        self.drain();
        self.stats.stop_reason = reason;
        self.stats.elapsed = started.elapsed();
        self.state = StreamState::Stopped;

        log::info!(
            "{}: {} lines, {} unique, {} removed, {} read ({})",
            self.path.display(),
            self.stats.total_lines,
            self.stats.unique_lines,
            self.stats.duplicates_removed,
            ByteSize(self.stats.bytes_read),
            reason
        );
        self.stats
    }

    /// Process the pending partial line, if any.
    fn drain(&mut self) {
        self.state = StreamState::Draining;
        if self.pending.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.pending);
        let result = self
            .handle_raw(&raw)
            .and_then(|_| self.sink.flush().map_err(Self::write_error));
        if let Err(err) = result {
            log::error!("{}", err);
        }
    }

    fn sleep_until_next_poll(&self, started: Instant) {
        let mut remaining = self.config.poll_interval;
        while !remaining.is_zero() {
            if self.config.is_shutdown_requested() {
                return;
            }
            if let Some(max) = self.config.max_runtime {
                if started.elapsed() >= max {
                    return;
                }
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }

    /// Run one raw line through the engine, writing it when unique.
    fn handle_raw(&mut self, raw: &[u8]) -> Result<usize, DedupError> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text = String::from_utf8_lossy(raw);

        let Some(engine) = self.engine.as_mut() else {
            return Ok(0);
        };
        self.stats.total_lines += 1;
        let verdict = engine.process_streamed(&text);
        if !matches!(verdict, LineVerdict::Unique | LineVerdict::Excluded) {
            self.stats.duplicates_removed += 1;
            return Ok(0);
        }

        writeln!(self.sink, "{text}").map_err(Self::write_error)?;
        self.stats.unique_lines += 1;
        if self.recent.len() == self.config.buffer_size {
            self.recent.pop_front();
        }
        if self.config.buffer_size > 0 {
            self.recent.push_back(text.into_owned());
        }
        Ok(1)
    }

    fn write_error(source: std::io::Error) -> DedupError {
        DedupError::OutputWriteFailure {
            path: PathBuf::from("<sink>"),
            source,
        }
    }
}
