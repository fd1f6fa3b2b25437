//! Writing retained lines to the output sink.
//!
//! # Overview
//!
//! Retained lines are streamed into a temporary file next to the
//! destination and moved over it once the whole target has been processed,
//! so an interrupted run never leaves a half-written file behind. This also
//! makes in-place rewrites safe while the target is still being read.
//!
//! Every terminated line is written with the first line ending observed in
//! the target; a final unterminated line stays unterminated.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::engine::{Line, LineEnding};
use crate::error::DedupError;

/// Where retained lines go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    /// Replace the target.
    #[default]
    InPlace,
    /// Write a file with the target's name into this directory.
    Directory(PathBuf),
}

impl Destination {
    /// Build from an optional output directory.
    #[must_use]
    pub fn from_output_dir(dir: Option<PathBuf>) -> Self {
        dir.map_or(Self::InPlace, Self::Directory)
    }

    /// Output path for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidConfiguration`] if the target has no
    /// file name to reuse inside the output directory.
    pub fn resolve(&self, target: &Path) -> Result<PathBuf, DedupError> {
        match self {
            Self::InPlace => Ok(target.to_path_buf()),
            Self::Directory(dir) => target.file_name().map(|name| dir.join(name)).ok_or_else(|| {
                DedupError::InvalidConfiguration(format!(
                    "cannot derive an output name from {}",
                    target.display()
                ))
            }),
        }
    }
}

/// Streams retained lines into a temporary file and persists it.
pub struct RetainedWriter {
    path: PathBuf,
    inner: BufWriter<NamedTempFile>,
    ending: Option<LineEnding>,
    lines_written: usize,
}

impl RetainedWriter {
    /// Prepare to write `path`, creating its parent directory if needed.
    ///
    /// When `path` already exists its permissions are carried over.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::OutputWriteFailure`] if the temporary file
    /// cannot be created.
    pub fn create(path: &Path) -> Result<Self, DedupError> {
        let fail = |source| DedupError::OutputWriteFailure {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(fail)?;

        let temp = NamedTempFile::new_in(&parent).map_err(fail)?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(temp.path(), meta.permissions()).map_err(fail)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            inner: BufWriter::new(temp),
            ending: None,
            lines_written: 0,
        })
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines written so far.
    #[must_use]
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Append lines in order.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::OutputWriteFailure`] on I/O failure.
    pub fn write_lines(&mut self, lines: &[Line]) -> Result<(), DedupError> {
        for line in lines {
            self.write_line(line)?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &Line) -> Result<(), DedupError> {
        let ending = line.ending.map(|e| *self.ending.get_or_insert(e));
        let result = self
            .inner
            .write_all(line.text.as_bytes())
            .and_then(|()| match ending {
                Some(e) => self.inner.write_all(e.as_str().as_bytes()),
                None => Ok(()),
            });
        result.map_err(|source| DedupError::OutputWriteFailure {
            path: self.path.clone(),
            source,
        })?;
        self.lines_written += 1;
        Ok(())
    }

    /// Flush and move the temporary file over the destination.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::OutputWriteFailure`] if flushing or renaming
    /// fails. The destination is left untouched in that case.
    pub fn finish(self) -> Result<PathBuf, DedupError> {
        let Self { path, inner, .. } = self;
        let temp = inner
            .into_inner()
            .map_err(|e| DedupError::OutputWriteFailure {
                path: path.clone(),
                source: e.into_error(),
            })?;
        temp.persist(&path)
            .map_err(|e| DedupError::OutputWriteFailure {
                path: path.clone(),
                source: e.error,
            })?;
        Ok(path)
    }
}

/// Write `lines` to `path` in one go.
///
/// # Errors
///
/// Returns [`DedupError::OutputWriteFailure`] on I/O failure.
pub fn write_lines(path: &Path, lines: &[Line]) -> Result<PathBuf, DedupError> {
    let mut writer = RetainedWriter::create(path)?;
    writer.write_lines(lines)?;
    writer.finish()
}
