//! Error types and exit codes.

use std::path::PathBuf;

use serde::Serialize;

/// Errors raised while deduplicating a target.
#[derive(thiserror::Error, Debug)]
pub enum DedupError {
    /// Configuration rejected before any input was processed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input path does not exist.
    #[error("File not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input exists but could not be read.
    #[error("Cannot read {}: {source}", path.display())]
    InputUnreadable {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Exclude pattern failed to compile. The filter is disabled and
    /// processing continues.
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExcludePattern {
        /// The pattern as given
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Retained lines or a backup could not be written.
    #[error("Cannot write {}: {source}", path.display())]
    OutputWriteFailure {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Processing was stopped by a shutdown request.
    #[error("Processing interrupted")]
    Interrupted,
}

impl DedupError {
    /// Classify an I/O error raised while opening or reading `path`.
    #[must_use]
    pub fn from_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::InputNotFound(path)
        } else {
            Self::InputUnreadable { path, source }
        }
    }

    /// Whether this error ended the run because of a shutdown request.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Process exit codes.
///
/// - 0: Success (at least one line removed)
/// - 1: General error
/// - 2: Nothing removed (every target completed without duplicates)
/// - 3: Partial success (some targets failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed and removed at least one line.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Completed but no duplicates were found.
    NothingRemoved = 2,
    /// Completed but at least one target failed.
    PartialSuccess = 3,
    /// Interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LD000",
            Self::GeneralError => "LD001",
            Self::NothingRemoved => "LD002",
            Self::PartialSuccess => "LD003",
            Self::Interrupted => "LD130",
        }
    }
}

/// Error information printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "LD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build from an application error and the exit code it maps to.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::NothingRemoved.as_i32(), 2);
        assert_eq!(ExitCode::PartialSuccess.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Interrupted.code_prefix(), "LD130");
    }

    #[test]
    fn test_from_read_classifies_not_found() {
        let err = DedupError::from_read(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, DedupError::InputNotFound(_)));
        assert_eq!(err.to_string(), "File not found: missing.txt");

        let err = DedupError::from_read(
            "locked.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, DedupError::InputUnreadable { .. }));
    }

    #[test]
    fn test_structured_error() {
        let err = anyhow::anyhow!("boom");
        let structured = StructuredError::new(&err, ExitCode::GeneralError);
        assert_eq!(structured.code, "LD001");
        assert_eq!(structured.exit_code, 1);
        assert_eq!(structured.message, "boom");
        assert!(!structured.interrupted);
    }
}
