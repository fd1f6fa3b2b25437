//! Report formatters for batch results.
//!
//! This module renders one report per batch run in one of three formats:
//! - Text for people (colored unless disabled)
//! - JSON for automation and scripting
//! - CSV for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use linedupe::output::{render_report, ReportFormat};
//! use linedupe::processor::{process_files, ProcessorConfig};
//! use linedupe::error::ExitCode;
//! use std::path::PathBuf;
//!
//! let reports = process_files(&[PathBuf::from("a.txt")], &ProcessorConfig::default());
//! let text = render_report(ReportFormat::Json, &reports, ExitCode::Success, false)?;
//! println!("{text}");
//! # Ok::<(), linedupe::output::ReportError>(())
//! ```

pub mod csv;
pub mod json;
pub mod text;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ExitCode;
use crate::processor::TargetReport;

pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;
pub use self::text::TextOutput;

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document
    Json,
    /// CSV table
    Csv,
}

impl ReportFormat {
    /// Whether the format is meant for other programs.
    #[must_use]
    pub fn is_machine_readable(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Errors raised while rendering a report.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV generation failed.
    #[error("CSV generation error: {0}")]
    Csv(#[from] ::csv::Error),

    /// Writing the report failed.
    #[error("I/O error while writing report: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a batch report in the given format.
///
/// `color` only affects the text format.
///
/// # Errors
///
/// Returns [`ReportError`] if serialization fails.
pub fn render_report(
    format: ReportFormat,
    reports: &[TargetReport],
    exit_code: ExitCode,
    color: bool,
) -> Result<String, ReportError> {
    match format {
        ReportFormat::Text => Ok(TextOutput::new(reports, color).render()),
        ReportFormat::Json => Ok(JsonOutput::new(reports, exit_code).to_json_pretty()?),
        ReportFormat::Csv => CsvOutput::new(reports).to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_each_format() {
        let reports = fixtures::sample_reports();
        for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Csv] {
            let out = render_report(format, &reports, ExitCode::PartialSuccess, false).unwrap();
            assert!(out.contains("test_file1.txt"), "{format}: {out}");
            assert!(out.contains("error_file.txt"), "{format}: {out}");
        }
    }

    #[test]
    fn test_machine_readable() {
        assert!(!ReportFormat::Text.is_machine_readable());
        assert!(ReportFormat::Json.is_machine_readable());
        assert!(ReportFormat::Csv.is_machine_readable());
    }
}
