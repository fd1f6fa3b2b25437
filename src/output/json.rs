//! JSON output formatter for batch results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "summary": {
//!     "files_total": 3,
//!     "files_processed": 2,
//!     "files_failed": 1,
//!     "total_lines": 150,
//!     "unique_lines": 120,
//!     "duplicates_removed": 30,
//!     "interrupted": false,
//!     "exit_code": 3,
//!     "exit_code_name": "LD003"
//!   },
//!   "results": [
//!     { "file_path": "a.txt", "status": "success", "total_lines": 100, ... },
//!     { "file_path": "missing.txt", "status": "error", "error": "File not found: missing.txt" }
//!   ]
//! }
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReportError;
use crate::error::ExitCode;
use crate::processor::{BatchSummary, TargetOutcome, TargetReport};

/// Batch totals in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Targets requested
    pub files_total: usize,
    /// Targets that completed
    pub files_processed: usize,
    /// Targets that failed
    pub files_failed: usize,
    /// Lines read
    pub total_lines: usize,
    /// Lines retained
    pub unique_lines: usize,
    /// Lines removed
    pub duplicates_removed: usize,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "LD000")
    pub exit_code_name: String,
}

impl JsonSummary {
    fn new(summary: &BatchSummary, exit_code: ExitCode) -> Self {
        Self {
            files_total: summary.files_total,
            files_processed: summary.files_processed,
            files_failed: summary.files_failed,
            total_lines: summary.total_lines,
            unique_lines: summary.unique_lines,
            duplicates_removed: summary.duplicates_removed,
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Result of one target in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonResult {
    /// Target as requested
    pub file_path: String,
    /// `success`, `dry_run` or `error`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_matches: Option<usize>,
    /// Percentage of lines removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplication_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JsonResult {
    fn from_report(report: &TargetReport) -> Self {
        let mut result = Self {
            file_path: report.target.to_string_lossy().into_owned(),
            status: "error",
            mode: None,
            total_lines: None,
            unique_lines: None,
            duplicates_removed: None,
            excluded_lines: None,
            fuzzy_matches: None,
            duplication_rate: None,
            elapsed_ms: None,
            output_path: None,
            backup_path: None,
            error: None,
        };

        match &report.outcome {
            TargetOutcome::Completed(stats) => {
                result.status = if stats.dry_run { "dry_run" } else { "success" };
                result.mode = Some(stats.mode.to_string());
                result.total_lines = Some(stats.total_lines);
                result.unique_lines = Some(stats.unique_lines);
                result.duplicates_removed = Some(stats.duplicates_removed);
                result.excluded_lines = Some(stats.excluded_lines);
                result.fuzzy_matches = Some(stats.fuzzy_matches);
                result.duplication_rate = Some(stats.duplication_rate());
                result.elapsed_ms = Some(stats.elapsed.as_millis() as u64);
                result.output_path = stats
                    .output_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned());
                result.backup_path = stats
                    .backup_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned());
            }
            TargetOutcome::Failed(err) => result.error = Some(err.to_string()),
        }
        result
    }
}

/// Complete JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Batch totals
    pub summary: JsonSummary,
    /// One entry per requested target, in input order
    pub results: Vec<JsonResult>,
}

impl JsonOutput {
    /// Build the report for a batch.
    #[must_use]
    pub fn new(reports: &[TargetReport], exit_code: ExitCode) -> Self {
        Self {
            timestamp: Utc::now(),
            summary: JsonSummary::new(&BatchSummary::from_reports(reports), exit_code),
            results: reports.iter().map(JsonResult::from_report).collect(),
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), ReportError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_reports;

    #[test]
    fn test_json_report_structure() {
        let reports = sample_reports();
        let output = JsonOutput::new(&reports, ExitCode::PartialSuccess);
        let json = output.to_json_pretty().unwrap();

        assert!(json.contains("\"timestamp\":"));
        assert!(json.contains("\"files_processed\": 2"));
        assert!(json.contains("\"files_failed\": 1"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["results"].as_array().unwrap().len(), 3);
        assert_eq!(value["summary"]["exit_code"], 3);
        assert_eq!(value["summary"]["exit_code_name"], "LD003");
    }

    #[test]
    fn test_json_results() {
        let reports = sample_reports();
        let value = serde_json::to_value(JsonOutput::new(&reports, ExitCode::Success)).unwrap();
        let results = &value["results"];

        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[0]["total_lines"], 100);
        assert_eq!(results[0]["duplication_rate"], 20.0);
        assert_eq!(results[0]["mode"], "case-insensitive");
        assert_eq!(results[1]["status"], "dry_run");
        assert_eq!(results[2]["status"], "error");
        assert_eq!(results[2]["error"], "File not found: error_file.txt");
        assert!(results[2].get("total_lines").is_none());
    }

    #[test]
    fn test_write_to() {
        let reports = sample_reports();
        let mut buf = Vec::new();
        JsonOutput::new(&reports, ExitCode::Success)
            .write_to(&mut buf, false)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }
}
