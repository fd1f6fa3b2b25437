//! CSV output formatter for batch results.
//!
//! The document starts with a short summary block followed by one row per
//! target:
//!
//! ```csv
//! linedupe Results
//! SUMMARY
//! Files processed,2/3
//! Files failed,1
//!
//! File,Total Lines,Unique Lines,Duplicates Removed,Duplication Rate,Status
//! a.txt,100,80,20,20.00%,Success
//! missing.txt,,,,,ERROR: File not found: missing.txt
//! ```

use std::io;

use super::ReportError;
use crate::processor::{BatchSummary, TargetOutcome, TargetReport};

/// CSV report over a batch.
#[derive(Debug)]
pub struct CsvOutput<'a> {
    reports: &'a [TargetReport],
}

impl<'a> CsvOutput<'a> {
    /// Create a CSV report.
    #[must_use]
    pub fn new(reports: &'a [TargetReport]) -> Self {
        Self { reports }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), ReportError> {
        let summary = BatchSummary::from_reports(self.reports);
        let mut csv_writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);

        csv_writer.write_record(["linedupe Results"])?;
        csv_writer.write_record(["SUMMARY"])?;
        csv_writer.write_record([
            "Files processed".to_string(),
            format!("{}/{}", summary.files_processed, summary.files_total),
        ])?;
        csv_writer.write_record(["Files failed".to_string(), summary.files_failed.to_string()])?;
        csv_writer.write_record(["Total lines".to_string(), summary.total_lines.to_string()])?;
        csv_writer.write_record([
            "Duplicates removed".to_string(),
            summary.duplicates_removed.to_string(),
        ])?;
        csv_writer.write_record([""])?;

        csv_writer.write_record([
            "File",
            "Total Lines",
            "Unique Lines",
            "Duplicates Removed",
            "Duplication Rate",
            "Status",
        ])?;

        for report in self.reports {
            let file = report.target.to_string_lossy().into_owned();
            let row = match &report.outcome {
                TargetOutcome::Completed(stats) => [
                    file,
                    stats.total_lines.to_string(),
                    stats.unique_lines.to_string(),
                    stats.duplicates_removed.to_string(),
                    format!("{:.2}%", stats.duplication_rate()),
                    report.status_label(),
                ],
                TargetOutcome::Failed(_) => [
                    file,
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    report.status_label(),
                ],
            };
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Render the report to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    pub fn to_string(&self) -> Result<String, ReportError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
