//! Human-readable batch report.

use std::fmt::Write as _;

use yansi::{Color, Paint, Style};

use crate::processor::{BatchSummary, TargetOutcome, TargetReport};

const TITLE: Style = Style::new().bold();
const OK: Style = Style::new().fg(Color::BrightGreen);
const DRY_RUN: Style = Style::new().fg(Color::BrightYellow);
const ERROR: Style = Style::new().fg(Color::BrightRed).bold();

/// Text report over a batch.
#[derive(Debug)]
pub struct TextOutput<'a> {
    reports: &'a [TargetReport],
    color: bool,
}

impl<'a> TextOutput<'a> {
    /// Create a text report; `color` enables ANSI styling.
    #[must_use]
    pub fn new(reports: &'a [TargetReport], color: bool) -> Self {
        Self { reports, color }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.paint(style).to_string()
        } else {
            text.to_string()
        }
    }

    /// Render the report.
    #[must_use]
    pub fn render(&self) -> String {
        let summary = BatchSummary::from_reports(self.reports);
        let mut out = String::new();

        let _ = writeln!(out, "{}", self.paint("=== linedupe Results ===", TITLE));
        for report in self.reports {
            let name = report.target.display();
            let line = match &report.outcome {
                TargetOutcome::Completed(stats) => {
                    let (tag, style) = if stats.dry_run {
                        ("[DRY RUN]", DRY_RUN)
                    } else {
                        ("[OK]", OK)
                    };
                    format!(
                        "{} {}: {} lines, {} unique, {} removed ({:.2}%)",
                        self.paint(tag, style),
                        name,
                        stats.total_lines,
                        stats.unique_lines,
                        stats.duplicates_removed,
                        stats.duplication_rate()
                    )
                }
                TargetOutcome::Failed(err) => {
                    format!("{} {}: {}", self.paint("[ERROR]", ERROR), name, err)
                }
            };
            let _ = writeln!(out, "{line}");
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.paint("Summary", TITLE));
        let _ = writeln!(
            out,
            "Files processed: {}/{}",
            summary.files_processed, summary.files_total
        );
        if summary.files_failed > 0 {
            let failed = format!("Files failed: {}", summary.files_failed);
            let _ = writeln!(out, "{}", self.paint(&failed, ERROR));
        }
        let _ = writeln!(out, "Total lines: {}", summary.total_lines);
        let _ = writeln!(out, "Unique lines: {}", summary.unique_lines);
        let _ = writeln!(out, "Duplicates removed: {}", summary.duplicates_removed);
        if summary.interrupted {
            let _ = writeln!(out, "{}", self.paint("Run was interrupted", ERROR));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_reports;

    #[test]
    fn test_plain_report() {
        let reports = sample_reports();
        let report = TextOutput::new(&reports, false).render();

        assert!(report.contains("=== linedupe Results ==="));
        assert!(report.contains("Files processed: 2/3"));
        assert!(report.contains("Files failed: 1"));
        assert!(report.contains("Total lines: 150"));
        assert!(report.contains("[OK] test_file1.txt: 100 lines, 80 unique, 20 removed (20.00%)"));
        assert!(report.contains("[DRY RUN] test_file2.txt"));
        assert!(report.contains("[ERROR] error_file.txt: File not found: error_file.txt"));
        assert!(!report.contains('\u{1b}'));
    }

    #[test]
    fn test_colored_report() {
        let reports = sample_reports();
        let report = TextOutput::new(&reports, true).render();

        assert!(report.contains("\u{1b}["));
        assert!(report.contains("\u{1b}[1m"));
        assert!(report.contains("92m"));
        assert!(report.contains("93m"));
        assert!(report.contains("91m"));
    }

    #[test]
    fn test_empty_batch() {
        let report = TextOutput::new(&[], false).render();
        assert!(report.contains("Files processed: 0/0"));
        assert!(!report.contains("Files failed"));
    }
}
