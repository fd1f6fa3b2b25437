//! Per-target run statistics.

use std::path::PathBuf;
use std::time::Duration;

use bytesize::ByteSize;
use serde::{Serialize, Serializer};

use super::dedup::LineCounts;
use super::normalize::ComparisonMode;

fn duration_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Statistics of one deduplicated target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    /// File the statistics describe
    pub target: PathBuf,
    /// Comparison mode used
    pub mode: ComparisonMode,
    /// Lines read
    pub total_lines: usize,
    /// Lines retained
    pub unique_lines: usize,
    /// Lines dropped
    pub duplicates_removed: usize,
    /// Retained lines that matched the exclude pattern
    pub excluded_lines: usize,
    /// Dropped lines found by the fuzzy lookup
    pub fuzzy_matches: usize,
    /// Decoded bytes read
    pub bytes_read: u64,
    /// Whether the output was suppressed
    pub dry_run: bool,
    /// Where the retained lines were written, if anywhere
    pub output_path: Option<PathBuf>,
    /// Backup copy made before writing
    pub backup_path: Option<PathBuf>,
    /// Wall time spent on the target
    #[serde(rename = "elapsed_secs", serialize_with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Create empty statistics for a target.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, mode: ComparisonMode) -> Self {
        Self {
            target: target.into(),
            mode,
            ..Default::default()
        }
    }

    /// Copy the line counts of an engine.
    pub fn record_counts(&mut self, counts: LineCounts) {
        self.total_lines = counts.total;
        self.unique_lines = counts.unique;
        self.duplicates_removed = counts.duplicates;
        self.excluded_lines = counts.excluded;
        self.fuzzy_matches = counts.fuzzy_matches;
    }

    /// Percentage of lines removed.
    #[must_use]
    pub fn duplication_rate(&self) -> f64 {
        if self.total_lines == 0 {
            0.0
        } else {
            (self.duplicates_removed as f64 / self.total_lines as f64) * 100.0
        }
    }

    /// Bytes read as a human-readable string.
    #[must_use]
    pub fn bytes_display(&self) -> String {
        ByteSize::b(self.bytes_read).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplication_rate() {
        let mut stats = RunStatistics::new("a.txt", ComparisonMode::CaseInsensitive);
        assert_eq!(stats.duplication_rate(), 0.0);

        stats.total_lines = 100;
        stats.unique_lines = 80;
        stats.duplicates_removed = 20;
        assert!((stats.duplication_rate() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_counts() {
        let counts = LineCounts {
            total: 5,
            unique: 3,
            duplicates: 2,
            excluded: 1,
            ..Default::default()
        };
        let mut stats = RunStatistics::new("a.txt", ComparisonMode::CaseSensitive);
        stats.record_counts(counts);
        assert_eq!(stats.total_lines, 5);
        assert_eq!(stats.unique_lines + stats.duplicates_removed, stats.total_lines);
        assert_eq!(stats.excluded_lines, 1);
    }

    #[test]
    fn test_serializes_elapsed_as_seconds() {
        let mut stats = RunStatistics::new("a.txt", ComparisonMode::Fuzzy);
        stats.elapsed = Duration::from_millis(1500);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["mode"], "fuzzy");
    }
}
