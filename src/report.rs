//! # Run Report Module
//!
//! Questo modulo trasforma `RunStats` nel report di fine run.
//!
//! ## Responsabilità:
//! - Metriche derivate per suffisso e totali (variazione di spazio, tempo medio,
//!   tempo per MB dell'originale)
//! - Ogni divisione è protetta: con denominatore zero il valore è `None`,
//!   stampato come `n/a`
//! - `Display` per il testo leggibile, `Serialize` per l'output JSON

use crate::file_manager::FileManager;
use crate::progress::{MediaStats, RunStats};
use serde::Serialize;
use std::fmt;

const BYTES_PER_MB: f64 = 1_000_000.0;

/// Figures for one proprietary suffix, or for all of them together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaReport {
    pub suffix: String,
    pub encountered: usize,
    pub already_converted: usize,
    pub converted: usize,
    pub failed: usize,
    pub original_bytes: u64,
    pub converted_bytes: u64,
    pub size_delta_bytes: i64,
    pub size_delta_percent: Option<f64>,
    pub conversion_seconds: f64,
    pub wasted_seconds: f64,
    pub average_seconds: Option<f64>,
    pub seconds_per_mb: Option<f64>,
}

impl MediaReport {
    pub fn from_stats(suffix: &str, stats: &MediaStats) -> Self {
        let conversion_seconds = stats.conversion_time.as_secs_f64();

        let average_seconds = if stats.converted > 0 {
            Some(conversion_seconds / stats.converted as f64)
        } else {
            None
        };

        let seconds_per_mb = if stats.original_bytes > 0 {
            Some(conversion_seconds / (stats.original_bytes as f64 / BYTES_PER_MB))
        } else {
            None
        };

        Self {
            suffix: suffix.to_string(),
            encountered: stats.encountered,
            already_converted: stats.already_converted,
            converted: stats.converted,
            failed: stats.failed,
            original_bytes: stats.original_bytes,
            converted_bytes: stats.converted_bytes,
            size_delta_bytes: stats.converted_bytes as i64 - stats.original_bytes as i64,
            size_delta_percent: FileManager::size_change_percent(
                stats.original_bytes,
                stats.converted_bytes,
            ),
            conversion_seconds,
            wasted_seconds: stats.wasted_time.as_secs_f64(),
            average_seconds,
            seconds_per_mb,
        }
    }
}

/// Final summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub files_visited: usize,
    pub html_examined: usize,
    pub html_modified: usize,
    pub already_present: usize,
    pub copied: usize,
    pub left_as_is: usize,
    pub originals_deleted: usize,
    pub errors: usize,
    pub media: Vec<MediaReport>,
    pub media_total: MediaReport,
}

impl RunReport {
    pub fn from_stats(stats: &RunStats) -> Self {
        Self {
            files_visited: stats.files_visited,
            html_examined: stats.html_visited,
            html_modified: stats.html_modified,
            already_present: stats.already_present,
            copied: stats.copied,
            left_as_is: stats.left_as_is,
            originals_deleted: stats.originals_deleted,
            errors: stats.errors,
            media: stats
                .media
                .iter()
                .map(|(suffix, media)| MediaReport::from_stats(suffix, media))
                .collect(),
            media_total: MediaReport::from_stats("all", &stats.media_total()),
        }
    }
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |s| format!("{:.1}s", s))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |p| format!("{:+.1}%", p))
}

fn signed_size(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    format!("{}{}", sign, FileManager::format_size(delta.unsigned_abs()))
}

impl fmt::Display for MediaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} files encountered: {} ({} already converted), of which {} were converted but {} failed.",
            self.suffix, self.encountered, self.already_converted, self.converted, self.failed
        )?;
        writeln!(
            f,
            "    taking a total time of {:.1}s ({:.1}s wasted on failures)",
            self.conversion_seconds, self.wasted_seconds
        )?;
        writeln!(
            f,
            "        Avg time/file: {}; time/MB of original format: {}.",
            seconds(self.average_seconds),
            seconds(self.seconds_per_mb)
        )?;
        writeln!(
            f,
            "    Total file space - originals: {}, conversions: {}",
            FileManager::format_size(self.original_bytes),
            FileManager::format_size(self.converted_bytes)
        )?;
        write!(
            f,
            "    for an overall size change of {} ({}).",
            signed_size(self.size_delta_bytes),
            percent(self.size_delta_percent)
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Conversion Report ===")?;
        writeln!(
            f,
            "Files visited: {} (copied: {}, already present: {}, left as is: {}, errors: {})",
            self.files_visited, self.copied, self.already_present, self.left_as_is, self.errors
        )?;
        writeln!(
            f,
            "Number of html files examined: {}, of which {} were modified.",
            self.html_examined, self.html_modified
        )?;
        for media in &self.media {
            writeln!(f, "{}", media)?;
        }
        if self.media.len() > 1 {
            writeln!(f, "{}", self.media_total)?;
        }
        if self.originals_deleted > 0 {
            writeln!(f, "Originals deleted after conversion: {}", self.originals_deleted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_run_has_no_division_by_zero() {
        let report = RunReport::from_stats(&RunStats::new());
        assert_eq!(report.media_total.average_seconds, None);
        assert_eq!(report.media_total.seconds_per_mb, None);
        assert_eq!(report.media_total.size_delta_percent, None);

        let text = report.to_string();
        assert!(text.contains("Number of html files examined: 0, of which 0 were modified."));
        assert!(!text.contains("NaN"));
        assert!(!text.contains("inf"));
    }

    #[test]
    fn test_failures_only_keep_metrics_undefined() {
        let mut stats = RunStats::new();
        let media = stats.media_mut(".flv");
        media.encountered = 2;
        media.attempted = 2;
        media.failed = 2;
        media.wasted_time = Duration::from_secs(3);

        let report = RunReport::from_stats(&stats);
        let flv = &report.media[0];
        assert_eq!(flv.average_seconds, None);
        assert_eq!(flv.seconds_per_mb, None);
        assert_eq!(flv.wasted_seconds, 3.0);
        assert!(flv.to_string().contains("n/a"));
    }

    #[test]
    fn test_derived_metrics() {
        let mut stats = RunStats::new();
        stats.html_visited = 4;
        stats.html_modified = 1;
        let media = stats.media_mut(".mp4");
        media.encountered = 2;
        media.converted = 2;
        media.original_bytes = 2_000_000;
        media.converted_bytes = 2_500_000;
        media.conversion_time = Duration::from_secs(10);

        let report = RunReport::from_stats(&stats);
        let mp4 = &report.media[0];
        assert_eq!(mp4.average_seconds, Some(5.0));
        assert_eq!(mp4.seconds_per_mb, Some(5.0));
        assert_eq!(mp4.size_delta_bytes, 500_000);
        assert_eq!(mp4.size_delta_percent, Some(25.0));

        let text = report.to_string();
        assert!(text.contains(".mp4 files encountered: 2"));
        assert!(text.contains("+25.0%"));
        assert!(text.contains("of which 1 were modified"));
    }
}
