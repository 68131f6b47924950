//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche del run.
//!
//! ## Responsabilità:
//! - Spinner visuale con `indicatif` durante il walk (la dimensione dell'albero non è nota)
//! - `RunStats`: accumulatore dei conteggi, con un solo writer (il driver)
//! - `MediaStats`: statistiche per suffisso proprietario (.mp4, .flv, ...)
//!
//! ## Statistiche tracciate:
//! - **files_visited**: Totale file visitati
//! - **html_visited / html_modified / html_unmodified**: Esito della riscrittura dei link
//! - **already_present**: Entry saltate perché già presenti a destinazione
//! - **copied / left_as_is**: File "altri" copiati o lasciati stare
//! - **errors**: Errori per singolo file (I/O), che non interrompono il walk
//! - Per suffisso: incontrati, già convertiti, tentati, convertiti, falliti,
//!   byte originali/convertiti, tempo di conversione e tempo sprecato
//!
//! ## Esempio:
//! ```ignore
//! let mut stats = RunStats::default();
//! stats.record_conversion(".mp4", &outcome);
//! stats.record(&kind, &status);
//! ```

use crate::file_manager::FileKind;
use crate::run_log::FileStatus;
use crate::video_processor::ConversionOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Manages progress reporting while walking the tree
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Spinner on stderr, or a hidden bar when disabled
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Count one file and show a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics for one proprietary suffix
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MediaStats {
    pub encountered: usize,
    pub already_converted: usize,
    pub attempted: usize,
    pub converted: usize,
    pub failed: usize,
    pub original_bytes: u64,
    pub converted_bytes: u64,
    pub conversion_time: Duration,
    /// Time spent on conversions that failed
    pub wasted_time: Duration,
}

impl MediaStats {
    fn absorb(&mut self, other: &MediaStats) {
        self.encountered += other.encountered;
        self.already_converted += other.already_converted;
        self.attempted += other.attempted;
        self.converted += other.converted;
        self.failed += other.failed;
        self.original_bytes += other.original_bytes;
        self.converted_bytes += other.converted_bytes;
        self.conversion_time += other.conversion_time;
        self.wasted_time += other.wasted_time;
    }
}

/// Accumulated statistics of one run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub files_visited: usize,
    pub directories_visited: usize,
    pub directories_created: usize,
    pub html_visited: usize,
    pub html_modified: usize,
    pub html_unmodified: usize,
    pub already_present: usize,
    pub copied: usize,
    pub left_as_is: usize,
    pub originals_deleted: usize,
    pub errors: usize,
    /// Keyed by proprietary suffix
    pub media: BTreeMap<String, MediaStats>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media_mut(&mut self, suffix: &str) -> &mut MediaStats {
        self.media.entry(suffix.to_string()).or_default()
    }

    /// Count a processed file by kind and final status
    pub fn record(&mut self, kind: &FileKind, status: &FileStatus) {
        self.files_visited += 1;

        match kind {
            FileKind::Html => {
                self.html_visited += 1;
                match status {
                    FileStatus::Modified => self.html_modified += 1,
                    FileStatus::Unmodified => self.html_unmodified += 1,
                    _ => {}
                }
            }
            FileKind::Media { suffix } => {
                let media = self.media_mut(suffix);
                media.encountered += 1;
                if *status == FileStatus::AlreadyPresent {
                    media.already_converted += 1;
                }
            }
            FileKind::Other => {}
        }

        match status {
            FileStatus::AlreadyPresent => self.already_present += 1,
            FileStatus::Copied => self.copied += 1,
            FileStatus::LeftAsIs => self.left_as_is += 1,
            _ => {}
        }
    }

    /// Count one conversion attempt
    pub fn record_conversion(&mut self, suffix: &str, outcome: &ConversionOutcome) {
        let media = self.media_mut(suffix);
        media.attempted += 1;

        match outcome {
            ConversionOutcome::Success {
                bytes_in,
                bytes_out,
                duration,
            } => {
                media.converted += 1;
                media.original_bytes += bytes_in;
                media.converted_bytes += bytes_out;
                media.conversion_time += *duration;
            }
            ConversionOutcome::Failure { duration, .. } => {
                media.failed += 1;
                media.wasted_time += *duration;
            }
        }
    }

    /// All suffixes added together
    pub fn media_total(&self) -> MediaStats {
        let mut total = MediaStats::default();
        for stats in self.media.values() {
            total.absorb(stats);
        }
        total
    }

    /// Files this run wrote or tried to write at the destination
    pub fn work_done(&self) -> usize {
        let media = self.media_total();
        media.attempted + self.html_modified + self.html_unmodified + self.copied
    }

    pub fn format_summary(&self) -> String {
        let media = self.media_total();
        format!(
            "Visited: {} files | Converted: {} | Failed: {} | Html modified: {} | Already present: {} | Errors: {}",
            self.files_visited,
            media.converted,
            media.failed,
            self.html_modified,
            self.already_present,
            self.errors
        )
    }
}
