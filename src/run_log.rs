//! # Run Log Module
//!
//! Questo modulo gestisce i due file scritti da un run, oltre all'output di `tracing`.
//!
//! ## Responsabilità:
//! - Log append-only: marker di inizio/fine e una riga per ogni file elaborato,
//!   scritta subito senza buffering
//! - File di stato: sovrascritto con l'ultima azione tentata, così un run
//!   interrotto mostra dove si è fermato
//! - `FileStatus`: esito di un file, con il suo glifo (`$ + - => !! = .`)

use crate::config::RunConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    AlreadyPresent,
    Modified,
    Unmodified,
    Converted,
    Failed(String),
    Copied,
    LeftAsIs,
}

impl FileStatus {
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "$",
            Self::Modified => "+",
            Self::Unmodified => "-",
            Self::Converted => "=>",
            Self::Failed(_) => "!!",
            Self::Copied => "=",
            Self::LeftAsIs => ".",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "already present",
            Self::Modified => "modified",
            Self::Unmodified => "unmodified",
            Self::Converted => "converted",
            Self::Failed(_) => "failed",
            Self::Copied => "copied",
            Self::LeftAsIs => "left as is",
        }
    }
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Log and status sinks of one run
pub struct RunLog {
    log: File,
    log_path: PathBuf,
    status_path: PathBuf,
}

impl RunLog {
    pub fn open(config: &RunConfig) -> Result<Self> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

        Ok(Self {
            log,
            log_path: config.log_file.clone(),
            status_path: config.status_file.clone(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append one entry; `File` is unbuffered so it reaches the OS immediately
    pub fn write(&mut self, entry: &str) -> Result<()> {
        writeln!(self.log, "{}", entry)
            .with_context(|| format!("Failed to write log file {}", self.log_path.display()))
    }

    pub fn begin(&mut self, program: &str) -> Result<()> {
        self.write(&format!("\n####   Beginning new instance of {} {}", program, now()))
    }

    pub fn end(&mut self, program: &str) -> Result<()> {
        self.write(&format!("\n####   Ending current instance of {} {}", program, now()))
    }

    /// One line per processed file
    pub fn record(&mut self, path: &Path, status: &FileStatus, format: &str) -> Result<()> {
        let line = match status {
            FileStatus::Converted => format!("{}: {} => {}", now(), path.display(), format),
            FileStatus::Failed(reason) => {
                format!("{}: {} !! failed ({})", now(), path.display(), reason)
            }
            other => format!("{}: {} {} {}", now(), path.display(), other.glyph(), other.label()),
        };
        self.write(&line)
    }

    /// Overwrite the status file with the action about to start
    pub fn status(&self, action: &str) {
        if let Err(e) = std::fs::write(&self.status_path, format!("{}: {}\n", now(), action)) {
            warn!("Failed to update status file {}: {}", self.status_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn run_log(dir: &Path) -> RunLog {
        let config = Config {
            input: dir.to_path_buf(),
            in_place: true,
            log_file: dir.join("conv.log"),
            status_file: dir.join(".status-report"),
            show_progress: false,
            ..Default::default()
        }
        .resolve()
        .unwrap();
        RunLog::open(&config).unwrap()
    }

    #[test]
    fn test_log_appends_across_runs() {
        let dir = TempDir::new().unwrap();

        let mut first = run_log(dir.path());
        first.begin("format-change").unwrap();
        first
            .record(Path::new("a/index.html"), &FileStatus::Modified, "webm")
            .unwrap();
        drop(first);

        let mut second = run_log(dir.path());
        second
            .record(Path::new("a/video.mp4"), &FileStatus::Converted, "webm")
            .unwrap();
        second
            .record(
                Path::new("b/bad.flv"),
                &FileStatus::Failed("return code 1".to_string()),
                "webm",
            )
            .unwrap();
        second.end("format-change").unwrap();

        let content = std::fs::read_to_string(dir.path().join("conv.log")).unwrap();
        assert!(content.contains("Beginning new instance of format-change"));
        assert!(content.contains("a/index.html + modified"));
        assert!(content.contains("a/video.mp4 => webm"));
        assert!(content.contains("b/bad.flv !! failed (return code 1)"));
        assert!(content.contains("Ending current instance"));
    }

    #[test]
    fn test_status_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let log = run_log(dir.path());
        log.status("Converting a.mp4");
        log.status("Copying b.txt");

        let content = std::fs::read_to_string(dir.path().join(".status-report")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("Copying b.txt"));
    }

    #[test]
    fn test_glyphs() {
        assert_eq!(FileStatus::AlreadyPresent.glyph(), "$");
        assert_eq!(FileStatus::Modified.glyph(), "+");
        assert_eq!(FileStatus::Unmodified.glyph(), "-");
        assert_eq!(FileStatus::Failed(String::new()).label(), "failed");
    }
}
