//! # Tree Mirror Driver
//!
//! Orchestratore del walk: visita l'albero sorgente un'entry alla volta e
//! decide per ogni file cosa fare.
//!
//! ## Tabella delle decisioni:
//! - **Video**: già convertito a destinazione → skip; altrimenti conversione.
//!   Se la conversione fallisce in modalità mirror, l'originale viene copiato
//!   col suo nome originale (se non già presente)
//! - **Html in-place**: riscritto sul posto solo se qualcosa cambia
//! - **Html mirror**: skip se presente, altrimenti scritto riscritto o copiato
//! - **Altro in-place**: lasciato stare
//! - **Altro mirror**: skip se presente, altrimenti copiato (link come link)
//!
//! ## Error handling:
//! - La creazione di una directory di destinazione fallita interrompe il run
//! - Gli errori su un singolo file vengono registrati e il walk continua
//! - Una conversione fallita non è un errore: è un esito, registrato come tale

use crate::{
    config::RunConfig,
    error::MirrorError,
    file_manager::{FileKind, FileManager, FsEntry},
    json_output::JsonMessage,
    mirror::path_resolver::PathResolver,
    progress::{ProgressManager, RunStats},
    report::RunReport,
    run_log::{FileStatus, RunLog},
    text_rewriter,
    video_processor::{ConversionOutcome, MediaConverter},
};
use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Name written in the run log markers
pub const PROGRAM_NAME: &str = "format-change";

/// One non-directory entry of the source tree, with its computed destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub source: PathBuf,
    /// For media, the converted (post-rename) path
    pub destination: PathBuf,
    /// For media, the mirrored path under the original name
    pub fallback: Option<PathBuf>,
    pub kind: FileKind,
}

impl FileTask {
    /// Symlinks are always `Other`, whatever their name
    pub fn new(source: PathBuf, is_symlink: bool, config: &RunConfig) -> Result<Self> {
        let kind = if is_symlink {
            FileKind::Other
        } else {
            FileManager::classify(&source, config)
        };

        let mirrored = PathResolver::mirror_path(&source, config)?;
        let (destination, fallback) = match kind {
            FileKind::Media { ref suffix } => (
                PathResolver::converted_path(&mirrored, suffix, config.new_suffix()),
                Some(mirrored),
            ),
            _ => (mirrored, None),
        };

        Ok(Self {
            source,
            destination,
            fallback,
            kind,
        })
    }
}

/// Walks the source tree and mirrors or converts it
pub struct TreeMirror {
    config: RunConfig,
    converter: MediaConverter,
    run_log: RunLog,
    stats: RunStats,
    progress: ProgressManager,
}

impl TreeMirror {
    pub fn new(config: RunConfig) -> Result<Self> {
        let converter = MediaConverter::new(&config);
        let run_log = RunLog::open(&config)?;
        let progress = ProgressManager::new(config.show_progress && !config.json_output);

        Ok(Self {
            config,
            converter,
            run_log,
            stats: RunStats::new(),
            progress,
        })
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Walk the whole tree once and return the final report
    pub async fn run(&mut self) -> Result<RunReport> {
        let start_time = Instant::now();

        if self.config.in_place() {
            info!("Converting in place under {}", self.config.source_root.display());
        } else {
            info!(
                "Mirroring {} into {}",
                self.config.source_root.display(),
                self.config.destination_root.display()
            );
        }
        info!(
            "Target format: {}, log: {}",
            self.config.format,
            self.run_log.log_path().display()
        );

        self.run_log.begin(PROGRAM_NAME)?;
        if self.config.json_output {
            JsonMessage::start(&self.config).emit();
        }

        let walker = WalkDir::new(&self.config.source_root)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.record_walk_error(e)?;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                self.mirror_directory(entry.path()).await?;
                continue;
            }

            let task = FileTask::new(
                entry.path().to_path_buf(),
                entry.path_is_symlink(),
                &self.config,
            )?;
            self.process_task(task).await?;
        }

        let report = RunReport::from_stats(&self.stats);
        self.run_log.write(&report.to_string())?;
        self.run_log.end(PROGRAM_NAME)?;

        let summary = self.stats.format_summary();
        self.progress.finish(&summary);
        info!("{}", summary);

        if self.config.json_output {
            JsonMessage::complete(report.clone(), start_time.elapsed().as_secs_f64()).emit();
        }

        Ok(report)
    }

    fn record_walk_error(&mut self, e: walkdir::Error) -> Result<()> {
        let path = e
            .path()
            .map(|p| PathResolver::relative(p, &self.config).to_path_buf())
            .unwrap_or_default();
        warn!("Cannot read {}: {}", path.display(), e);

        self.stats.errors += 1;
        self.run_log
            .record(&path, &FileStatus::Failed(e.to_string()), self.config.format.name())
    }

    /// Create the mirrored directory if it is missing
    async fn mirror_directory(&mut self, path: &Path) -> Result<()> {
        self.stats.directories_visited += 1;
        if self.config.in_place() {
            return Ok(());
        }

        let mirrored = PathResolver::mirror_path(path, &self.config)?;
        let entry = FsEntry::probe(&mirrored)
            .await
            .map_err(|source| MirrorError::DirectoryCreation {
                path: mirrored.clone(),
                source,
            })?;
        let linked_directory = match entry {
            Some(FsEntry::Symlink(_)) => Self::resolves_to_directory(&mirrored).await,
            _ => false,
        };
        match entry {
            Some(FsEntry::Directory) => return Ok(()),
            Some(FsEntry::Symlink(_)) if linked_directory => return Ok(()),
            Some(_) => {
                return Err(MirrorError::DirectoryCreation {
                    path: mirrored,
                    source: io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "something other than a directory is in the way",
                    ),
                }
                .into())
            }
            None => {}
        }

        self.run_log
            .status(&format!("Creating directory {}", mirrored.display()));
        fs::create_dir_all(&mirrored)
            .await
            .map_err(|source| MirrorError::DirectoryCreation {
                path: mirrored.clone(),
                source,
            })?;
        self.stats.directories_created += 1;
        debug!("Created directory {}", mirrored.display());

        if let Err(e) = FileManager::copy_mode(path, &mirrored).await {
            warn!("{:#}", e);
        }
        Ok(())
    }

    async fn resolves_to_directory(path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    async fn process_task(&mut self, task: FileTask) -> Result<()> {
        let relative = PathResolver::relative(&task.source, &self.config).to_path_buf();

        let status = match self.process_file(&task, &relative).await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to process {}: {:#}", relative.display(), e);
                self.stats.errors += 1;
                FileStatus::Failed(format!("{:#}", e))
            }
        };

        self.stats.record(&task.kind, &status);
        self.run_log
            .record(&relative, &status, self.config.format.name())?;
        self.progress.update(&relative.display().to_string());
        if self.config.json_output {
            JsonMessage::file_complete(relative, &status).emit();
        }
        Ok(())
    }

    async fn process_file(&mut self, task: &FileTask, relative: &Path) -> Result<FileStatus> {
        match task.kind {
            FileKind::Media { ref suffix } => self.process_media(task, suffix, relative).await,
            FileKind::Html => self.process_html(task, relative).await,
            FileKind::Other => self.process_other(task, relative).await,
        }
    }

    async fn process_media(
        &mut self,
        task: &FileTask,
        suffix: &str,
        relative: &Path,
    ) -> Result<FileStatus> {
        if FsEntry::exists(&task.destination).await? {
            debug!("Already converted: {}", task.destination.display());
            return Ok(FileStatus::AlreadyPresent);
        }

        self.run_log.status(&format!(
            "Converting {} to {}",
            relative.display(),
            self.config.format
        ));
        info!("Converting {} to {}", relative.display(), self.config.format);

        let outcome = self.converter.convert(&task.source, &task.destination).await;
        self.stats.record_conversion(suffix, &outcome);

        match outcome {
            ConversionOutcome::Success {
                bytes_in,
                bytes_out,
                duration,
            } => {
                info!(
                    "Converted {} in {:.1}s ({} -> {})",
                    relative.display(),
                    duration.as_secs_f64(),
                    FileManager::format_size(bytes_in),
                    FileManager::format_size(bytes_out)
                );

                if self.config.delete_originals {
                    self.run_log
                        .status(&format!("Deleting original {}", relative.display()));
                    fs::remove_file(&task.source).await.with_context(|| {
                        format!("Converted but failed to delete {}", task.source.display())
                    })?;
                    self.stats.originals_deleted += 1;
                }
                Ok(FileStatus::Converted)
            }
            ConversionOutcome::Failure { reason, .. } => {
                warn!("Conversion of {} failed: {}", relative.display(), reason);

                if !self.config.in_place() {
                    if let Some(ref fallback) = task.fallback {
                        self.copy_original(&task.source, fallback, relative).await;
                    }
                }
                Ok(FileStatus::Failed(reason.to_string()))
            }
        }
    }

    /// Keep the mirror complete when a conversion fails
    async fn copy_original(&mut self, source: &Path, fallback: &Path, relative: &Path) {
        if let Err(e) = self.try_copy_original(source, fallback, relative).await {
            error!("Failed to copy unconverted {}: {:#}", relative.display(), e);
            self.stats.errors += 1;
        }
    }

    async fn try_copy_original(&self, source: &Path, fallback: &Path, relative: &Path) -> Result<()> {
        if FsEntry::exists(fallback).await? {
            return Ok(());
        }
        self.run_log
            .status(&format!("Copying unconverted {}", relative.display()));
        FileManager::copy_entry(source, fallback).await
    }

    async fn process_html(&mut self, task: &FileTask, relative: &Path) -> Result<FileStatus> {
        if !self.config.in_place() && FsEntry::exists(&task.destination).await? {
            return Ok(FileStatus::AlreadyPresent);
        }

        self.run_log
            .status(&format!("Rewriting links in {}", relative.display()));
        let rewritten = text_rewriter::rewrite_file(
            &task.source,
            &self.config.proprietary_suffixes,
            self.config.new_suffix(),
        )
        .await?;

        match rewritten {
            Some(content) => {
                let permissions = fs::metadata(&task.source)
                    .await
                    .with_context(|| format!("Failed to read permissions of {}", task.source.display()))?
                    .permissions();
                text_rewriter::write_atomically(&task.destination, &content, Some(permissions))?;
                debug!("Rewrote links in {}", relative.display());
                Ok(FileStatus::Modified)
            }
            None if self.config.in_place() => Ok(FileStatus::Unmodified),
            None => {
                FileManager::copy_entry(&task.source, &task.destination).await?;
                Ok(FileStatus::Unmodified)
            }
        }
    }

    async fn process_other(&mut self, task: &FileTask, relative: &Path) -> Result<FileStatus> {
        if self.config.in_place() {
            return Ok(FileStatus::LeftAsIs);
        }
        if FsEntry::exists(&task.destination).await? {
            return Ok(FileStatus::AlreadyPresent);
        }

        self.run_log
            .status(&format!("Copying {}", relative.display()));
        FileManager::copy_entry(&task.source, &task.destination).await?;
        Ok(FileStatus::Copied)
    }
}
