//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la classificazione dei path.
//!
//! ## Responsabilità:
//! - Classificazione dei file (html, video proprietario, altro)
//! - Modello esplicito delle entry del filesystem (file, directory, link simbolico)
//! - Copia sicura di entry senza mai seguire i link simbolici
//! - Propagazione dei permessi (solo metadata, non dati)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Link simbolici:
//! Un link rotto deve risultare "presente" a destinazione, e la copia di un link
//! deve ricreare il link stesso e non il suo target. Per questo ogni controllo
//! passa da `FsEntry::probe`, basato su `symlink_metadata`.
//!
//! ## Esempio:
//! ```ignore
//! match FileManager::classify(&path, &config) {
//!     FileKind::Html => { /* rewrite links */ }
//!     FileKind::Media { suffix } => { /* convert */ }
//!     FileKind::Other => { /* copy verbatim */ }
//! }
//! ```

use crate::config::RunConfig;
use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// What the driver should do with a file, decided from its name alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Html,
    /// Carries the proprietary suffix that matched
    Media { suffix: String },
    Other,
}

/// A filesystem entry as seen without following links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEntry {
    RegularFile,
    Directory,
    Symlink(PathBuf),
}

impl FsEntry {
    /// Inspect `path` without following it; `None` when nothing is there
    pub async fn probe(path: &Path) -> io::Result<Option<Self>> {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let file_type = metadata.file_type();
        let entry = if file_type.is_symlink() {
            Self::Symlink(fs::read_link(path).await?)
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::RegularFile
        };
        Ok(Some(entry))
    }

    /// True for anything at `path`, broken links included
    pub async fn exists(path: &Path) -> io::Result<bool> {
        Ok(Self::probe(path).await?.is_some())
    }
}

/// Manages file operations and classification
pub struct FileManager;

impl FileManager {
    /// Classify a path by its final suffix
    pub fn classify(path: &Path, config: &RunConfig) -> FileKind {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return FileKind::Other,
        };

        if name.ends_with(config.html_suffix.as_str()) {
            return FileKind::Html;
        }

        config
            .proprietary_suffixes
            .iter()
            .find(|suffix| name.ends_with(suffix.as_str()))
            .map(|suffix| FileKind::Media {
                suffix: suffix.clone(),
            })
            .unwrap_or(FileKind::Other)
    }

    /// Copy a single entry to `destination`, recreating symlinks as links
    pub async fn copy_entry(source: &Path, destination: &Path) -> Result<()> {
        match FsEntry::probe(source).await? {
            Some(FsEntry::Symlink(target)) => Self::copy_symlink(&target, destination)
                .await
                .with_context(|| format!("Failed to recreate link {}", destination.display())),
            Some(FsEntry::RegularFile) => {
                fs::copy(source, destination).await.with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), destination.display())
                })?;
                Ok(())
            }
            Some(FsEntry::Directory) => Err(anyhow::anyhow!(
                "Refusing to copy directory {} as a file",
                source.display()
            )),
            None => Err(anyhow::anyhow!("Source vanished: {}", source.display())),
        }
    }

    #[cfg(unix)]
    async fn copy_symlink(target: &Path, destination: &Path) -> io::Result<()> {
        fs::symlink(target, destination).await
    }

    #[cfg(windows)]
    async fn copy_symlink(target: &Path, destination: &Path) -> io::Result<()> {
        fs::symlink_file(target, destination).await
    }

    /// Copy permission bits from `source` onto `destination`.
    ///
    /// Metadata only, the data has already been written.
    pub async fn copy_mode(source: &Path, destination: &Path) -> Result<()> {
        let permissions = fs::metadata(source)
            .await
            .with_context(|| format!("Failed to read permissions of {}", source.display()))?
            .permissions();
        fs::set_permissions(destination, permissions)
            .await
            .with_context(|| format!("Failed to set permissions on {}", destination.display()))?;
        Ok(())
    }

    /// Size in bytes, 0 if the file cannot be read
    pub async fn file_size(path: &Path) -> u64 {
        fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Relative size change in percent; `None` when there is no original size
    pub fn size_change_percent(original_size: u64, new_size: u64) -> Option<f64> {
        if original_size == 0 {
            None
        } else {
            Some(((new_size as f64 - original_size as f64) / original_size as f64) * 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn run_config(dir: &Path) -> RunConfig {
        Config {
            input: dir.to_path_buf(),
            in_place: true,
            show_progress: false,
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn test_classify() {
        let dir = TempDir::new().unwrap();
        let config = run_config(dir.path());

        assert_eq!(FileManager::classify(Path::new("/w/index.html"), &config), FileKind::Html);
        assert_eq!(
            FileManager::classify(Path::new("/w/clip.mp4"), &config),
            FileKind::Media { suffix: ".mp4".to_string() }
        );
        assert_eq!(
            FileManager::classify(Path::new("/w/old.flv"), &config),
            FileKind::Media { suffix: ".flv".to_string() }
        );
        assert_eq!(FileManager::classify(Path::new("/w/clip.webm"), &config), FileKind::Other);
        assert_eq!(FileManager::classify(Path::new("/w/page.htm"), &config), FileKind::Other);
        // Literal, case-sensitive suffixes
        assert_eq!(FileManager::classify(Path::new("/w/CLIP.MP4"), &config), FileKind::Other);
        // Only the final suffix counts
        assert_eq!(FileManager::classify(Path::new("/w/clip.mp4.txt"), &config), FileKind::Other);
    }

    #[tokio::test]
    async fn test_probe_regular_and_missing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(FsEntry::probe(&file).await.unwrap(), Some(FsEntry::RegularFile));
        assert_eq!(FsEntry::probe(dir.path()).await.unwrap(), Some(FsEntry::Directory));
        assert_eq!(FsEntry::probe(&dir.path().join("missing")).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_symlink_exists_and_copies_as_link() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink("/nowhere/at/all", &link).unwrap();

        assert!(FsEntry::exists(&link).await.unwrap());
        assert_eq!(
            FsEntry::probe(&link).await.unwrap(),
            Some(FsEntry::Symlink(PathBuf::from("/nowhere/at/all")))
        );

        let copy = dir.path().join("copy");
        FileManager::copy_entry(&link, &copy).await.unwrap();
        assert_eq!(std::fs::read_link(&copy).unwrap(), PathBuf::from("/nowhere/at/all"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let dest = dir.path().join("dest");
        std::fs::write(&source, b"a").unwrap();
        std::fs::write(&dest, b"b").unwrap();
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o750)).unwrap();

        FileManager::copy_mode(&source, &dest).await.unwrap();
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(std::fs::read(&dest).unwrap(), b"b");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_size_change_percent() {
        assert_eq!(FileManager::size_change_percent(0, 100), None);
        assert_eq!(FileManager::size_change_percent(100, 150), Some(50.0));
        assert_eq!(FileManager::size_change_percent(200, 100), Some(-50.0));
    }
}
