//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di destinazione:
//! - prefisso sorgente sostituito dal prefisso destinazione (una sola volta, a sinistra)
//! - per i video, solo il suffisso proprietario finale viene rinominato

use crate::config::RunConfig;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Path relative to the source root, for logging
    pub fn relative<'a>(path: &'a Path, config: &RunConfig) -> &'a Path {
        path.strip_prefix(&config.source_root).unwrap_or(path)
    }

    /// Mirror a path under the source root into the destination root
    pub fn mirror_path(path: &Path, config: &RunConfig) -> Result<PathBuf> {
        let relative = path.strip_prefix(&config.source_root).map_err(|_| {
            anyhow::anyhow!(
                "{} is not under source root {}",
                path.display(),
                config.source_root.display()
            )
        })?;

        if relative.as_os_str().is_empty() {
            Ok(config.destination_root.clone())
        } else {
            Ok(config.destination_root.join(relative))
        }
    }

    /// Swap the final `old_suffix` of the file name for `new_suffix`,
    /// leaving every other path segment alone
    pub fn converted_path(path: &Path, old_suffix: &str, new_suffix: &str) -> PathBuf {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return path.to_path_buf(),
        };

        match name.strip_suffix(old_suffix) {
            Some(stem) => path.with_file_name(format!("{}{}", stem, new_suffix)),
            None => path.to_path_buf(),
        }
    }
}
