//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `MirrorError` per gli errori di setup e gli errori fatali del walk
//! - Definisce `FailureReason` per i fallimenti (recuperabili) di una singola conversione
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - Setup: sorgente mancante, destinazione già esistente o annidata, formato sconosciuto
//! - Fatali: creazione di una directory di destinazione fallita
//! - Per file: non sono errori Rust ma `FailureReason`, registrati e poi ignorati
//!
//! ## Esempio:
//! ```ignore
//! if !source.is_dir() {
//!     return Err(MirrorError::SourceNotDirectory(source));
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for tree mirroring
#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source directory does not exist: {0}")]
    MissingSource(PathBuf),

    #[error("Source is not a directory: {0}")]
    SourceNotDirectory(PathBuf),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Destination is not a directory: {0}")]
    DestinationNotDirectory(PathBuf),

    #[error("Destination {destination} is inside source {source_root}")]
    DestinationInsideSource {
        source_root: PathBuf,
        destination: PathBuf,
    },

    #[error("'{0}' is an unrecognized format (expected ogv or webm)")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),
}

/// Why a single media conversion did not produce output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The transcoder exited unsuccessfully (`None` when killed by a signal)
    ExitStatus(Option<i32>),
    Timeout(Duration),
    Spawn(String),
    Io(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitStatus(Some(code)) => write!(f, "return code {}", code),
            Self::ExitStatus(None) => write!(f, "terminated by signal"),
            Self::Timeout(limit) => write!(f, "timeout after {}s", limit.as_secs()),
            Self::Spawn(e) => write!(f, "could not start transcoder: {}", e),
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::ExitStatus(Some(1)).to_string(), "return code 1");
        assert_eq!(
            FailureReason::Timeout(Duration::from_secs(30)).to_string(),
            "timeout after 30s"
        );
    }

    #[test]
    fn test_directory_creation_names_path() {
        let err = MirrorError::DirectoryCreation {
            path: PathBuf::from("/mirror/a"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/mirror/a"));
    }
}
