//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri grezzi forniti dall'utente
//! - Risolve `Config` in una `RunConfig` immutabile (path assoluti, formato tipizzato)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `input`: Directory sorgente (default: "./")
//! - `output`: Directory di destinazione (None + `in_place` = modifica la sorgente)
//! - `format`: Formato desiderato, "ogv" o "webm" (default: "webm")
//! - `delete_originals`: Cancella l'originale dopo una conversione riuscita
//! - `log_file` / `status_file`: Log append-only e file di stato sovrascritto
//! - `timeout_secs`: Tempo massimo per una singola conversione (default: 900)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     output: Some("/srv/www-open".into()),
//!     format: "ogv".to_string(),
//!     ..Default::default()
//! };
//! let run_config = config.resolve()?;
//! ```

use crate::error::MirrorError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTML_SUFFIX: &str = ".html";
pub const DEFAULT_PROPRIETARY_SUFFIXES: [&str; 2] = [".mp4", ".flv"];

/// Open formats the converter can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Ogv,
    Webm,
}

impl TargetFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ogv => "ogv",
            Self::Webm => "webm",
        }
    }

    /// Suffix given to converted files, separator included
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Ogv => ".ogv",
            Self::Webm => ".webm",
        }
    }

    /// Default transcoder invocation; `{input}` and `{output}` are substituted per argument
    pub fn command_template(&self) -> &'static [&'static str] {
        match self {
            Self::Ogv => &[
                "ffmpeg", "-flags", "qscale", "-global_quality", "1",
                "-i", "{input}", "-acodec", "libvorbis", "-y", "{output}",
            ],
            Self::Webm => &[
                "ffmpeg", "-flags", "qscale", "-global_quality", "1",
                "-i", "{input}", "-y", "{output}",
            ],
        }
    }
}

impl FromStr for TargetFormat {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ogv" => Ok(Self::Ogv),
            "webm" => Ok(Self::Webm),
            other => Err(MirrorError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing configuration, as read from the command line or a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory under which html and video files are found
    pub input: PathBuf,
    /// Destination directory (None when working in place)
    pub output: Option<PathBuf>,
    /// Modify the source tree instead of mirroring it
    pub in_place: bool,
    /// Desired format: "ogv" or "webm"
    pub format: String,
    /// Delete originals that were successfully converted
    pub delete_originals: bool,
    /// Append-only run log
    pub log_file: PathBuf,
    /// Overwritten with the last action attempted
    pub status_file: PathBuf,
    pub html_suffix: String,
    pub proprietary_suffixes: Vec<String>,
    /// Maximum seconds a single conversion may take
    pub timeout_secs: u64,
    /// Replaces the format's default transcoder command
    pub transcoder_command: Option<Vec<String>>,
    /// Refuse to run if the destination already exists
    pub fresh_destination: bool,
    /// Show a spinner on stderr while walking
    pub show_progress: bool,
    /// Output progress and summary as JSON lines on stdout
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("./"),
            output: None,
            in_place: false,
            format: TargetFormat::Webm.name().to_string(),
            delete_originals: false,
            log_file: std::env::temp_dir().join("conv.log"),
            status_file: PathBuf::from(".status-report"),
            html_suffix: DEFAULT_HTML_SUFFIX.to_string(),
            proprietary_suffixes: DEFAULT_PROPRIETARY_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 900,
            transcoder_command: None,
            fresh_destination: false,
            show_progress: true,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters that don't touch the filesystem
    pub fn validate(&self) -> Result<(), MirrorError> {
        let format: TargetFormat = self.format.parse()?;

        match (&self.output, self.in_place) {
            (Some(_), true) => {
                return Err(MirrorError::InvalidConfig(
                    "an output directory and in-place mode are mutually exclusive".to_string(),
                ))
            }
            (None, false) => {
                return Err(MirrorError::InvalidConfig(
                    "either an output directory or in-place mode is required".to_string(),
                ))
            }
            _ => {}
        }

        if self.in_place && self.fresh_destination {
            return Err(MirrorError::InvalidConfig(
                "in-place mode cannot require a fresh destination".to_string(),
            ));
        }

        // A suffix is a separator followed by at least one character
        if self.html_suffix.chars().count() < 2 {
            return Err(MirrorError::InvalidConfig(format!(
                "html suffix '{}' is too short",
                self.html_suffix
            )));
        }

        if self.proprietary_suffixes.is_empty() {
            return Err(MirrorError::InvalidConfig(
                "at least one proprietary suffix is required".to_string(),
            ));
        }

        for suffix in &self.proprietary_suffixes {
            if suffix.chars().count() < 2 {
                return Err(MirrorError::InvalidConfig(format!(
                    "proprietary suffix '{}' is too short",
                    suffix
                )));
            }
            if *suffix == self.html_suffix {
                return Err(MirrorError::InvalidConfig(format!(
                    "'{}' cannot be both the html suffix and a proprietary suffix",
                    suffix
                )));
            }
            // The target suffix is never a rewrite source
            if suffix == format.suffix() {
                return Err(MirrorError::InvalidConfig(format!(
                    "'{}' is the target format's own suffix",
                    suffix
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(MirrorError::InvalidConfig(
                "timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if let Some(ref command) = self.transcoder_command {
            let has = |placeholder: &str| command.iter().any(|arg| arg.contains(placeholder));
            if command.is_empty() || !has("{input}") || !has("{output}") {
                return Err(MirrorError::InvalidConfig(
                    "transcoder command must name a program and use {input} and {output}"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve into the immutable configuration of one run.
    ///
    /// Every path becomes absolute here, before any traversal begins.
    pub fn resolve(&self) -> Result<RunConfig, MirrorError> {
        self.validate()?;
        let format: TargetFormat = self.format.parse()?;

        let input = absolute(&self.input)?;
        if !input.exists() {
            return Err(MirrorError::MissingSource(input));
        }
        if !input.is_dir() {
            return Err(MirrorError::SourceNotDirectory(input));
        }
        let source_root = input.canonicalize()?;

        let destination_root = match self.output {
            Some(ref output) if !self.in_place => canonicalize_lenient(&absolute(output)?)?,
            _ => source_root.clone(),
        };

        if self.fresh_destination && destination_root.exists() {
            return Err(MirrorError::DestinationExists(destination_root));
        }

        if destination_root != source_root {
            if destination_root.starts_with(&source_root) {
                return Err(MirrorError::DestinationInsideSource {
                    source_root,
                    destination: destination_root,
                });
            }
            if destination_root.exists() && !destination_root.is_dir() {
                return Err(MirrorError::DestinationNotDirectory(destination_root));
            }
        }

        Ok(RunConfig {
            source_root,
            destination_root,
            format,
            delete_originals: self.delete_originals,
            log_file: absolute(&self.log_file)?,
            status_file: absolute(&self.status_file)?,
            html_suffix: self.html_suffix.clone(),
            proprietary_suffixes: self.proprietary_suffixes.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            transcoder_command: self.transcoder_command.clone(),
            show_progress: self.show_progress,
            json_output: self.json_output,
        })
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Configuration of a single run, resolved once and never mutated
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    /// Equal to `source_root` when mutating in place
    pub destination_root: PathBuf,
    pub format: TargetFormat,
    pub delete_originals: bool,
    pub log_file: PathBuf,
    pub status_file: PathBuf,
    pub html_suffix: String,
    pub proprietary_suffixes: Vec<String>,
    pub timeout: Duration,
    pub transcoder_command: Option<Vec<String>>,
    pub show_progress: bool,
    pub json_output: bool,
}

impl RunConfig {
    pub fn in_place(&self) -> bool {
        self.source_root == self.destination_root
    }

    pub fn new_suffix(&self) -> &'static str {
        self.format.suffix()
    }
}

/// Expand a leading `~` and make the path absolute against the working directory
fn absolute(path: &Path) -> Result<PathBuf, MirrorError> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    Ok(std::path::absolute(expanded)?)
}

/// Canonicalize the longest existing ancestor and re-append the rest,
/// so a destination that doesn't exist yet still compares against the source.
fn canonicalize_lenient(path: &Path) -> Result<PathBuf, MirrorError> {
    // `std::path::absolute` keeps `..` components; drop them lexically first
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized;
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut resolved = if existing.exists() {
        existing.canonicalize()?
    } else {
        existing
    };
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}
