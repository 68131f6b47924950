//! # Video Processing Module
//!
//! Questo modulo gestisce la conversione dei video proprietari in formati aperti.
//!
//! ## Responsabilità:
//! - Costruzione della command line del transcoder (un template per formato)
//! - Esecuzione del transcoder come processo esterno con timeout
//! - Normalizzazione dell'esito in `ConversionOutcome` (successo/fallimento)
//! - Propagazione dei permessi del sorgente sul file convertito
//! - Verifica della presenza del transcoder prima dell'avvio
//!
//! ## Formati supportati:
//! - **Input**: MP4, FLV (configurabili)
//! - **Output**: WebM (default) oppure OGV (audio libvorbis)
//!
//! ## Pipeline di conversione:
//! 1. Crea un file temporaneo nascosto accanto alla destinazione, con la stessa estensione
//! 2. Lancia il transcoder verso il file temporaneo
//! 3. Exit status 0: rinomina il temporaneo sulla destinazione e copia i permessi
//! 4. Exit status != 0, timeout o errore di avvio: il temporaneo viene eliminato
//!
//! Una destinazione esiste quindi solo dopo una conversione completa: un file
//! parziale non può mai essere scambiato per "già convertito" al run successivo.
//!
//! ## Timeout:
//! Il processo viene terminato (kill + wait) allo scadere del timeout,
//! senza lasciare processi orfani.
//!
//! ## Esempio:
//! ```ignore
//! let converter = MediaConverter::new(&run_config);
//! match converter.convert(&source, &destination).await {
//!     ConversionOutcome::Success { bytes_out, .. } => { /* count it */ }
//!     ConversionOutcome::Failure { reason, .. } => { /* log it, keep original */ }
//! }
//! ```

use crate::config::{RunConfig, TargetFormat};
use crate::error::{FailureReason, MirrorError};
use crate::file_manager::FileManager;
use anyhow::Result;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of one conversion attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Success {
        bytes_in: u64,
        bytes_out: u64,
        duration: Duration,
    },
    Failure {
        reason: FailureReason,
        duration: Duration,
    },
}

/// Drives the external transcoder
pub struct MediaConverter {
    format: TargetFormat,
    command: Vec<String>,
    timeout: Duration,
}

impl MediaConverter {
    pub fn new(config: &RunConfig) -> Self {
        let command = match config.transcoder_command {
            Some(ref command) => command.clone(),
            None => config
                .format
                .command_template()
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        };

        Self {
            format: config.format,
            command,
            timeout: config.timeout,
        }
    }

    /// Program the transcoder command starts
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Substitute source and destination into the command template
    fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        self.command
            .iter()
            .skip(1)
            .map(|arg| match arg.as_str() {
                "{input}" => input.as_os_str().to_os_string(),
                "{output}" => output.as_os_str().to_os_string(),
                other => OsString::from(
                    other
                        .replace("{input}", &input.to_string_lossy())
                        .replace("{output}", &output.to_string_lossy()),
                ),
            })
            .collect()
    }

    /// Convert `source` into `destination`, never touching `source`
    pub async fn convert(&self, source: &Path, destination: &Path) -> ConversionOutcome {
        let start_time = Instant::now();
        let result = self.convert_internal(source, destination).await;
        let duration = start_time.elapsed();

        match result {
            Ok(bytes_out) => ConversionOutcome::Success {
                bytes_in: FileManager::file_size(source).await,
                bytes_out,
                duration,
            },
            Err(reason) => ConversionOutcome::Failure { reason, duration },
        }
    }

    async fn convert_internal(&self, source: &Path, destination: &Path) -> Result<u64, FailureReason> {
        let parent = destination
            .parent()
            .ok_or_else(|| FailureReason::Io(format!("no parent for {}", destination.display())))?;

        // Same extension as the destination, the transcoder picks its muxer from it
        let staged = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(self.format.suffix())
            .tempfile_in(parent)
            .map_err(|e| FailureReason::Io(e.to_string()))?;

        self.run_transcoder(source, staged.path()).await?;
        self.publish(staged, source, destination).await
    }

    async fn run_transcoder(&self, input: &Path, output: &Path) -> Result<(), FailureReason> {
        let mut cmd = Command::new(self.program());
        cmd.args(self.build_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(transcoder_cmd = ?cmd, "Starting transcoder");

        let mut child = cmd
            .spawn()
            .map_err(|e| FailureReason::Spawn(format!("{}: {}", self.program(), e)))?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| FailureReason::Io(e.to_string()))?,
            Err(_) => {
                // kill() also reaps the child
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill transcoder for {}: {}", input.display(), e);
                }
                stderr_task.abort();
                warn!("Transcoder exceeded {:?} on {}, killed", self.timeout, input.display());
                return Err(FailureReason::Timeout(self.timeout));
            }
        };

        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            debug!(
                "Transcoder stderr for {}: {}",
                input.display(),
                String::from_utf8_lossy(&stderr).trim_end()
            );
            return Err(FailureReason::ExitStatus(status.code()));
        }
        stderr_task.abort();

        Ok(())
    }

    /// Move the finished output into place and give it the source's permission bits
    async fn publish(
        &self,
        staged: NamedTempFile,
        source: &Path,
        destination: &Path,
    ) -> Result<u64, FailureReason> {
        staged
            .persist(destination)
            .map_err(|e| FailureReason::Io(e.error.to_string()))?;

        if let Err(e) = FileManager::copy_mode(source, destination).await {
            warn!("Converted {} but could not copy permissions: {:#}", destination.display(), e);
        }

        Ok(FileManager::file_size(destination).await)
    }

    /// Check if the transcoder is available, either as a path or on `PATH`
    pub async fn check_dependencies(&self) -> Result<()> {
        let program = Path::new(self.program());
        let found = if program.components().count() > 1 {
            program.is_file()
        } else {
            std::env::var_os("PATH")
                .map(|paths| {
                    std::env::split_paths(&paths).any(|dir| {
                        let candidate = dir.join(program);
                        candidate.is_file() || candidate.with_extension("exe").is_file()
                    })
                })
                .unwrap_or(false)
        };

        if found {
            debug!("Found transcoder {}", program.display());
            return Ok(());
        }

        Err(MirrorError::MissingDependency(format!(
            "{} is required for {} conversion",
            program.display(),
            self.format
        ))
        .into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn converter(dir: &Path, command: &[&str], timeout_secs: u64) -> MediaConverter {
        let config = Config {
            input: dir.to_path_buf(),
            in_place: true,
            timeout_secs,
            transcoder_command: Some(command.iter().map(|s| s.to_string()).collect()),
            show_progress: false,
            ..Default::default()
        };
        MediaConverter::new(&config.resolve().unwrap())
    }

    fn clip(dir: &Path) -> std::path::PathBuf {
        let source = dir.join("clip.mp4");
        std::fs::write(&source, b"not really a video").unwrap();
        source
    }

    #[test]
    fn test_default_command_template() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            input: dir.path().to_path_buf(),
            in_place: true,
            format: "ogv".to_string(),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        let converter = MediaConverter::new(&config);
        assert_eq!(converter.program(), "ffmpeg");

        let args = converter.build_args(Path::new("/v/a b.mp4"), Path::new("/v/a b.ogv"));
        assert!(args.contains(&OsString::from("/v/a b.mp4")));
        assert_eq!(args.last(), Some(&OsString::from("/v/a b.ogv")));
        assert!(args.contains(&OsString::from("libvorbis")));
    }

    #[tokio::test]
    async fn test_convert_success_copies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = clip(dir.path());
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o640)).unwrap();
        let destination = dir.path().join("clip.webm");

        let outcome = converter(dir.path(), &["cp", "{input}", "{output}"], 10)
            .convert(&source, &destination)
            .await;

        match outcome {
            ConversionOutcome::Success { bytes_in, bytes_out, .. } => {
                assert_eq!(bytes_in, 18);
                assert_eq!(bytes_out, 18);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let mode = std::fs::metadata(&destination).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_convert_failure_leaves_no_partial_output() {
        let dir = TempDir::new().unwrap();
        let source = clip(dir.path());
        let destination = dir.path().join("clip.webm");

        // Writes some bytes to its output, then fails
        let outcome = converter(
            dir.path(),
            &["sh", "-c", "echo partial > \"$1\"; exit 3", "sh", "{output}", "{input}"],
            10,
        )
        .convert(&source, &destination)
        .await;

        assert!(matches!(
            outcome,
            ConversionOutcome::Failure { reason: FailureReason::ExitStatus(Some(3)), .. }
        ));
        assert!(!destination.exists());
        assert_eq!(std::fs::read(&source).unwrap(), b"not really a video");
        // Only the original is left in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_convert_timeout_kills_transcoder() {
        let dir = TempDir::new().unwrap();
        let source = clip(dir.path());
        let destination = dir.path().join("clip.webm");

        let outcome = converter(dir.path(), &["sh", "-c", "exec sleep 30", "sh", "{input}", "{output}"], 1)
            .convert(&source, &destination)
            .await;

        match outcome {
            ConversionOutcome::Failure { reason, duration } => {
                assert_eq!(reason, FailureReason::Timeout(Duration::from_secs(1)));
                assert!(duration < Duration::from_secs(20));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_convert_missing_program() {
        let dir = TempDir::new().unwrap();
        let source = clip(dir.path());
        let destination = dir.path().join("clip.webm");

        let converter = converter(
            dir.path(),
            &["definitely-not-a-transcoder-binary", "{input}", "{output}"],
            10,
        );
        let outcome = converter.convert(&source, &destination).await;
        assert!(matches!(
            outcome,
            ConversionOutcome::Failure { reason: FailureReason::Spawn(_), .. }
        ));
        assert!(converter.check_dependencies().await.is_err());
    }

    #[tokio::test]
    async fn test_check_dependencies_finds_program() {
        let dir = TempDir::new().unwrap();
        let converter = converter(dir.path(), &["cp", "{input}", "{output}"], 10);
        tokio_test::assert_ok!(converter.check_dependencies().await);
    }
}
