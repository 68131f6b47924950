//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout quando `--json` è attivo
//! - Riusa `RunReport` per il messaggio finale
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del run (sorgente, destinazione, formato)
//! - `file_complete`: Fine elaborazione di un file, con il suo stato
//! - `complete`: Fine del run con il report completo
//! - `error`: Errore fatale

use crate::config::RunConfig;
use crate::report::RunReport;
use crate::run_log::FileStatus;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start {
        source: PathBuf,
        destination: PathBuf,
        format: String,
        in_place: bool,
    },

    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        status: String,
        error: Option<String>,
    },

    #[serde(rename = "complete")]
    Complete {
        report: RunReport,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(config: &RunConfig) -> Self {
        Self::Start {
            source: config.source_root.clone(),
            destination: config.destination_root.clone(),
            format: config.format.to_string(),
            in_place: config.in_place(),
        }
    }

    pub fn file_complete(path: PathBuf, status: &FileStatus) -> Self {
        let error = match status {
            FileStatus::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self::FileComplete {
            path,
            status: status.label().to_string(),
            error,
        }
    }

    pub fn complete(report: RunReport, duration_seconds: f64) -> Self {
        Self::Complete {
            report,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RunStats;

    #[test]
    fn test_file_complete_serialization() {
        let message = JsonMessage::file_complete(
            PathBuf::from("a/video.mp4"),
            &FileStatus::Failed("timeout after 900s".to_string()),
        );
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "timeout after 900s");
    }

    #[test]
    fn test_complete_carries_report() {
        let report = RunReport::from_stats(&RunStats::new());
        let json = serde_json::to_value(JsonMessage::complete(report, 1.5)).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["report"]["files_visited"], 0);
        assert!(json["report"]["media_total"]["average_seconds"].is_null());
    }
}
