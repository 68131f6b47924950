//! # Format Change Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione grezza e configurazione risolta del run
//! - `error`: Errori di setup e fallimenti di conversione
//! - `file_manager`: Classificazione dei path e operazioni sui file
//! - `text_rewriter`: Riscrittura dei link nei file html
//! - `video_processor`: Conversione dei video tramite transcoder esterno
//! - `mirror`: Walk dell'albero e tabella delle decisioni
//! - `progress`: Spinner e statistiche del run
//! - `report`: Report finale con metriche derivate
//! - `run_log`: Log append-only e file di stato
//! - `json_output`: Eventi JSON su stdout
//!
//! ## Utilizzo:
//! ```ignore
//! use format_change::{Config, TreeMirror};
//!
//! let config = Config { in_place: true, ..Default::default() }.resolve()?;
//! let report = TreeMirror::new(config)?.run().await?;
//! println!("{}", report);
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod mirror;
pub mod progress;
pub mod report;
pub mod run_log;
pub mod text_rewriter;
pub mod video_processor;

pub use config::{Config, RunConfig, TargetFormat};
pub use error::MirrorError;
pub use mirror::TreeMirror;
pub use progress::RunStats;
pub use report::RunReport;
