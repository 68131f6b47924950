//! # Format Change - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file JSON opzionale + override da CLI)
//! - Avvio del mirror e stampa del report finale
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO/DEBUG/TRACE)
//! 3. Risolve la configurazione: sorgente e destinazione vengono validate qui
//! 4. Verifica che il transcoder sia disponibile
//! 5. Esegue il walk e stampa il report
//!
//! ## Esempio di utilizzo:
//! ```bash
//! format-change -i /srv/www -o /srv/www-open -f ogv --verbose
//! format-change -i ./site --in-place --delete
//! ```

use anyhow::Result;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use format_change::json_output::JsonMessage;
use format_change::video_processor::MediaConverter;
use format_change::{Config, TreeMirror};

#[derive(Parser)]
#[command(name = "format-change")]
#[command(version)]
#[command(about = "Convert proprietary videos to open formats and fix the html that links them")]
#[command(group(ArgGroup::new("target").required(true).args(["output", "in_place"])))]
struct Args {
    /// Directory under which html and video files are found (default: ./)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Mirror the converted tree into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Modify the input directory instead of mirroring it
    #[arg(long)]
    in_place: bool,

    /// Desired open format: ogv or webm (default: webm)
    #[arg(short, long)]
    format: Option<String>,

    /// Delete originals that were successfully converted
    #[arg(short, long)]
    delete: bool,

    /// Append-only log file (default: <tmp>/conv.log)
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// File overwritten with the action currently attempted
    #[arg(short, long)]
    statusfile: Option<PathBuf>,

    /// Maximum seconds a single conversion may take
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Transcoder command template, e.g. "ffmpeg -i {input} -y {output}"
    #[arg(long)]
    transcoder: Option<String>,

    /// Refuse to run if the output directory already exists
    #[arg(long, conflicts_with = "in_place")]
    fresh: bool,

    /// Base configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output progress and summary as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Trace logging, including transcoder command lines
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Layer the command line over the base configuration
    fn apply(self, mut config: Config) -> Config {
        config.output = self.output;
        config.in_place = self.in_place;
        config.delete_originals |= self.delete;
        config.fresh_destination |= self.fresh;

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(logfile) = self.logfile {
            config.log_file = logfile;
        }
        if let Some(statusfile) = self.statusfile {
            config.status_file = statusfile;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(transcoder) = self.transcoder {
            config.transcoder_command =
                Some(transcoder.split_whitespace().map(str::to_string).collect());
        }
        if self.json {
            config.json_output = true;
            config.show_progress = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.debug {
        "trace"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = args.json;
    let result = run(args).await;

    if let Err(ref e) = result {
        if json {
            JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
        }
    }
    result
}

async fn run(args: Args) -> Result<()> {
    let base = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    let json = args.json;
    let config = args.apply(base).resolve()?;

    MediaConverter::new(&config).check_dependencies().await?;

    let mut mirror = TreeMirror::new(config)?;
    let report = mirror.run().await?;

    if !json {
        println!("{}", report);
    }
    Ok(())
}
