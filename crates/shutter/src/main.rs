//! Shutter CLI - Photo upload ingestion from the command line.
//!
//! Shutter validates uploads, normalizes orientation, generates derivatives,
//! and writes everything to storage atomically. The CLI plays the part of the
//! web application: it feeds files in and prints the stored artifact records.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a single image for owner 42
//! shutter ingest photo.jpg --owner 42
//!
//! # Ingest a directory
//! shutter ingest ./photos/ --owner 42 --format jsonl --output stored.jsonl
//!
//! # Validate without storing
//! shutter check upload.png
//!
//! # View configuration
//! shutter config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Shutter - Photo upload validation, normalization, and derivative generation.
#[derive(Parser, Debug)]
#[command(name = "shutter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SHUTTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest image files: validate, normalize, derive, and store
    Ingest(cli::ingest::IngestArgs),

    /// Validate a file without storing anything
    Check(cli::check::CheckArgs),

    /// Remove stored artifacts by relative path
    Remove(cli::remove::RemoveArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let loaded = match &cli.config {
        Some(path) => shutter_core::Config::load_from(path),
        None => shutter_core::Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e.into()),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `shutter config path`."
            );
            shutter_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Shutter v{}", shutter_core::VERSION);

    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Check(args) => cli::check::execute(args, &config),
        Commands::Remove(args) => cli::remove::execute(args, &config),
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()),
    }
}
