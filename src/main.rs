//! # docqa CLI
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ingest` | Chunk, embed, and index the markdown corpus (full replace) |
//! | `docqa serve` | Start the HTTP server |
//!
//! All commands read a TOML config (`--config`, default
//! `./config/docqa.toml`). The provider API key always comes from the
//! `OPENAI_API_KEY` environment variable.
//!
//! Ingestion replaces the whole collection; do not run two ingests
//! concurrently against the same store.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docqa::{config, ingest, logging, server};

/// docqa — a retrieval-augmented documentation assistant.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — retrieval-augmented Q&A over a markdown corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and index the corpus, replacing the collection.
    Ingest,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
    }

    Ok(())
}
