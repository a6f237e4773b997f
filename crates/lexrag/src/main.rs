//! # lexrag CLI
//!
//! ```bash
//! lexrag [--config lexrag.toml] <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag chunks <file>` | Segment a document and list its chunks |
//! | `lexrag search <file> "<query>"` | Rank a document's chunks against a query |
//! | `lexrag serve` | Start the JSON HTTP server |
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG` to adjust
//! (default `lexrag=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lexrag::config::{self, Config};
use lexrag::{search, server};

/// Question answering over legal documents.
#[derive(Parser)]
#[command(
    name = "lexrag",
    about = "Chunk legal documents by chapter and article, and retrieve the passages relevant to a question",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a document and list its chunks.
    Chunks {
        /// A `.pdf` or `.txt` file.
        file: PathBuf,
    },

    /// Rank a document's chunks against a query.
    ///
    /// Builds a one-off index over the document, embeds the query with the
    /// configured provider, and prints the best-matching chunks with their
    /// citation labels.
    Search {
        /// A `.pdf` or `.txt` file.
        file: PathBuf,

        /// The question or search text.
        query: String,

        /// Number of chunks to return. Defaults to `retrieval.default_top_k`,
        /// capped at `retrieval.max_top_k`.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the full chunk text instead of an excerpt.
        #[arg(long)]
        full: bool,
    },

    /// Start the JSON HTTP server on `server.bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lexrag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Chunks { file } => {
            search::run_chunks(&cfg, &file)?;
        }
        Commands::Search {
            file,
            query,
            top_k,
            full,
        } => {
            search::run_search(&cfg, &file, &query, top_k, full).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
