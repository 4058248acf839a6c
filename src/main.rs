//! # Ragstore CLI (`rag`)
//!
//! The `rag` binary drives the retrieval subsystem from the command line:
//! index initialization, document ingestion, context queries, and status.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the index directory and empty artifacts |
//! | `rag ingest <file> --doc-id <n>` | Extract, chunk, embed, and store one document |
//! | `rag query "<text>" [--k N]` | Print the assembled context for a query |
//! | `rag status` | Show record count and artifact location |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragstore::config::load_config;
use ragstore::engine::RetrievalEngine;

/// Ragstore — a document ingestion and vector retrieval engine for prompt
/// augmentation.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Ragstore — document ingestion and vector retrieval for prompt augmentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index directory and empty artifacts.
    ///
    /// Idempotent: an existing, consistent index is left untouched.
    Init,

    /// Ingest a document file into the vector index.
    Ingest {
        /// Path to the document (plain text, PDF, or DOCX — detected by content).
        file: PathBuf,
        /// Identifier of the owning document record.
        #[arg(long)]
        doc_id: i64,
    },

    /// Retrieve context for a query and print it.
    Query {
        /// Query text.
        text: String,
        /// Number of nearest chunks to assemble (defaults to the configured value).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Show index statistics.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let engine = RetrievalEngine::open(config)?;
            engine.persist().await?;
            println!("ok");
        }
        Commands::Ingest { file, doc_id } => {
            let engine = RetrievalEngine::open(config)?;
            if engine.ingest(doc_id, &file).await {
                println!("ingested {} (doc_id={})", file.display(), doc_id);
                println!("records: {}", engine.record_count().await);
            } else {
                println!("ingestion failed or document was empty: {}", file.display());
                std::process::exit(1);
            }
        }
        Commands::Query { text, k } => {
            let engine = RetrievalEngine::open(config)?;
            let context = match k {
                Some(k) => engine.retrieve_context(&text, k).await?,
                None => engine.retrieve_context_default(&text).await?,
            };
            if context.is_empty() {
                println!("No context.");
            } else {
                println!("{}", context);
            }
        }
        Commands::Status => {
            let dir = config.index.dir.clone();
            let engine = RetrievalEngine::open(config)?;
            println!("index dir: {}", dir.display());
            println!("records: {}", engine.record_count().await);
        }
    }

    Ok(())
}
