//! Glimpse CLI - ingest screenshots and search them from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a directory of screenshots
//! glim ingest ~/Pictures/Screenshots
//!
//! # Search the corpus
//! glim search "quarterly revenue" -n 5
//! glim search "invoice" --mode keyword --json
//!
//! # Operator tooling
//! glim stats
//! glim status
//! glim regenerate 42
//! ```

mod config;
mod ingest;
mod output;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use glimpse_core::ingest::IngestPipeline;
use glimpse_core::model::OllamaClient;
use glimpse_core::search::{ImageId, SearchMode};
use glimpse_core::storage::{ImageStore, RedbImageStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Glimpse screenshot search CLI.
///
/// Ingests screenshots (text extraction + vision description + embeddings)
/// and serves hybrid semantic/keyword search over the corpus.
#[derive(Parser)]
#[command(name = "glim", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest screenshots from files or directories
    Ingest {
        /// Image files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Search the ingested corpus
    Search {
        /// Search query
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value = "12")]
        limit: usize,

        /// Retrieval mode
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: Mode,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show corpus statistics
    Stats,
    /// Regenerate the AI description of an ingested image
    Regenerate {
        /// Image id (as shown in search results)
        image_id: u64,
    },
    /// Report whether the inference endpoint is ready
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Semantic,
    Keyword,
    Hybrid,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Semantic => SearchMode::Semantic,
            Mode::Keyword => SearchMode::Keyword,
            Mode::Hybrid => SearchMode::Hybrid,
        }
    }
}

/// Builds the ingestion pipeline over the on-disk store and the configured
/// inference endpoint.
fn build_pipeline(data_dir: Option<&PathBuf>) -> Result<IngestPipeline<RedbImageStore>> {
    let store = config::open_store(data_dir)?;
    let client = Arc::new(config::model_client());
    let extractor = config::extractor(client.clone());
    Ok(IngestPipeline::new(store, extractor, client.clone(), client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Ingest { paths } => {
            let pipeline = build_pipeline(cli.data_dir.as_ref())?;
            ingest::run(&pipeline, &paths).await
        }
        Command::Search {
            query,
            limit,
            mode,
            json,
        } => {
            let results =
                search::execute_search(&query, mode.into(), limit, cli.data_dir.as_ref()).await?;
            let rendered = if json {
                output::format_json(&query, mode.into(), &results)
            } else {
                output::format_human(&query, &results)
            };
            println!("{}", rendered);
            Ok(())
        }
        Command::Stats => {
            let store = config::open_store(cli.data_dir.as_ref())?;
            println!("Corpus statistics:");
            println!("  Images:     {}", store.image_count().await?);
            println!("  OCR rows:   {}", store.ocr_count().await?);
            println!("  Embeddings: {}", store.embedding_count().await?);
            Ok(())
        }
        Command::Regenerate { image_id } => {
            let pipeline = build_pipeline(cli.data_dir.as_ref())?;
            pipeline
                .regenerate_description(ImageId::from_u64(image_id))
                .await?;
            println!("Description regenerated for image {}", image_id);
            Ok(())
        }
        Command::Status => {
            let client: OllamaClient = config::model_client();
            match client.list_models().await {
                Ok(models) => {
                    println!("Engine ready ({} model(s) available)", models.len());
                    for model in models {
                        println!("  - {}", model);
                    }
                    Ok(())
                }
                Err(e) => {
                    println!("Engine not ready: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
