//! semqa CLI - build and query the QA retrieval store
//!
//! # Commands
//!
//! ```bash
//! # Show the QA pairs generated from a fact document
//! semqa corpus facts.json
//!
//! # Encode the corpus and persist a new store generation
//! semqa build facts.json
//!
//! # Answer a question from the persisted store
//! semqa ask "Where is GIKI?" -k 3
//!
//! # Show metadata of the current store
//! semqa info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use semqa_lib::{
    config::Config,
    corpus::{build_corpus, FactDocument},
    embed::FastEmbedEncoder,
    search::Retriever,
    store::EmbeddingStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semqa")]
#[command(about = "Semantic question answering over a fixed answer pool")]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults apply when it does not exist
    #[arg(long, env = "SEMQA_CONFIG", default_value = "semqa.toml")]
    config: PathBuf,

    /// Store directory, overrides the config file
    #[arg(long, env = "SEMQA_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the QA pairs generated from a fact document
    Corpus {
        /// Fact document (JSON)
        facts: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Encode the corpus and persist a new store generation
    Build {
        /// Fact document (JSON)
        facts: PathBuf,

        /// Questions per encoder call, overrides the config file
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Answer a question from the persisted store
    Ask {
        /// Question to answer
        query: String,

        /// Number of answers to return, overrides the config file
        #[arg(short, long)]
        k: Option<usize>,

        /// Show every ranked answer, even below the confidence threshold
        #[arg(short, long)]
        all: bool,
    },

    /// Show metadata of the current store
    Info,
}

fn load_encoder(config: &Config) -> Result<Arc<FastEmbedEncoder>> {
    println!("Loading {} (first run downloads the model)...", config.model);
    let encoder = FastEmbedEncoder::new(config.model).context("failed to load embedding model")?;
    Ok(Arc::new(encoder))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("failed to read config {}", cli.config.display()))?;
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }

    match cli.command {
        Commands::Corpus { facts, json } => {
            let doc = FactDocument::from_path(&facts)
                .with_context(|| format!("failed to read facts from {}", facts.display()))?;
            let pairs = build_corpus(&doc);

            if json {
                println!("{}", serde_json::to_string_pretty(&pairs)?);
            } else {
                println!("Generated {} QA pairs from '{}':\n", pairs.len(), facts.display());
                for (i, pair) in pairs.iter().enumerate() {
                    println!("#{} [{}] {}", i, pair.source, pair.question);
                    println!("    {}", pair.answer);
                }
            }
        }

        Commands::Build { facts, batch_size } => {
            let batch_size = batch_size.unwrap_or(config.batch_size);
            let doc = FactDocument::from_path(&facts)
                .with_context(|| format!("failed to read facts from {}", facts.display()))?;

            let retriever = Retriever::new(load_encoder(&config)?);
            let store = retriever
                .rebuild(&doc, &config.store_dir, batch_size)
                .context("rebuild failed; the previous store is unchanged")?;

            info!(store_dir = %config.store_dir.display(), "build finished");
            println!(
                "Stored {} QA pairs ({} dimensions) in '{}'",
                store.len(),
                store.dimension(),
                config.store_dir.display()
            );
        }

        Commands::Ask { query, k, all } => {
            let k = k.unwrap_or(config.top_k);

            let retriever = Retriever::new(load_encoder(&config)?);
            retriever.load(&config.store_dir).with_context(|| {
                format!(
                    "no usable store in '{}' (run `semqa build` first)",
                    config.store_dir.display()
                )
            })?;

            let results = retriever.answer(&query, k)?;
            let confident: Vec<_> = results
                .iter()
                .filter(|r| all || r.score >= config.min_score)
                .collect();

            if confident.is_empty() {
                println!("No confident answer for '{query}'.");
                if let Some(best) = results.first() {
                    println!("(best score {:.4} is below {:.2})", best.score, config.min_score);
                }
            } else {
                println!("\n=== Answers ===\n");
                for (i, result) in confident.iter().enumerate() {
                    println!("#{} (score: {:.4})", i + 1, result.score);
                    println!("{}\n", result.answer);
                }
            }
        }

        Commands::Info => {
            let meta = EmbeddingStore::read_metadata(&config.store_dir).with_context(|| {
                format!("no store in '{}'", config.store_dir.display())
            })?;

            println!("Store:      {}", config.store_dir.display());
            println!("Model:      {}", meta.model);
            println!("Entries:    {}", meta.count);
            println!("Dimensions: {}", meta.dimension);
            println!("Created:    {}", meta.created_at.to_rfc3339());
            println!("Schema:     v{}", meta.schema_version);
        }
    }

    Ok(())
}
