//! # Docshelf CLI (`docshelf`)
//!
//! Commands for database initialization, document registration, indexing,
//! one-shot question answering, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docshelf --config ./config/docshelf.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docshelf init` | Create the SQLite database and run schema migrations |
//! | `docshelf add <file>` | Copy a file into the storage root and register it |
//! | `docshelf ls` | List registered documents |
//! | `docshelf rm <id>` | Delete a document, its chunks, and its stored file |
//! | `docshelf index <id>` | Run one indexing pass synchronously |
//! | `docshelf ask <id> "<question>"` | Ask a question about a document |
//! | `docshelf serve` | Start the HTTP server |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use docshelf::config::{self, Config};
use docshelf::index::IndexOutcome;
use docshelf::locks::FileLocks;
use docshelf::models::Document;
use docshelf::provider::Provider;
use docshelf::{answer, db, extract, index, migrate, server, store};

/// Docshelf — office-document shelf with retrieval-augmented Q&A and
/// collaborative-editor revision sync.
#[derive(Parser)]
#[command(
    name = "docshelf",
    about = "Docshelf — document shelf with retrieval-augmented Q&A and editor revision sync",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docshelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Register an existing file: copy it into the storage root and insert
    /// the metadata record. Prints the new document id.
    Add {
        /// Path to the file to register.
        file: PathBuf,
    },

    /// List registered documents.
    Ls,

    /// Delete a document, its chunks, and its stored file.
    Rm {
        /// Document UUID.
        id: String,
    },

    /// Run one indexing pass for a document synchronously.
    Index {
        /// Document UUID.
        id: String,
        /// Provider name (groq, openai, gemini, grok).
        #[arg(long)]
        provider: Option<String>,
    },

    /// Ask a one-shot question about a document.
    Ask {
        /// Document UUID.
        id: String,
        /// The question to answer.
        question: String,
        /// Provider name (groq, openai, gemini, grok).
        #[arg(long)]
        provider: Option<String>,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { file } => {
            run_add(&cfg, &file).await?;
        }
        Commands::Ls => {
            run_ls(&cfg).await?;
        }
        Commands::Rm { id } => {
            run_rm(&cfg, &id).await?;
        }
        Commands::Index { id, provider } => {
            run_index(&cfg, &id, provider.as_deref()).await?;
        }
        Commands::Ask {
            id,
            question,
            provider,
        } => {
            run_ask(&cfg, &id, &question, provider.as_deref()).await?;
        }
        Commands::Serve => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "docshelf=info".into()),
                )
                .init();
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_add(cfg: &Config, file: &PathBuf) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unnamed".to_string());

    if !file.exists() {
        bail!("file not found: {}", file.display());
    }

    std::fs::create_dir_all(&cfg.storage.root)?;

    // Collision-free stored name; the original name stays on the record.
    let id = Uuid::new_v4().to_string();
    let stored_name = match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.clone(),
    };
    std::fs::copy(file, cfg.storage.root.join(&stored_name))?;

    let now = chrono::Utc::now().timestamp_millis();
    let doc = Document {
        id: id.clone(),
        filename: filename.clone(),
        path: stored_name,
        size: std::fs::metadata(file)?.len() as i64,
        mime_type: extract::media_type(&filename).to_string(),
        created_at: now,
        updated_at: now,
    };

    let pool = db::connect(cfg).await?;
    store::insert_document(&pool, &doc).await?;
    pool.close().await;

    println!("{}", id);
    Ok(())
}

async fn run_ls(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let docs = store::list_documents(&pool).await?;
    pool.close().await;

    for doc in docs {
        let updated = chrono::DateTime::from_timestamp_millis(doc.updated_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("{}  {:>10}  {}  {}", doc.id, doc.size, updated, doc.filename);
    }
    Ok(())
}

async fn run_rm(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let Some(doc) = store::find_document(&pool, id).await? else {
        pool.close().await;
        bail!("no document with id {}", id);
    };

    store::delete_document(&pool, id).await?;
    pool.close().await;

    let file_path = cfg.storage.root.join(&doc.path);
    if let Err(e) = std::fs::remove_file(&file_path) {
        eprintln!("Warning: failed to remove {}: {}", file_path.display(), e);
    }

    println!("Deleted {} ({})", id, doc.filename);
    Ok(())
}

async fn run_index(cfg: &Config, id: &str, provider: Option<&str>) -> Result<()> {
    let requested = provider.and_then(Provider::from_name);
    let pool = db::connect(cfg).await?;
    let locks = FileLocks::new();

    match index::index_document(cfg, &pool, &locks, id, requested).await {
        Ok(IndexOutcome::Indexed { chunks }) => {
            println!("index {}", id);
            println!("  chunks stored: {}", chunks);
        }
        Ok(IndexOutcome::Skipped { reason }) => {
            println!("index {}", id);
            println!("  skipped: {}", reason);
        }
        Err(e) => {
            eprintln!("Warning: indexing failed: {}", e);
        }
    }

    pool.close().await;
    Ok(())
}

async fn run_ask(cfg: &Config, id: &str, question: &str, provider: Option<&str>) -> Result<()> {
    let requested = provider.and_then(Provider::from_name);
    let pool = db::connect(cfg).await?;
    let locks = FileLocks::new();

    let result = answer::answer(cfg, &pool, &locks, id, question, requested).await?;
    pool.close().await;

    println!("{}", result.answer);
    println!();
    println!("provider: {}", result.provider);
    if !result.context.is_empty() {
        println!("context preview:");
        println!("{}", result.context);
    }
    Ok(())
}
