//! # PDF QA CLI (`pdfqa`)
//!
//! The `pdfqa` binary is the primary interface for the service. It provides
//! commands for database initialization, PDF upload, document management,
//! question answering, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! pdfqa --config ./config/pdfqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfqa init` | Create the SQLite database and run schema migrations |
//! | `pdfqa upload <path>` | Upload a PDF from the local filesystem |
//! | `pdfqa list` | List all uploaded documents |
//! | `pdfqa get <id>` | Show a document and its question history |
//! | `pdfqa delete <id>` | Delete a document, its file, and its questions |
//! | `pdfqa ask <id> "<question>"` | Ask a question about a document |
//! | `pdfqa questions <id>` | List the questions asked about a document |
//! | `pdfqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! pdfqa init --config ./config/pdfqa.toml
//!
//! # Upload a PDF
//! pdfqa upload ./reports/annual-2024.pdf
//!
//! # Ask a question (requires embedding and completion providers)
//! pdfqa ask 7c9e6679-7425-40de-944b-e07fc1f90ae7 "What was revenue in Q3?"
//!
//! # Start the HTTP API
//! pdfqa serve
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfqa::completion::create_completer;
use pdfqa::config::{load_config, Config};
use pdfqa::db;
use pdfqa::embedding::create_embedder;
use pdfqa::engine::{QaEngine, QaError};
use pdfqa::extract::PdfExtractor;
use pdfqa::migrate;
use pdfqa::models::format_ts_iso;
use pdfqa::server;
use pdfqa::store::{SqliteStore, Store};
use pdfqa::upload::{remove_stored_file, Uploader};

/// PDF question-answering service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pdfqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pdfqa",
    about = "Upload PDFs and ask questions about their contents",
    version,
    long_about = "pdfqa stores uploaded PDF documents, splits their text into \
    overlapping chunks, embeds the chunks with a configurable provider, and answers \
    natural-language questions grounded in the most relevant passages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents/questions tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Upload a PDF from the local filesystem.
    ///
    /// Validates and stores the file, extracts its text to derive a title,
    /// and records the document. Prints the new document id.
    Upload {
        /// Path to the PDF file.
        path: PathBuf,
    },

    /// List all uploaded documents, newest first.
    List,

    /// Show a document's metadata and question history.
    Get {
        /// Document UUID.
        id: String,
    },

    /// Delete a document.
    ///
    /// Removes the database record, the question history, the stored PDF
    /// file, and any cached index.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Ask a question about a document.
    ///
    /// Requires embedding and completion providers in the configuration.
    /// The answer is persisted to the question history before printing.
    Ask {
        /// Document UUID.
        id: String,
        /// The question to ask.
        question: String,
    },

    /// List the questions asked about a document, oldest first.
    Questions {
        /// Document UUID.
        id: String,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// JSON API endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { path } => {
            run_upload(&cfg, &path).await?;
        }
        Commands::List => {
            run_list(&cfg).await?;
        }
        Commands::Get { id } => {
            run_get(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            run_delete(&cfg, &id).await?;
        }
        Commands::Ask { id, question } => {
            run_ask(&cfg, &id, &question).await?;
        }
        Commands::Questions { id } => {
            run_questions(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> Result<Arc<dyn Store>> {
    let pool = db::connect(cfg).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

async fn run_upload(cfg: &Config, path: &Path) -> Result<()> {
    let filename = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => bail!("not a file path: {}", path.display()),
    };
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;

    let store = open_store(cfg).await?;
    let uploader = Uploader::new(store, Arc::new(PdfExtractor), cfg.storage.clone());
    let document = uploader.upload(&filename, bytes).await?;

    println!("Uploaded: {}", document.title);
    println!("  id:       {}", document.id);
    println!("  filename: {}", document.filename);
    println!("  stored:   {}", document.filepath);
    Ok(())
}

async fn run_list(cfg: &Config) -> Result<()> {
    let store = open_store(cfg).await?;
    let documents = store.list_documents().await?;

    if documents.is_empty() {
        println!("No documents uploaded yet.");
        return Ok(());
    }
    for doc in &documents {
        println!(
            "{}  {}  {}",
            doc.id,
            format_ts_iso(doc.uploaded_at),
            doc.title
        );
    }
    println!("\n{} document(s)", documents.len());
    Ok(())
}

async fn run_get(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    let document = match store.find_document(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };
    let questions = store.list_questions(id).await?;

    println!("id:       {}", document.id);
    println!("title:    {}", document.title);
    println!("filename: {}", document.filename);
    println!("stored:   {}", document.filepath);
    println!("uploaded: {}", format_ts_iso(document.uploaded_at));
    println!("\n{} question(s)", questions.len());
    for record in &questions {
        println!("\n[{}] Q: {}", format_ts_iso(record.created_at), record.question);
        println!("A: {}", record.answer);
    }
    Ok(())
}

async fn run_delete(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    let document = match store.delete_document(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };
    remove_stored_file(Path::new(&document.filepath));
    println!("Deleted: {} ({})", document.title, document.id);
    Ok(())
}

async fn run_ask(cfg: &Config, id: &str, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let store = open_store(cfg).await?;
    let embedder = create_embedder(&cfg.embedding)?;
    let completer = create_completer(&cfg.completion)?;
    let engine = QaEngine::new(
        store,
        Arc::new(PdfExtractor),
        embedder,
        completer,
        cfg.chunking.clone(),
        &cfg.retrieval,
        &cfg.embedding,
    );

    match engine.answer(id, question).await {
        Ok(record) => {
            println!("{}", record.answer);
            Ok(())
        }
        // The answer was computed but could not be saved; show it anyway.
        Err(QaError::Persistence { answer, cause, .. }) => {
            println!("{}", answer);
            eprintln!("warning: answer was not saved to history: {}", cause);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_questions(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    if store.find_document(id).await?.is_none() {
        bail!("document not found: {}", id);
    }
    let questions = store.list_questions(id).await?;

    if questions.is_empty() {
        println!("No questions asked yet.");
        return Ok(());
    }
    for record in &questions {
        println!("[{}] Q: {}", format_ts_iso(record.created_at), record.question);
        println!("A: {}\n", record.answer);
    }
    Ok(())
}
