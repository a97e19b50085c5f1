//! # Context Library CLI (`ctxlib`)
//!
//! ## Usage
//!
//! ```bash
//! ctxlib --config ./config/ctxlib.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxlib add <id> [text]` | Store and index a document (text or `--file`) |
//! | `ctxlib remove <id>` | Delete a document |
//! | `ctxlib list` | List stored document IDs |
//! | `ctxlib search "<query>"` | Lexical search, prints matching sentences |
//! | `ctxlib index` | Embed every document into the configured vector store |
//! | `ctxlib ask "<message>"` | Answer a question from retrieved context |
//!
//! Logs go to stderr. Set `RUST_LOG` (e.g. `RUST_LOG=context_library=debug`)
//! or pass `--verbose` to see them.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use context_library::completion::create_completion_provider;
use context_library::config::{self, Config};
use context_library::embedding::create_embedding_provider;
use context_library::fs_store::FileDocumentStore;
use context_library::ingest::index_library;
use context_library::library::Library;
use context_library::service::{ChatResponse, ContextService};
use context_library::vector_store::{check_dimensions, create_vector_store};
use context_library_core::completion::CompletionProvider;
use context_library_core::embedding::EmbeddingProvider;
use context_library_core::store::DocumentStore;
use context_library_core::vector::{VectorBackend, VectorStore};

/// Label recorded on vector records produced by `index` and `ask`.
const INDEX_SOURCE: &str = "library";

/// Context Library CLI: store documents, search them, and answer questions
/// from retrieved context.
#[derive(Parser)]
#[command(
    name = "ctxlib",
    about = "Context Library: a document library with lexical search and retrieval-augmented answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ctxlib.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a document and add it to the index.
    ///
    /// An existing document with the same ID is replaced.
    Add {
        /// Document ID (also the file name in the store directory).
        id: String,

        /// Document text. Omit to read from `--file`.
        text: Option<String>,

        /// Read the document text from this file.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Delete a document from the store.
    Remove { id: String },

    /// List stored document IDs.
    List,

    /// Lexical search: sentences from documents containing every query word.
    Search { query: String },

    /// Embed every document into the configured vector store.
    Index,

    /// Answer a question using documents retrieved from the vector store.
    ///
    /// With the in-memory vector store the library is indexed first, since
    /// nothing persists between runs.
    Ask {
        message: String,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

async fn open_store(config: &Config) -> Result<Arc<FileDocumentStore>> {
    let store = FileDocumentStore::open(&config.store.path)
        .await
        .with_context(|| format!("opening store at {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

/// Library with every stored document indexed. Only commands that read the
/// index need this; add, remove and list work on single files.
async fn load_library(store: Arc<FileDocumentStore>) -> Result<Library> {
    let library = Library::new(store);
    library.load_all().await?;
    Ok(library)
}

/// Release backend connections, then hand back `result`. A close failure is
/// only logged; it never replaces the command's own outcome.
async fn close_backends<T>(
    result: Result<T>,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
) -> Result<T> {
    if let Err(e) = store.close().await {
        warn!(backend = store.backend(), error = %e, "vector store close failed");
    }
    if let Err(e) = embedder.close().await {
        warn!(model = embedder.model_name(), error = %e, "embedding provider close failed");
    }
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load_config(&cli.config)?;
    let documents = open_store(&config).await?;

    match cli.command {
        Commands::Add { id, text, file } => {
            let content = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("provide the document text or --file"),
            };
            Library::new(documents).add_document(&id, &content).await?;
            println!("added {}", id);
        }
        Commands::Remove { id } => {
            Library::new(documents).remove_document(&id).await?;
            println!("removed {}", id);
        }
        Commands::List => {
            for id in documents.list().await? {
                println!("{}", id);
            }
        }
        Commands::Search { query } => {
            let library = load_library(documents).await?;
            let excerpts = library.search(&query).await?;
            if excerpts.is_empty() {
                println!("No results.");
            }
            for excerpt in excerpts {
                println!("{}", excerpt);
            }
        }
        Commands::Index => {
            let library = load_library(documents).await?;
            let embedder = create_embedding_provider(&config.embedding)?;
            check_dimensions(&config.vector_store, embedder.dims())?;
            let timeout = Duration::from_secs(config.context.request_timeout_secs);
            let store = create_vector_store(&config.vector_store, timeout).await?;
            if store.backend() == VectorBackend::Memory.as_str() {
                warn!("memory vector store does not persist; the index is discarded on exit");
            }

            let result = index_library(&library, embedder.as_ref(), store.as_ref(), INDEX_SOURCE)
                .await
                .map_err(anyhow::Error::from);
            let count = close_backends(result, store.as_ref(), embedder.as_ref()).await?;

            println!("index {}", store.backend());
            println!("  documents: {}", library.len().await);
            println!("  records inserted: {}", count);
        }
        Commands::Ask { message, json } => {
            let library = load_library(documents).await?;
            let embedder = create_embedding_provider(&config.embedding)?;
            check_dimensions(&config.vector_store, embedder.dims())?;
            let completion = create_completion_provider(&config.completion)?;
            let timeout = Duration::from_secs(config.context.request_timeout_secs);
            let store = create_vector_store(&config.vector_store, timeout).await?;

            let result = answer(
                &library,
                store.clone(),
                embedder.clone(),
                completion,
                &config,
                &message,
            )
            .await;
            let response = close_backends(result, store.as_ref(), embedder.as_ref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.message);
                if !response.sources.is_empty() {
                    println!();
                    println!("Sources:");
                    for source in &response.sources {
                        println!("  [{:.3}] {}", source.similarity, source.reference);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn answer(
    library: &Library,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    config: &Config,
    message: &str,
) -> Result<ChatResponse> {
    if store.backend() == VectorBackend::Memory.as_str() {
        index_library(library, embedder.as_ref(), store.as_ref(), INDEX_SOURCE).await?;
    }
    let mut service = ContextService::new(store, embedder, completion, &config.context)?;
    Ok(service.process_message(message).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_library_core::vector::{SearchResult, VectorQuery, VectorRecord};

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn insert(
            &self,
            _records: Vec<VectorRecord>,
        ) -> context_library_core::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn search(
            &self,
            _query: VectorQuery<'_>,
            _limit: usize,
        ) -> context_library_core::Result<Vec<SearchResult>> {
            Ok(Vec::new())
        }
        async fn close(&self) -> context_library_core::Result<()> {
            Err(context_library_core::Error::backend("broken", "connection reset"))
        }
        fn backend(&self) -> &str {
            "broken"
        }
    }

    struct NoopEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NoopEmbedder {
        fn model_name(&self) -> &str {
            "noop"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _text: &str) -> context_library_core::Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[tokio::test]
    async fn test_close_failure_keeps_command_error() {
        let result: Result<()> = Err(anyhow::anyhow!("embedding request failed"));
        let err = close_backends(result, &BrokenStore, &NoopEmbedder)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "embedding request failed");
    }

    #[tokio::test]
    async fn test_close_failure_keeps_command_success() {
        let count = close_backends(Ok(3), &BrokenStore, &NoopEmbedder)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
