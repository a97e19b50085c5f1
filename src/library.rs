//! The document library: in-memory lexical index over a durable store.
//!
//! [`Library`] owns a map of indexed [`Document`]s and delegates durability
//! to an injected [`DocumentStore`]. A single `tokio::sync::RwLock` guards
//! the map:
//!
//! - [`search`](Library::search), [`document_ids`](Library::document_ids),
//!   and [`snapshot`](Library::snapshot) take the read lock and run
//!   concurrently with each other.
//! - [`add_document`](Library::add_document),
//!   [`remove_document`](Library::remove_document), and
//!   [`load_all`](Library::load_all) take the write lock for their whole
//!   duration, including the store call.
//!
//! A document only becomes visible after the store has accepted it, and a
//! reader never observes a half-built document.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use context_library_core::document::{query_terms, Document};
use context_library_core::store::DocumentStore;
use context_library_core::{Error, Result};

pub struct Library {
    documents: RwLock<HashMap<String, Document>>,
    store: Arc<dyn DocumentStore>,
}

impl Library {
    /// An empty library backed by `store`. Call [`load_all`](Self::load_all)
    /// to index what the store already holds.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Persist `content` under `id`, then index it.
    ///
    /// If the store rejects the write, the in-memory index is left as it was.
    pub async fn add_document(&self, id: &str, content: &str) -> Result<()> {
        let doc = Document::new(content);

        let mut documents = self.documents.write().await;
        if let Err(e) = self.store.save(id, content).await {
            warn!(id, error = %e, "document not indexed: save failed");
            return Err(e);
        }
        documents.insert(id.to_string(), doc);
        debug!(id, "document added");
        Ok(())
    }

    /// Delete `id` from the store, then drop it from the index.
    pub async fn remove_document(&self, id: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        self.store.delete(id).await?;
        documents.remove(id);
        debug!(id, "document removed");
        Ok(())
    }

    /// Rebuild the index from every document in the store.
    ///
    /// All-or-nothing: if listing or any single load fails, the error is
    /// returned and the previous index is kept. On success the index holds
    /// exactly the stored documents. Returns the number loaded.
    pub async fn load_all(&self) -> Result<usize> {
        let mut documents = self.documents.write().await;

        let ids = self.store.list().await?;
        let mut loaded = HashMap::with_capacity(ids.len());
        for id in ids {
            let content = self.store.load(&id).await.map_err(|e| {
                warn!(id = %id, error = %e, "load aborted");
                e
            })?;
            loaded.insert(id, Document::new(content));
        }

        let count = loaded.len();
        *documents = loaded;
        info!(documents = count, "library loaded");
        Ok(count)
    }

    /// Lexical search: excerpts from every document containing all query terms.
    ///
    /// Terms are the lower-cased, whitespace-separated words of `query`.
    /// Excerpts keep their order within a document; the order across
    /// documents is unspecified. Nothing is ranked.
    pub async fn search(&self, query: &str) -> Result<Vec<String>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Err(Error::Validation("search query must not be empty".into()));
        }

        let documents = self.documents.read().await;
        let results: Vec<String> = documents
            .values()
            .filter(|doc| doc.matches_query(&terms))
            .flat_map(|doc| doc.relevant_excerpts(&terms))
            .collect();
        debug!(query, terms = terms.len(), excerpts = results.len(), "library search");
        Ok(results)
    }

    /// Indexed document IDs, sorted.
    pub async fn document_ids(&self) -> Vec<String> {
        let documents = self.documents.read().await;
        let mut ids: Vec<String> = documents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `(id, content)` of every indexed document, sorted by id.
    ///
    /// The copy lets callers do slow work (embedding, network I/O) without
    /// holding the library lock.
    pub async fn snapshot(&self) -> Vec<(String, String)> {
        let documents = self.documents.read().await;
        let mut docs: Vec<(String, String)> = documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.content().to_string()))
            .collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        docs
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}
