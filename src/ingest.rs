//! Bulk indexing of library documents into a vector store.
//!
//! The library is copied with [`Library::snapshot`] first, so embedding
//! (slow, networked) never runs while the library lock is held. Each
//! document becomes one [`VectorRecord`] labelled `<source>:<id>` with
//! metadata `{"document_id": <id>}`; all records are inserted in a single
//! batch once every embedding has succeeded.

use serde_json::json;
use tracing::{debug, info};

use context_library_core::embedding::EmbeddingProvider;
use context_library_core::vector::{VectorRecord, VectorStore};
use context_library_core::{Result, Stage};

use crate::library::Library;

/// Embed every library document and insert it into `store`.
///
/// Returns the number of records inserted. Fails without inserting anything
/// if any embedding fails.
pub async fn index_library(
    library: &Library,
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    source: &str,
) -> Result<usize> {
    let documents = library.snapshot().await;
    if documents.is_empty() {
        info!("library is empty, nothing to index");
        return Ok(0);
    }

    let mut records = Vec::with_capacity(documents.len());
    for (id, content) in documents {
        let embedding = embedder
            .embed(&content)
            .await
            .map_err(|e| e.at_stage(Stage::Embedding))?;
        debug!(id = %id, dims = embedding.len(), "embedded document");
        records.push(
            VectorRecord::new(content, embedding)
                .with_source(format!("{}:{}", source, id))
                .with_metadata("document_id", json!(id)),
        );
    }

    let ids = store.insert(records).await?;
    info!(
        backend = store.backend(),
        model = embedder.model_name(),
        records = ids.len(),
        "library indexed"
    );
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_library_core::store::memory::MemoryDocumentStore;
    use context_library_core::vector::memory::MemoryVectorStore;
    use context_library_core::vector::VectorQuery;
    use context_library_core::Error;
    use std::sync::Arc;

    /// Two-dimensional embedding: `[len, 1]`.
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(Error::backend("length", "refused"));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    async fn library(docs: &[(&str, &str)]) -> Library {
        let lib = Library::new(Arc::new(MemoryDocumentStore::new()));
        for (id, content) in docs {
            lib.add_document(id, content).await.unwrap();
        }
        lib
    }

    #[tokio::test]
    async fn test_indexes_every_document() {
        let lib = library(&[("a", "first doc"), ("b", "second")]).await;
        let store = MemoryVectorStore::new();

        let n = index_library(&lib, &LengthEmbedder, &store, "library")
            .await
            .unwrap();
        assert_eq!(n, 2);

        let results = store.search(VectorQuery::Text("any"), 10).await.unwrap();
        let labels: Vec<&str> = results.iter().map(|r| r.record.source.as_str()).collect();
        assert_eq!(labels, vec!["library:a", "library:b"]);
        assert_eq!(results[0].record.metadata["document_id"], "a");
    }

    #[tokio::test]
    async fn test_embedding_failure_inserts_nothing() {
        let lib = library(&[("a", "fine"), ("b", "poison pill")]).await;
        let store = MemoryVectorStore::new();

        let err = index_library(&lib, &LengthEmbedder, &store, "library")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Embedding));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_library() {
        let lib = library(&[]).await;
        let store = MemoryVectorStore::new();
        assert_eq!(
            index_library(&lib, &LengthEmbedder, &store, "library")
                .await
                .unwrap(),
            0
        );
    }
}
