//! Vector store construction from configuration.
//!
//! | `type` | Backend | Module |
//! |--------|---------|--------|
//! | `memory` | [`MemoryVectorStore`] | `context_library_core::vector::memory` |
//! | `postgres` | [`PgVectorStore`] | [`crate::vector_pg`] |
//! | `mongodb` | [`MongoVectorStore`] | [`crate::vector_mongo`] |
//!
//! The configuration is validated before any connection is attempted, so an
//! unknown type or a missing field fails here and never at query time.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use context_library_core::vector::memory::MemoryVectorStore;
use context_library_core::vector::{VectorBackend, VectorStore};
use context_library_core::{Error, Result};

use crate::config::VectorStoreConfig;
use crate::vector_mongo::MongoVectorStore;
use crate::vector_pg::PgVectorStore;

/// Build the configured vector store.
pub async fn create_vector_store(
    config: &VectorStoreConfig,
    connect_timeout: Duration,
) -> Result<Arc<dyn VectorStore>> {
    let backend = config.validate()?;
    let store: Arc<dyn VectorStore> = match backend {
        VectorBackend::Memory => Arc::new(MemoryVectorStore::new()),
        VectorBackend::Postgres => Arc::new(
            PgVectorStore::connect(
                config.uri.as_deref().unwrap_or_default(),
                &config.collection,
                config.dimensions,
                connect_timeout,
            )
            .await?,
        ),
        VectorBackend::MongoDb => Arc::new(
            MongoVectorStore::connect(
                config.uri.as_deref().unwrap_or_default(),
                config.database.as_deref().unwrap_or_default(),
                &config.collection,
                config.dimensions,
                connect_timeout,
            )
            .await?,
        ),
    };
    info!(backend = %backend, "vector store ready");
    Ok(store)
}

/// Check that an embedder's output fits the configured backend. Persistent
/// backends have a fixed column or index width; the memory store adopts
/// whatever arrives first.
pub fn check_dimensions(config: &VectorStoreConfig, embedding_dims: usize) -> Result<()> {
    let backend = config.validate()?;
    if backend != VectorBackend::Memory && embedding_dims != config.dimensions {
        return Err(Error::Configuration(format!(
            "vector_store.dimensions is {} but the embedding provider produces {}",
            config.dimensions, embedding_dims
        )));
    }
    Ok(())
}
