//! In-memory [`VectorStore`] implementation.
//!
//! Brute-force linear scan. Embedding queries are scored by cosine
//! similarity; text queries carry no vector to compare against, so every
//! record gets the placeholder score `1.0` and insertion order is kept.

use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{SearchResult, VectorQuery, VectorRecord, VectorStore};
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};

/// Score given to every record for [`VectorQuery::Text`] searches.
pub const TEXT_QUERY_SCORE: f32 = 1.0;

#[derive(Default)]
struct Inner {
    records: Vec<VectorRecord>,
    dims: Option<usize>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimensionality, fixed by the first non-empty insert.
    pub fn dims(&self) -> Option<usize> {
        self.inner.read().ok().and_then(|i| i.dims)
    }
}

fn poisoned() -> Error {
    Error::backend("memory", "vector store lock poisoned")
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        let mut dims = inner.dims;
        for rec in &records {
            if rec.embedding.is_empty() {
                return Err(Error::Validation("embedding must not be empty".into()));
            }
            match dims {
                None => dims = Some(rec.embedding.len()),
                Some(d) if d != rec.embedding.len() => {
                    return Err(Error::Validation(format!(
                        "embedding has {} dimensions, store expects {}",
                        rec.embedding.len(),
                        d
                    )));
                }
                Some(_) => {}
            }
        }
        inner.dims = dims;

        let mut ids = Vec::with_capacity(records.len());
        for mut rec in records {
            if rec.id.is_empty() {
                rec.id = Uuid::new_v4().to_string();
            }
            ids.push(rec.id.clone());
            inner.records.push(rec);
        }
        Ok(ids)
    }

    async fn search(&self, query: VectorQuery<'_>, limit: usize) -> Result<Vec<SearchResult>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;

        let mut results: Vec<SearchResult> = match query {
            VectorQuery::Embedding(query_vec) => {
                if let Some(d) = inner.dims {
                    if d != query_vec.len() {
                        return Err(Error::Validation(format!(
                            "query embedding has {} dimensions, store expects {}",
                            query_vec.len(),
                            d
                        )));
                    }
                }
                let mut scored: Vec<SearchResult> = inner
                    .records
                    .iter()
                    .map(|rec| SearchResult {
                        record: rec.clone(),
                        score: cosine_similarity(query_vec, &rec.embedding),
                    })
                    .collect();
                scored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                scored
            }
            VectorQuery::Text(_) => inner
                .records
                .iter()
                .map(|rec| SearchResult {
                    record: rec.clone(),
                    score: TEXT_QUERY_SCORE,
                })
                .collect(),
        };

        results.truncate(limit);
        Ok(results)
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.records.clear();
        inner.dims = None;
        Ok(())
    }
}
