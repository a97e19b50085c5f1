//! MongoDB Atlas [`VectorStore`] backend.
//!
//! Records are stored as documents `{_id, content, source, metadata,
//! embedding, created_at}` in the configured collection. Search runs an
//! Atlas `$vectorSearch` aggregation against the index named
//! [`VECTOR_INDEX`]; ranking and scores (`vectorSearchScore`) come from
//! the engine.
//!
//! # Prerequisites
//!
//! An Atlas vector search index named `vector_index` on the `embedding`
//! path, with `numDimensions` matching the embedding provider and cosine
//! similarity.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::debug;
use uuid::Uuid;

use context_library_core::vector::{SearchResult, VectorQuery, VectorRecord, VectorStore};
use context_library_core::{Error, Result};

const BACKEND: &str = "mongodb";

/// Name of the Atlas vector search index queried by [`MongoVectorStore`].
pub const VECTOR_INDEX: &str = "vector_index";

/// Candidates examined per requested result.
const CANDIDATE_FACTOR: usize = 10;

/// Atlas rejects `numCandidates` (and `limit`) above this.
const MAX_CANDIDATES: usize = 10_000;

pub struct MongoVectorStore {
    client: Client,
    collection: Collection<BsonDocument>,
    dims: usize,
}

fn map_err(e: mongodb::error::Error) -> Error {
    Error::backend(BACKEND, e.to_string())
}

impl MongoVectorStore {
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        dims: usize,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await.map_err(map_err)?;
        options.connect_timeout = Some(connect_timeout);
        options.server_selection_timeout = Some(connect_timeout);
        let client = Client::with_options(options).map_err(map_err)?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await.map_err(map_err)?;
        debug!(database, collection, "connected to mongodb");

        Ok(Self {
            collection: db.collection(collection),
            client,
            dims,
        })
    }

    fn to_bson_document(id: &str, rec: &VectorRecord) -> Result<BsonDocument> {
        let metadata = bson::to_document(&rec.metadata)
            .map_err(|e| Error::Validation(format!("metadata is not representable: {}", e)))?;
        let embedding: Vec<f64> = rec.embedding.iter().map(|&x| x as f64).collect();
        Ok(doc! {
            "_id": id,
            "content": rec.content.clone(),
            "source": rec.source.clone(),
            "metadata": metadata,
            "embedding": embedding,
            "created_at": bson::DateTime::now(),
        })
    }

    fn from_bson_document(d: &BsonDocument) -> SearchResult {
        let metadata = match d.get_document("metadata") {
            Ok(m) => match Bson::Document(m.clone()).into_relaxed_extjson() {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
            Err(_) => serde_json::Map::new(),
        };
        let embedding = d
            .get_array("embedding")
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_f64().map(|x| x as f32))
                    .collect()
            })
            .unwrap_or_default();

        SearchResult {
            record: VectorRecord {
                id: d.get_str("_id").unwrap_or_default().to_string(),
                content: d.get_str("content").unwrap_or_default().to_string(),
                source: d.get_str("source").unwrap_or_default().to_string(),
                metadata,
                embedding,
            },
            score: d.get_f64("score").unwrap_or(0.0) as f32,
        }
    }
}

/// The `$vectorSearch` + `$project` pipeline for one query.
fn search_pipeline(embedding: &[f32], limit: usize) -> Vec<BsonDocument> {
    let query_vector: Vec<f64> = embedding.iter().map(|&x| x as f64).collect();
    let limit = limit.min(MAX_CANDIDATES);
    let num_candidates = limit.saturating_mul(CANDIDATE_FACTOR).min(MAX_CANDIDATES) as i64;
    let limit = limit as i64;
    vec![
        doc! {
            "$vectorSearch": {
                "index": VECTOR_INDEX,
                "path": "embedding",
                "queryVector": query_vector,
                "numCandidates": num_candidates,
                "limit": limit,
            }
        },
        doc! {
            "$project": {
                "content": 1,
                "source": 1,
                "metadata": 1,
                "embedding": 1,
                "score": { "$meta": "vectorSearchScore" },
            }
        },
    ]
}

#[async_trait]
impl VectorStore for MongoVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != self.dims) {
            return Err(Error::Validation(format!(
                "embedding has {} dimensions, store expects {}",
                bad.embedding.len(),
                self.dims
            )));
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut docs = Vec::with_capacity(records.len());
        for rec in &records {
            let id = if rec.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                rec.id.clone()
            };
            docs.push(Self::to_bson_document(&id, rec)?);
            ids.push(id);
        }

        self.collection.insert_many(docs).await.map_err(map_err)?;
        debug!(count = ids.len(), "inserted records into mongodb");
        Ok(ids)
    }

    async fn search(&self, query: VectorQuery<'_>, limit: usize) -> Result<Vec<SearchResult>> {
        let embedding = match query {
            VectorQuery::Embedding(e) => e,
            VectorQuery::Text(_) => {
                return Err(Error::Validation(
                    "mongodb vector store requires an embedding query".into(),
                ))
            }
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut cursor = self
            .collection
            .aggregate(search_pipeline(embedding, limit))
            .await
            .map_err(map_err)?;

        let mut results = Vec::new();
        while let Some(d) = cursor.try_next().await.map_err(map_err)? {
            results.push(Self::from_bson_document(&d));
        }
        Ok(results)
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pipeline_shape() {
        let pipeline = search_pipeline(&[0.5, 1.0], 3);
        let stage = pipeline[0].get_document("$vectorSearch").unwrap();
        assert_eq!(stage.get_str("index").unwrap(), VECTOR_INDEX);
        assert_eq!(stage.get_i64("limit").unwrap(), 3);
        assert_eq!(stage.get_i64("numCandidates").unwrap(), 30);
        assert_eq!(stage.get_array("queryVector").unwrap().len(), 2);

        let project = pipeline[1].get_document("$project").unwrap();
        assert!(project.contains_key("score"));
    }

    #[test]
    fn test_search_pipeline_caps_candidates() {
        let pipeline = search_pipeline(&[1.0], 5_000);
        let stage = pipeline[0].get_document("$vectorSearch").unwrap();
        assert_eq!(stage.get_i64("numCandidates").unwrap(), 10_000);
        assert_eq!(stage.get_i64("limit").unwrap(), 5_000);

        let pipeline = search_pipeline(&[1.0], usize::MAX);
        let stage = pipeline[0].get_document("$vectorSearch").unwrap();
        assert_eq!(stage.get_i64("numCandidates").unwrap(), 10_000);
        assert_eq!(stage.get_i64("limit").unwrap(), 10_000);
    }

    #[test]
    fn test_bson_roundtrip_preserves_record() {
        let rec = VectorRecord::new("hello", vec![0.5, -1.0])
            .with_source("a.md")
            .with_metadata("document_id", serde_json::json!("a"));
        let mut d = MongoVectorStore::to_bson_document("id-1", &rec).unwrap();
        d.insert("score", 0.87f64);

        let result = MongoVectorStore::from_bson_document(&d);
        assert_eq!(result.record.id, "id-1");
        assert_eq!(result.record.content, "hello");
        assert_eq!(result.record.source, "a.md");
        assert_eq!(result.record.embedding, vec![0.5, -1.0]);
        assert_eq!(result.record.metadata["document_id"], "a");
        assert!((result.score - 0.87).abs() < 1e-6);
    }
}
