//! PostgreSQL + pgvector [`VectorStore`] backend.
//!
//! Records live in one table per collection with columns `id`, `content`,
//! `source`, `metadata` (jsonb), `embedding` (`vector(dims)`), and
//! `created_at`. Ranking is delegated to pgvector's cosine distance
//! operator `<=>`; the reported score is `1 - distance`.
//!
//! # Prerequisites
//!
//! PostgreSQL with the `vector` extension available. The extension and the
//! table are created on connect if missing.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use context_library_core::vector::{SearchResult, VectorQuery, VectorRecord, VectorStore};
use context_library_core::{Error, Result};

const BACKEND: &str = "postgres";

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dims: usize,
}

fn map_err(e: sqlx::Error) -> Error {
    Error::backend(BACKEND, e.to_string())
}

/// Collection names become table names, so only `[A-Za-z0-9_]` survives.
fn table_name(collection: &str) -> Result<String> {
    let sanitized: String = collection
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        return Err(Error::Configuration(
            "vector_store.collection is empty after sanitization".into(),
        ));
    }
    Ok(format!("library_{}", sanitized))
}

/// pgvector text literal: `[1,2,3]`.
fn vector_literal(v: &[f32]) -> String {
    format!(
        "[{}]",
        v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
    )
}

fn parse_vector_literal(s: &str) -> Vec<f32> {
    s.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter_map(|x| x.trim().parse::<f32>().ok())
        .collect()
}

impl PgVectorStore {
    /// Connect and make sure the extension and collection table exist.
    pub async fn connect(
        uri: &str,
        collection: &str,
        dims: usize,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let table = table_name(collection)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(connect_timeout)
            .connect(uri)
            .await
            .map_err(map_err)?;

        let store = Self { pool, table, dims };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                id TEXT PRIMARY KEY, \
                content TEXT NOT NULL, \
                source TEXT NOT NULL DEFAULT '', \
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                embedding vector({dims}) NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()\
            )",
            table = self.table,
            dims = self.dims
        );
        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        debug!(table = %self.table, dims = self.dims, "pgvector table ready");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
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

        let insert_sql = format!(
            "INSERT INTO {} (id, content, source, metadata, embedding) \
             VALUES ($1, $2, $3, $4::jsonb, $5::vector)",
            self.table
        );

        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let mut ids = Vec::with_capacity(records.len());
        for rec in &records {
            let id = if rec.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                rec.id.clone()
            };
            let metadata = serde_json::Value::Object(rec.metadata.clone()).to_string();
            sqlx::query(&insert_sql)
                .bind(&id)
                .bind(&rec.content)
                .bind(&rec.source)
                .bind(&metadata)
                .bind(vector_literal(&rec.embedding))
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            ids.push(id);
        }
        tx.commit().await.map_err(map_err)?;

        debug!(table = %self.table, count = ids.len(), "inserted records");
        Ok(ids)
    }

    async fn search(&self, query: VectorQuery<'_>, limit: usize) -> Result<Vec<SearchResult>> {
        let embedding = match query {
            VectorQuery::Embedding(e) => e,
            VectorQuery::Text(_) => {
                return Err(Error::Validation(
                    "postgres vector store requires an embedding query".into(),
                ))
            }
        };
        if embedding.len() != self.dims {
            return Err(Error::Validation(format!(
                "query embedding has {} dimensions, store expects {}",
                embedding.len(),
                self.dims
            )));
        }

        let search_sql = format!(
            "SELECT id, content, source, metadata, embedding::text AS embedding, \
                    1 - (embedding <=> $1::vector) AS score \
             FROM {} \
             ORDER BY embedding <=> $1::vector \
             LIMIT $2",
            self.table
        );

        let rows = sqlx::query(&search_sql)
            .bind(vector_literal(embedding))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata = match row.try_get::<serde_json::Value, _>("metadata").map_err(map_err)? {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            let embedding_text: String = row.try_get("embedding").map_err(map_err)?;
            let score: f64 = row.try_get("score").map_err(map_err)?;
            results.push(SearchResult {
                record: VectorRecord {
                    id: row.try_get("id").map_err(map_err)?,
                    content: row.try_get("content").map_err(map_err)?,
                    source: row.try_get("source").map_err(map_err)?,
                    metadata,
                    embedding: parse_vector_literal(&embedding_text),
                },
                score: score as f32,
            });
        }
        Ok(results)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
