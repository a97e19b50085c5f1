//! Vector store abstraction for embedding-based retrieval.
//!
//! A [`VectorStore`] holds immutable [`VectorRecord`]s and answers
//! similarity queries with [`SearchResult`]s ordered highest score first.
//! The scale of the score is backend-defined: the in-memory store uses
//! cosine similarity in `[-1, 1]`, networked engines return their native
//! score.
//!
//! Backends are chosen once, at construction, from a configured
//! [`VectorBackend`]; callers only ever see `dyn VectorStore`.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stored document with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record ID. Leave empty to let the store assign one.
    #[serde(default)]
    pub id: String,
    pub content: String,
    /// Where the content came from (file name, library document ID, URL).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn new(content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            source: String::new(),
            metadata: serde_json::Map::new(),
            embedding,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A retrieved record paired with its similarity score (higher is closer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record: VectorRecord,
    pub score: f32,
}

/// What to search with.
#[derive(Debug, Clone, Copy)]
pub enum VectorQuery<'a> {
    /// A pre-computed query embedding.
    Embedding(&'a [f32]),
    /// Raw query text, for backends that embed or score text themselves.
    Text(&'a str),
}

/// Storage backend for vector records with similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors (e.g. `"memory"`).
    fn backend(&self) -> &str;

    /// Insert records. Returns their IDs in input order, store-assigned
    /// where the record ID was empty.
    async fn insert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>>;

    /// Return at most `limit` results ordered by descending score.
    async fn search(&self, query: VectorQuery<'_>, limit: usize) -> Result<Vec<SearchResult>>;

    /// Release the backend's resources.
    async fn close(&self) -> Result<()>;
}

/// The closed set of vector store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Memory,
    Postgres,
    MongoDb,
}

impl VectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Memory => "memory",
            VectorBackend::Postgres => "postgres",
            VectorBackend::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(VectorBackend::Memory),
            "postgres" => Ok(VectorBackend::Postgres),
            "mongodb" => Ok(VectorBackend::MongoDb),
            other => Err(Error::Configuration(format!(
                "Unknown vector store type: '{}'. Must be memory, postgres, or mongodb.",
                other
            ))),
        }
    }
}
