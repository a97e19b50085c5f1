//! TOML configuration parsing and validation.
//!
//! Only `[store]` is required; every other table falls back to defaults so
//! a minimal file is enough for lexical search. Validation is eager: a
//! [`Config`] returned by [`load_config`] has passed [`Config::validate`],
//! and provider/backend constructors re-check the parts they consume.
//!
//! ```toml
//! [store]
//! path = "./data/documents"
//!
//! [vector_store]
//! type = "postgres"
//! uri = "postgres://localhost/library"
//!
//! [embedding]
//! provider = "openai"
//!
//! [completion]
//! provider = "anthropic"
//!
//! [context]
//! similarity_threshold = 0.75
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use context_library_core::vector::VectorBackend;
use context_library_core::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding one `<id>.json` file per document.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// `memory`, `postgres`, or `mongodb`.
    #[serde(rename = "type", default = "default_vector_type")]
    pub kind: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            kind: default_vector_type(),
            uri: None,
            database: None,
            collection: default_collection(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_vector_type() -> String {
    "memory".to_string()
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_dimensions() -> usize {
    1536
}

impl VectorStoreConfig {
    /// Parse the backend type and check the fields it requires.
    ///
    /// | Type | Required |
    /// |------|----------|
    /// | `memory` | — |
    /// | `postgres` | `uri` |
    /// | `mongodb` | `uri`, `database` |
    pub fn validate(&self) -> Result<VectorBackend> {
        let backend = VectorBackend::from_str(&self.kind)?;
        match backend {
            VectorBackend::Memory => {}
            VectorBackend::Postgres => {
                require(&self.uri, "vector_store.uri", backend)?;
            }
            VectorBackend::MongoDb => {
                require(&self.uri, "vector_store.uri", backend)?;
                require(&self.database, "vector_store.database", backend)?;
            }
        }
        if backend != VectorBackend::Memory {
            if self.collection.trim().is_empty() {
                return Err(Error::Configuration(
                    "vector_store.collection must not be empty".into(),
                ));
            }
            if self.dimensions == 0 {
                return Err(Error::Configuration(
                    "vector_store.dimensions must be > 0".into(),
                ));
            }
        }
        Ok(backend)
    }
}

fn require(field: &Option<String>, name: &str, backend: VectorBackend) -> Result<()> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::Configuration(format!(
            "{} is required when vector_store.type is '{}'",
            name, backend
        ))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai`, `ollama`, or `local`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Defaults per provider (see [`crate::embedding`]).
    #[serde(default)]
    pub model: Option<String>,
    /// Falls back to `OPENAI_API_KEY` for the OpenAI provider.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            api_key: None,
            url: None,
            dims: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Vector length this configuration will produce, when known up front.
    pub fn resolved_dims(&self) -> Option<usize> {
        self.dims
            .or_else(|| crate::embedding::default_dims(&self.provider, self.model.as_deref()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `openai`, `anthropic`, or `ollama`.
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Falls back to `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: None,
            api_key: None,
            url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> String {
    "anthropic".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_completion_timeout_secs() -> u64 {
    60
}

/// Tuning for the context-assembly service.
#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// How many results to request from the vector store.
    #[serde(default = "default_max_context_docs")]
    pub max_context_docs: usize,
    /// Results scoring below this are dropped.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Estimated-token budget for the context block.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Messages kept in the per-conversation history.
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    /// Deadline for each embedding, retrieval, and completion call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_docs: default_max_context_docs(),
            similarity_threshold: default_similarity_threshold(),
            max_context_tokens: default_max_context_tokens(),
            memory_size: default_memory_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_context_docs() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_max_context_tokens() -> usize {
    2000
}
fn default_memory_size() -> usize {
    10
}
fn default_request_timeout_secs() -> u64 {
    60
}

impl ContextConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_context_docs == 0 {
            return Err(Error::Configuration(
                "context.max_context_docs must be >= 1".into(),
            ));
        }
        if self.max_context_tokens == 0 {
            return Err(Error::Configuration(
                "context.max_context_tokens must be >= 1".into(),
            ));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(Error::Configuration(
                "context.similarity_threshold must be a finite number".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "context.request_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Check every section. Provider credentials are checked later, when
    /// the provider is constructed, since lexical-only use needs none.
    pub fn validate(&self) -> Result<()> {
        if self.store.path.as_os_str().is_empty() {
            return Err(Error::Configuration("store.path must not be empty".into()));
        }
        let backend = self.vector_store.validate()?;
        self.context.validate()?;

        match self.embedding.provider.as_str() {
            "openai" | "ollama" | "local" => {}
            other => {
                return Err(Error::Configuration(format!(
                    "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
                    other
                )))
            }
        }
        match self.completion.provider.as_str() {
            "openai" | "anthropic" | "ollama" => {}
            other => {
                return Err(Error::Configuration(format!(
                    "Unknown completion provider: '{}'. Must be openai, anthropic, or ollama.",
                    other
                )))
            }
        }

        if backend != VectorBackend::Memory {
            if let Some(dims) = self.embedding.resolved_dims() {
                if dims != self.vector_store.dimensions {
                    return Err(Error::Configuration(format!(
                        "vector_store.dimensions is {} but the {} embedding provider produces {}",
                        self.vector_store.dimensions, self.embedding.provider, dims
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Read, parse, and validate a TOML configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[store]\npath = \"./data\"\n").unwrap();
        assert_eq!(config.vector_store.kind, "memory");
        assert_eq!(config.vector_store.collection, "documents");
        assert_eq!(config.vector_store.dimensions, 1536);
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.completion.provider, "anthropic");
        assert_eq!(config.completion.max_tokens, 2000);
        assert_eq!(config.context.max_context_docs, 5);
        assert_eq!(config.context.memory_size, 10);
    }

    #[test]
    fn test_unknown_vector_store_type() {
        let err = parse_config("[store]\npath = \"d\"\n[vector_store]\ntype = \"unknown\"\n")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_postgres_requires_uri() {
        let cfg = VectorStoreConfig {
            kind: "postgres".into(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("vector_store.uri"));
    }

    #[test]
    fn test_mongodb_requires_database() {
        let cfg = VectorStoreConfig {
            kind: "mongodb".into(),
            uri: Some("mongodb://localhost:27017".into()),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("vector_store.database"));

        let cfg = VectorStoreConfig {
            database: Some("library".into()),
            ..cfg
        };
        assert_eq!(cfg.validate().unwrap(), VectorBackend::MongoDb);
    }

    #[test]
    fn test_store_dimensions_must_match_embedding() {
        let base = "[store]\npath = \"d\"\n\
                    [vector_store]\ntype = \"postgres\"\nuri = \"postgres://localhost/db\"\n";

        let err = parse_config(&format!("{}[embedding]\nprovider = \"ollama\"\n", base))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("vector_store.dimensions"));

        let ok = parse_config(&format!(
            "{}dimensions = 768\n[embedding]\nprovider = \"ollama\"\n",
            base
        ))
        .unwrap();
        assert_eq!(ok.embedding.resolved_dims(), Some(768));

        let err = parse_config(&format!(
            "{}[embedding]\nprovider = \"openai\"\ndims = 3072\n",
            base
        ))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_memory_store_ignores_dimensions() {
        let config = parse_config(
            "[store]\npath = \"d\"\n[vector_store]\ndimensions = 1536\n\
             [embedding]\nprovider = \"ollama\"\n",
        )
        .unwrap();
        assert_eq!(config.vector_store.kind, "memory");
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let err = parse_config("[store]\npath = \"d\"\n[embedding]\nprovider = \"magic\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding provider"));

        let err = parse_config("[store]\npath = \"d\"\n[completion]\nprovider = \"magic\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("completion provider"));
    }

    #[test]
    fn test_context_bounds() {
        let err = parse_config("[store]\npath = \"d\"\n[context]\nmax_context_tokens = 0\n")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_store_section() {
        assert!(matches!(parse_config(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
