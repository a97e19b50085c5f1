//! Concrete [`EmbeddingProvider`] implementations.
//!
//! | `provider` | Type | Default model | Dims |
//! |------------|------|---------------|------|
//! | `openai` | [`OpenAIEmbedding`] | `text-embedding-ada-002` | 1536 |
//! | `ollama` | [`OllamaEmbedding`] | `nomic-embed-text` | 768 |
//! | `local` | `LocalEmbedding` (feature `local-embeddings`) | `all-minilm-l6-v2` | 384 |
//!
//! Use [`create_embedding_provider`] to build one from configuration. The
//! provider validates its settings up front (API key, model, dims); a bad
//! configuration fails here rather than on the first request.
//!
//! Each call is a single attempt bounded by `embedding.timeout_secs`. A
//! response whose vector length differs from [`EmbeddingProvider::dims`]
//! is rejected.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use context_library_core::embedding::EmbeddingProvider;
use context_library_core::{Error, Result};

use crate::config::EmbeddingConfig;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "text-embedding-ada-002";
const OPENAI_DIMS: usize = 1536;

const OLLAMA_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "nomic-embed-text";
const OLLAMA_DIMS: usize = 768;

const LOCAL_DIMS: usize = 384;

/// Vector length a provider produces when `embedding.dims` is unset, if it
/// is known without loading the model.
pub fn default_dims(provider: &str, model: Option<&str>) -> Option<usize> {
    match (provider, model) {
        ("openai", _) => Some(OPENAI_DIMS),
        ("ollama", _) => Some(OLLAMA_DIMS),
        ("local", None) => Some(LOCAL_DIMS),
        _ => None,
    }
}

fn check_dims(backend: &str, embedding: Vec<f32>, dims: usize) -> Result<Vec<f32>> {
    if embedding.len() != dims {
        return Err(Error::backend(
            backend,
            format!(
                "returned {} dimensions, expected {}",
                embedding.len(),
                dims
            ),
        ));
    }
    Ok(embedding)
}

// ============ OpenAI ============

/// Calls `POST {url}/embeddings`.
pub struct OpenAIEmbedding {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedding {
    const BACKEND: &'static str = "openai";

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = http::api_key(&config.api_key, "OPENAI_API_KEY", Self::BACKEND)?;
        Ok(Self {
            client: http::client(Self::BACKEND, config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_MODEL.to_string()),
            dims: config.dims.unwrap_or(OPENAI_DIMS),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .client
            .post(http::endpoint(&self.url, "/embeddings"))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }));
        let body = http::send_json(Self::BACKEND, request).await?;

        let embedding = body
            .pointer("/data/0/embedding")
            .and_then(http::parse_f32_array)
            .ok_or_else(|| {
                Error::backend(Self::BACKEND, "invalid response: missing data[0].embedding")
            })?;
        debug!(model = %self.model, chars = text.len(), "embedded text");
        check_dims(Self::BACKEND, embedding, self.dims)
    }
}

// ============ Ollama ============

/// Calls `POST {url}/api/embed` on a running Ollama instance.
pub struct OllamaEmbedding {
    client: Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedding {
    const BACKEND: &'static str = "ollama";

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(Self::BACKEND, config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_MODEL.to_string()),
            dims: config.dims.unwrap_or(OLLAMA_DIMS),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .client
            .post(http::endpoint(&self.url, "/api/embed"))
            .json(&json!({ "model": self.model, "input": text }));
        let body = http::send_json(Self::BACKEND, request).await?;

        let embedding = body
            .pointer("/embeddings/0")
            .and_then(http::parse_f32_array)
            .ok_or_else(|| {
                Error::backend(Self::BACKEND, "invalid response: missing embeddings[0]")
            })?;
        check_dims(Self::BACKEND, embedding, self.dims)
    }
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use context_library_core::embedding::EmbeddingProvider;
    use context_library_core::{Error, Result};

    use crate::config::EmbeddingConfig;

    const BACKEND: &str = "local";
    const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

    fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
        match name {
            "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, super::LOCAL_DIMS)),
            "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
            "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
            "multilingual-e5-small" => Ok((EmbeddingModel::MultilingualE5Small, 384)),
            other => Err(Error::Configuration(format!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small",
                other
            ))),
        }
    }

    /// In-process inference with fastembed. The model is downloaded and
    /// loaded on first use, then reused.
    pub struct LocalEmbedding {
        name: String,
        model: EmbeddingModel,
        dims: usize,
        loaded: Arc<Mutex<Option<TextEmbedding>>>,
    }

    impl LocalEmbedding {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let (model, native_dims) = resolve_model(&name)?;
            if let Some(dims) = config.dims {
                if dims != native_dims {
                    return Err(Error::Configuration(format!(
                        "embedding.dims is {} but {} produces {}",
                        dims, name, native_dims
                    )));
                }
            }
            Ok(Self {
                name,
                model,
                dims: native_dims,
                loaded: Arc::new(Mutex::new(None)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LocalEmbedding {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let loaded = self.loaded.clone();
            let model = self.model.clone();
            let name = self.name.clone();
            let text = text.to_string();

            tokio::task::spawn_blocking(move || {
                let mut guard = loaded
                    .lock()
                    .map_err(|_| Error::backend(BACKEND, "model lock poisoned"))?;
                if guard.is_none() {
                    info!(model = %name, "loading local embedding model");
                    let m = TextEmbedding::try_new(InitOptions::new(model)).map_err(|e| {
                        Error::backend(BACKEND, format!("failed to load model: {}", e))
                    })?;
                    *guard = Some(m);
                }
                let embedder = guard
                    .as_mut()
                    .ok_or_else(|| Error::backend(BACKEND, "model not loaded"))?;
                let mut out = embedder
                    .embed(vec![text], None)
                    .map_err(|e| Error::backend(BACKEND, format!("embedding failed: {}", e)))?;
                out.pop()
                    .ok_or_else(|| Error::backend(BACKEND, "model returned no embedding"))
            })
            .await
            .map_err(|e| Error::backend(BACKEND, format!("embedding task failed: {}", e)))?
        }

        async fn close(&self) -> Result<()> {
            if let Ok(mut guard) = self.loaded.lock() {
                guard.take();
            }
            Ok(())
        }
    }

}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedding;

/// Build the configured embedding provider.
///
/// # Errors
///
/// [`Error::Configuration`] for an unknown provider, a missing API key, or
/// `local` when the crate was built without the `local-embeddings` feature.
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAIEmbedding::new(config)?),
        "ollama" => Arc::new(OllamaEmbedding::new(config)?),
        #[cfg(feature = "local-embeddings")]
        "local" => Arc::new(LocalEmbedding::new(config)?),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => {
            return Err(Error::Configuration(
                "embedding provider 'local' requires building with the local-embeddings feature"
                    .into(),
            ))
        }
        other => {
            return Err(Error::Configuration(format!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
                other
            )))
        }
    };
    debug!(
        provider = %config.provider,
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding provider ready"
    );
    Ok(provider)
}
