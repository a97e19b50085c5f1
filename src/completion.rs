//! Concrete [`CompletionProvider`] implementations.
//!
//! | `provider` | Type | Endpoint | Default model |
//! |------------|------|----------|---------------|
//! | `openai` | [`OpenAICompletion`] | `POST {url}/chat/completions` | `gpt-4o-mini` |
//! | `anthropic` | [`AnthropicCompletion`] | `POST {url}/messages` | `claude-3-sonnet-20240229` |
//! | `ollama` | [`OllamaCompletion`] | `POST {url}/api/generate` | `llama3` |
//!
//! The prompt is sent as a single user message. Responses are read whole;
//! there is no streaming and no retry.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use context_library_core::completion::CompletionProvider;
use context_library_core::{Error, Result};

use crate::config::CompletionConfig;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const OLLAMA_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "llama3";

/// Settings shared by every HTTP completion backend.
struct Common {
    client: Client,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl Common {
    fn new(config: &CompletionConfig, backend: &str, url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(backend, config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| url.to_string()),
            model: config.model.clone().unwrap_or_else(|| model.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

fn extract_text(backend: &str, body: &Value, pointer: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::backend(backend, format!("invalid response: missing {}", pointer)))
}

// ============ OpenAI ============

pub struct OpenAICompletion {
    common: Common,
    api_key: String,
}

impl OpenAICompletion {
    const BACKEND: &'static str = "openai";

    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            api_key: http::api_key(&config.api_key, "OPENAI_API_KEY", Self::BACKEND)?,
            common: Common::new(config, Self::BACKEND, OPENAI_URL, OPENAI_MODEL)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletion {
    fn model_name(&self) -> &str {
        &self.common.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let c = &self.common;
        let request = c
            .client
            .post(http::endpoint(&c.url, "/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": c.model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": c.max_tokens,
                "temperature": c.temperature,
            }));
        let body = http::send_json(Self::BACKEND, request).await?;
        extract_text(Self::BACKEND, &body, "/choices/0/message/content")
    }
}

// ============ Anthropic ============

pub struct AnthropicCompletion {
    common: Common,
    api_key: String,
}

impl AnthropicCompletion {
    const BACKEND: &'static str = "anthropic";

    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            api_key: http::api_key(&config.api_key, "ANTHROPIC_API_KEY", Self::BACKEND)?,
            common: Common::new(config, Self::BACKEND, ANTHROPIC_URL, ANTHROPIC_MODEL)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicCompletion {
    fn model_name(&self) -> &str {
        &self.common.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let c = &self.common;
        let request = c
            .client
            .post(http::endpoint(&c.url, "/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": c.model,
                "max_tokens": c.max_tokens,
                "temperature": c.temperature,
                "messages": [{ "role": "user", "content": prompt }],
            }));
        let body = http::send_json(Self::BACKEND, request).await?;

        // The answer may be split over several text blocks.
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::backend(Self::BACKEND, "invalid response: missing content"))?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        debug!(model = %c.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

// ============ Ollama ============

pub struct OllamaCompletion {
    common: Common,
}

impl OllamaCompletion {
    const BACKEND: &'static str = "ollama";

    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            common: Common::new(config, Self::BACKEND, OLLAMA_URL, OLLAMA_MODEL)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    fn model_name(&self) -> &str {
        &self.common.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let c = &self.common;
        let request = c
            .client
            .post(http::endpoint(&c.url, "/api/generate"))
            .json(&json!({
                "model": c.model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": c.temperature,
                    "num_predict": c.max_tokens,
                },
            }));
        let body = http::send_json(Self::BACKEND, request).await?;
        extract_text(Self::BACKEND, &body, "/response")
    }
}

/// Build the configured completion provider.
pub fn create_completion_provider(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAICompletion::new(config)?),
        "anthropic" => Arc::new(AnthropicCompletion::new(config)?),
        "ollama" => Arc::new(OllamaCompletion::new(config)?),
        other => {
            return Err(Error::Configuration(format!(
                "Unknown completion provider: '{}'. Must be openai, anthropic, or ollama.",
                other
            )))
        }
    };
    debug!(provider = %config.provider, model = provider.model_name(), "completion provider ready");
    Ok(provider)
}
