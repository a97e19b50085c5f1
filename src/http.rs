//! Shared plumbing for the HTTP-backed embedding and completion providers.
//!
//! Every transport failure, non-2xx status, or undecodable body becomes
//! [`Error::BackendUnavailable`] tagged with the provider name. Nothing is
//! retried here; callers bound each request with the client timeout and
//! the service deadline.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use context_library_core::{Error, Result};

/// A client whose every request is bounded by `timeout_secs`.
pub fn client(backend: &str, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::backend(backend, format!("failed to build HTTP client: {}", e)))
}

/// Send a prepared request and decode a JSON response body.
pub async fn send_json(backend: &str, request: RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::backend(backend, format!("request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(backend, %status, "provider returned error status");
        return Err(Error::backend(
            backend,
            format!("API error {}: {}", status, body),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::backend(backend, format!("invalid response body: {}", e)))
}

/// `base` with any trailing slash removed, joined to `path`.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// The configured key, else the named environment variable.
pub fn api_key(configured: &Option<String>, env_var: &str, backend: &str) -> Result<String> {
    if let Some(key) = configured.as_ref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.clone());
    }
    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            Error::Configuration(format!(
                "{} provider needs an api_key or the {} environment variable",
                backend, env_var
            ))
        })
}

/// Read a JSON array of numbers as `f32`s.
pub fn parse_f32_array(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|x| x as f32))
        .collect()
}
