//! Completion provider trait.
//!
//! A completion provider turns a prompt into generated text. There is no
//! streaming and no built-in retry: a failed call is returned to the caller
//! as-is. HTTP implementations live in the `context-library` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Prompt → generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
