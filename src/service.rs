//! Retrieval-augmented answering over the vector store.
//!
//! [`ContextService`] ties an [`EmbeddingProvider`], a [`VectorStore`], and a
//! [`CompletionProvider`] together:
//!
//! ```text
//! message ─▶ embed ─▶ vector search ─▶ filter by similarity
//!                                          │
//!        answer ◀─ complete ◀─ build prompt ◀─ budget by tokens
//! ```
//!
//! The three network stages share one deadline. When it passes, the
//! in-flight future is dropped (aborting its request) and the call fails
//! with a stage-tagged [`Error::BackendUnavailable`]. Filtering, budgeting,
//! and prompt building cannot fail; an empty context still reaches the
//! completion provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use context_library_core::completion::CompletionProvider;
use context_library_core::context::{
    budget_by_tokens, build_prompt, filter_by_similarity, TokenEstimator, WordCountEstimator,
};
use context_library_core::embedding::EmbeddingProvider;
use context_library_core::history::{MessageHistory, Role};
use context_library_core::vector::{SearchResult, VectorQuery, VectorStore};
use context_library_core::{Error, Result, Stage};

use crate::config::ContextConfig;

/// A document that contributed to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub content: String,
    /// The record's source label, or its id when it has none.
    pub reference: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub sources: Vec<Source>,
    /// Estimated token cost of the context block.
    pub tokens_used: usize,
}

impl From<&SearchResult> for Source {
    fn from(r: &SearchResult) -> Self {
        let reference = if r.record.source.is_empty() {
            r.record.id.clone()
        } else {
            r.record.source.clone()
        };
        Self {
            content: r.record.content.clone(),
            reference,
            similarity: r.score,
        }
    }
}

pub struct ContextService {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    estimator: Box<dyn TokenEstimator>,
    max_context_docs: usize,
    similarity_threshold: f32,
    max_context_tokens: usize,
    request_timeout: Duration,
    history: MessageHistory,
}

impl ContextService {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        config: &ContextConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vector_store,
            embedder,
            completion,
            estimator: Box::new(WordCountEstimator),
            max_context_docs: config.max_context_docs,
            similarity_threshold: config.similarity_threshold,
            max_context_tokens: config.max_context_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            history: MessageHistory::new(config.memory_size),
        })
    }

    /// Replace the default [`WordCountEstimator`].
    pub fn with_estimator(mut self, estimator: Box<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Answer `message` within the configured request timeout.
    pub async fn process_message(&mut self, message: &str) -> Result<ChatResponse> {
        let deadline = Instant::now() + self.request_timeout;
        self.process_message_with_deadline(message, deadline).await
    }

    /// Answer `message`, failing once `deadline` passes.
    pub async fn process_message_with_deadline(
        &mut self,
        message: &str,
        deadline: Instant,
    ) -> Result<ChatResponse> {
        if message.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".into()));
        }

        let embedding = bounded(
            deadline,
            Stage::Embedding,
            self.embedder.model_name(),
            self.embedder.embed(message),
        )
        .await?;

        let results = bounded(
            deadline,
            Stage::Retrieval,
            self.vector_store.backend(),
            self.vector_store
                .search(VectorQuery::Embedding(&embedding), self.max_context_docs),
        )
        .await?;
        let retrieved = results.len();

        let relevant = filter_by_similarity(results, self.similarity_threshold);
        let context = budget_by_tokens(relevant, self.max_context_tokens, self.estimator.as_ref());
        debug!(
            retrieved,
            used = context.documents.len(),
            tokens = context.tokens_used,
            "context assembled"
        );

        let prompt = build_prompt(&context.documents, message);
        let answer = bounded(
            deadline,
            Stage::Completion,
            self.completion.model_name(),
            self.completion.complete(&prompt),
        )
        .await?;

        self.history.push(Role::User, message);
        self.history.push(Role::Assistant, answer.clone());
        info!(
            sources = context.documents.len(),
            tokens = context.tokens_used,
            "message answered"
        );

        Ok(ChatResponse {
            message: answer,
            sources: context.documents.iter().map(Source::from).collect(),
            tokens_used: context.tokens_used,
        })
    }
}

/// Run one network stage under the request deadline, tagging any failure.
async fn bounded<T>(
    deadline: Instant,
    stage: Stage,
    backend: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout_at(deadline, fut).await {
        Ok(result) => result.map_err(|e| e.at_stage(stage)),
        Err(_) => Err(Error::backend(backend, format!("{} timed out", stage)).at_stage(stage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_library_core::vector::memory::MemoryVectorStore;
    use context_library_core::vector::VectorRecord;
    use std::sync::Mutex;

    /// Embeds every text to the same unit vector.
    struct ConstEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::backend("failing", "connection refused"))
        }
    }

    /// Records prompts and echoes a fixed answer.
    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for RecordingCompletion {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("answer".to_string())
        }
    }

    struct SlowCompletion;

    #[async_trait]
    impl CompletionProvider for SlowCompletion {
        fn model_name(&self) -> &str {
            "slow"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    /// Records whose cosine against `[1, 0]` equals the given score.
    async fn store_with(scored: &[(&str, f32)]) -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        let records = scored
            .iter()
            .map(|(content, score)| {
                let y = (1.0 - score * score).sqrt();
                VectorRecord::new(*content, vec![*score, y]).with_source(format!("{}.md", content))
            })
            .collect();
        store.insert(records).await.unwrap();
        store
    }

    fn config() -> ContextConfig {
        ContextConfig {
            similarity_threshold: 0.8,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_filters_orders_and_prompts() {
        let store = store_with(&[("alpha", 0.9), ("beta", 0.75), ("gamma", 0.95)]).await;
        let completion = Arc::new(RecordingCompletion::default());
        let mut service = ContextService::new(
            store,
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            completion.clone(),
            &config(),
        )
        .unwrap();

        let response = service.process_message("which?").await.unwrap();
        assert_eq!(response.message, "answer");
        let refs: Vec<&str> = response.sources.iter().map(|s| s.reference.as_str()).collect();
        assert_eq!(refs, vec!["gamma.md", "alpha.md"]);
        assert_eq!(response.tokens_used, 2);

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0], "Context:\ngamma\nalpha\nQuestion: which?");
    }

    #[tokio::test]
    async fn test_budget_stops_at_first_overflow() {
        let store = store_with(&[("one two three", 0.99), ("four five six", 0.95), ("seven", 0.9)])
            .await;
        let mut service = ContextService::new(
            store,
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            Arc::new(RecordingCompletion::default()),
            &ContextConfig {
                max_context_tokens: 4,
                ..config()
            },
        )
        .unwrap();

        let response = service.process_message("q").await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.tokens_used, 3);
    }

    #[tokio::test]
    async fn test_empty_context_still_completes() {
        let completion = Arc::new(RecordingCompletion::default());
        let mut service = ContextService::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            completion.clone(),
            &config(),
        )
        .unwrap();

        let response = service.process_message("anyone?").await.unwrap();
        assert!(response.sources.is_empty());
        assert_eq!(response.tokens_used, 0);
        assert_eq!(
            completion.prompts.lock().unwrap()[0],
            "Context:\n\nQuestion: anyone?"
        );
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let completion = Arc::new(RecordingCompletion::default());
        let mut service = ContextService::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            completion.clone(),
            &config(),
        )
        .unwrap();
        assert!(matches!(
            service.process_message("  ").await,
            Err(Error::Validation(_))
        ));
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_stage_tagged() {
        let mut service = ContextService::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(FailingEmbedder),
            Arc::new(RecordingCompletion::default()),
            &config(),
        )
        .unwrap();
        let err = service.process_message("q").await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Embedding));
        assert!(service.history().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_completion() {
        let mut service = ContextService::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            Arc::new(SlowCompletion),
            &config(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_millis(50);
        let err = service
            .process_message_with_deadline("q", deadline)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Completion));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_history_records_exchange() {
        let mut service = ContextService::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ConstEmbedder(vec![1.0, 0.0])),
            Arc::new(RecordingCompletion::default()),
            &ContextConfig {
                memory_size: 2,
                ..config()
            },
        )
        .unwrap();

        service.process_message("first").await.unwrap();
        service.process_message("second").await.unwrap();
        let entries: Vec<(Role, &str)> = service
            .history()
            .entries()
            .map(|e| (e.role, e.content.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![(Role::User, "second"), (Role::Assistant, "answer")]
        );
    }

    #[test]
    fn test_source_reference_falls_back_to_id() {
        let result = SearchResult {
            record: VectorRecord::new("text", vec![]).with_id("rec-1"),
            score: 0.5,
        };
        assert_eq!(Source::from(&result).reference, "rec-1");
    }
}
