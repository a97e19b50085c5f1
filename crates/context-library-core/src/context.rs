//! Context assembly: similarity filtering, token budgeting, prompt building.
//!
//! These are the pure steps between vector retrieval and the completion
//! call. None of them can fail; an empty context is a valid outcome.
//!
//! # Algorithm
//!
//! 1. [`filter_by_similarity`]: drop results scoring below the threshold,
//!    then order the rest highest score first.
//! 2. [`budget_by_tokens`]: accumulate results in rank order until the next
//!    one would push the estimated token cost over the budget. That result
//!    and everything ranked after it is dropped; no document is truncated.
//! 3. [`build_prompt`]: `"Context:\n" + contents joined by "\n" +
//!    "\nQuestion: " + message`.
//!
//! # Example
//!
//! ```rust
//! use context_library_core::context::{budget_by_tokens, build_prompt, WordCountEstimator};
//! use context_library_core::vector::{SearchResult, VectorRecord};
//!
//! let results = vec![
//!     SearchResult { record: VectorRecord::new("one two three", vec![]), score: 0.9 },
//!     SearchResult { record: VectorRecord::new("four five", vec![]), score: 0.8 },
//! ];
//! let ctx = budget_by_tokens(results, 4, &WordCountEstimator);
//! assert_eq!(ctx.documents.len(), 1);
//! assert_eq!(ctx.tokens_used, 3);
//! assert_eq!(build_prompt(&ctx.documents, "q?"), "Context:\none two three\nQuestion: q?");
//! ```

use crate::vector::SearchResult;

/// Estimates how many model tokens a piece of text costs.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Counts whitespace-delimited words.
///
/// This is a crude stand-in for a real tokenizer. Swap in the completion
/// model's tokenizer for accurate budgets; the budgeting algorithm does not
/// change.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountEstimator;

impl TokenEstimator for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Results that fit the token budget, in rank order.
#[derive(Debug, Clone, Default)]
pub struct BudgetedContext {
    pub documents: Vec<SearchResult>,
    /// Estimated cost of all included documents.
    pub tokens_used: usize,
}

/// Keep results scoring at least `threshold`, ordered highest score first.
///
/// The sort is stable, so equal scores keep their retrieval order.
pub fn filter_by_similarity(results: Vec<SearchResult>, threshold: f32) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| r.score >= threshold)
        .collect();
    kept.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept
}

/// Greedily take results in order while the cumulative estimate stays within `budget`.
pub fn budget_by_tokens(
    results: Vec<SearchResult>,
    budget: usize,
    estimator: &dyn TokenEstimator,
) -> BudgetedContext {
    let mut ctx = BudgetedContext::default();
    for result in results {
        let cost = estimator.estimate(&result.record.content);
        if ctx.tokens_used + cost > budget {
            break;
        }
        ctx.tokens_used += cost;
        ctx.documents.push(result);
    }
    ctx
}

/// Compose the completion prompt from the budgeted documents and the user message.
pub fn build_prompt(documents: &[SearchResult], message: &str) -> String {
    let context = documents
        .iter()
        .map(|r| r.record.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("Context:\n{}\nQuestion: {}", context, message)
}
