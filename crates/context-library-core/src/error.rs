//! Error types shared by every Context Library component.

use std::fmt;

use thiserror::Error;

/// The pipeline stage of a context-assembly request that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Turning the user message into a query embedding.
    Embedding,
    /// Searching the vector store.
    Retrieval,
    /// Dropping results below the similarity threshold.
    Filtering,
    /// Calling the completion provider.
    Completion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Retrieval => "retrieval",
            Stage::Filtering => "filtering",
            Stage::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in library, store, and provider operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing settings, detected when a component is constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested document ID does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The persistence backend failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document exists but could not be decoded.
    #[error("Decode error for document '{id}': {message}")]
    Decode {
        /// The document that failed to decode.
        id: String,
        /// A description of the failure.
        message: String,
    },

    /// A network backend was unreachable, timed out, or returned a protocol failure.
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Empty or invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A context-assembly stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: Stage,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Shorthand for [`Error::BackendUnavailable`].
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with the stage it occurred in.
    pub fn at_stage(self, stage: Stage) -> Self {
        Error::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The failed stage, if this error was raised by the context-assembly service.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A convenience result type for Context Library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapper_names_stage() {
        let err = Error::backend("openai", "connection refused").at_stage(Stage::Completion);
        assert_eq!(err.stage(), Some(Stage::Completion));
        assert_eq!(
            err.to_string(),
            "completion stage failed: Backend unavailable (openai): connection refused"
        );
    }

    #[test]
    fn test_plain_error_has_no_stage() {
        assert_eq!(Error::NotFound("a".into()).stage(), None);
    }
}
