//! Durable document storage abstraction.
//!
//! The [`DocumentStore`] trait is the persistence contract behind the
//! library: a flat key → content map. Backends must be safe for concurrent
//! use from multiple callers (each carries its own lock) and must report
//! every failure, keeping "not found" distinct from generic I/O errors.
//!
//! | Backend | Crate | Module |
//! |---------|-------|--------|
//! | In-memory | core | [`memory`] |
//! | Filesystem (one JSON file per document) | app | `context_library::fs_store` |

pub mod memory;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Abstract persistence backend for raw document content.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save`](DocumentStore::save) | Create or overwrite a document |
/// | [`load`](DocumentStore::load) | Read a document's content |
/// | [`delete`](DocumentStore::delete) | Remove a document |
/// | [`list`](DocumentStore::list) | Enumerate stored document IDs |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `content` under `id`, replacing any existing content.
    async fn save(&self, id: &str, content: &str) -> Result<()>;

    /// Load the content stored under `id`.
    ///
    /// Returns [`Error::NotFound`] if no such document exists.
    async fn load(&self, id: &str) -> Result<String>;

    /// Remove the document stored under `id`.
    ///
    /// Returns [`Error::NotFound`] if no such document exists.
    async fn delete(&self, id: &str) -> Result<()>;

    /// List all stored document IDs, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Reject IDs that are empty or could escape a flat namespace.
///
/// Applied by every backend so an ID means the same thing everywhere.
pub fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation("document id must not be empty".into()));
    }
    if id.contains('/') || id.contains('\\') || id == "." || id == ".." {
        return Err(Error::Validation(format!(
            "document id '{}' must not contain path separators",
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("notes-2024").is_ok());
        assert!(validate_id("a.b").is_ok());
        assert!(matches!(validate_id(""), Err(Error::Validation(_))));
        assert!(matches!(validate_id("  "), Err(Error::Validation(_))));
        assert!(matches!(validate_id("../etc"), Err(Error::Validation(_))));
        assert!(matches!(validate_id(".."), Err(Error::Validation(_))));
    }
}
