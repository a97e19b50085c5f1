//! In-memory [`DocumentStore`] implementation for tests and ephemeral use.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Nothing survives the process.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{validate_id, DocumentStore};
use crate::error::{Error, Result};

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Io(std::io::Error::other("memory store lock poisoned"))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, id: &str, content: &str) -> Result<()> {
        validate_id(id)?;
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.insert(id.to_string(), content.to_string());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<String> {
        validate_id(id)?;
        let docs = self.docs.read().map_err(|_| poisoned())?;
        docs.get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        let mut ids: Vec<String> = docs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
