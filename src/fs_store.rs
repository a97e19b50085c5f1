//! Filesystem [`DocumentStore`]: one JSON file per document.
//!
//! Each document lives at `<dir>/<id>.json` with the body
//! `{"content": "<raw text>"}`. The directory is created when the store is
//! opened. Saves write a hidden temp file and rename it into place, so a
//! reader sees either the old document or the new one. A
//! `tokio::sync::RwLock` serializes writers against readers within the
//! process; concurrent `load`/`list` calls share the lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use context_library_core::store::{validate_id, DocumentStore};
use context_library_core::{Error, Result};

const EXTENSION: &str = "json";

/// On-disk envelope for a document.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    content: String,
}

pub struct FileDocumentStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl FileDocumentStore {
    /// Open (and create if absent) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened file document store");
        Ok(Self {
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }
}

fn not_found_or_io(err: std::io::Error, id: &str) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::NotFound(id.to_string())
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn save(&self, id: &str, content: &str) -> Result<()> {
        let path = self.path_for(id)?;
        let body = serde_json::to_vec(&StoredDocument {
            content: content.to_string(),
        })
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        // `<id>.json` is never observed half-written.
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", id, uuid::Uuid::new_v4().simple()));
        let _guard = self.lock.write().await;
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(e));
        }
        debug!(id, path = %path.display(), bytes = content.len(), "saved document");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<String> {
        let path = self.path_for(id)?;

        let _guard = self.lock.read().await;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, id))?;
        let doc: StoredDocument = serde_json::from_slice(&data).map_err(|e| Error::Decode {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        Ok(doc.content)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;

        let _guard = self.lock.write().await;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, id))?;
        debug!(id, "deleted document");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.read().await;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("docs");
        let store = FileDocumentStore::open(&dir).await.unwrap();
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        let content = "Line one.\n\t\"Quoted\" — ünïcödé. ";
        store.save("doc", content).await.unwrap();
        assert_eq!(store.load("doc").await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_file_format() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        store.save("a", "hello").await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("a.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "content": "hello" }));
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        store.save("a", "first").await.unwrap();
        store.save("a", "second").await.unwrap();

        assert_eq!(store.load("a").await.unwrap(), "second");
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }

    #[tokio::test]
    async fn test_save_replaces_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        std::fs::write(tmp.path().join("bad.json"), "{trunc").unwrap();
        store.save("bad", "fixed").await.unwrap();
        assert_eq!(store.load("bad").await.unwrap(), "fixed");
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        assert!(matches!(store.load("ghost").await, Err(Error::NotFound(id)) if id == "ghost"));
        assert!(matches!(store.delete("ghost").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        std::fs::write(tmp.path().join("bad.json"), "{not json").unwrap();
        assert!(matches!(store.load("bad").await, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn test_list_only_json_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        store.save("b", "2").await.unwrap();
        store.save("a", "1").await.unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(tmp.path().join("sub.json")).unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_rejects_path_ids() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::open(tmp.path()).await.unwrap();
        assert!(matches!(
            store.save("../escape", "x").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(FileDocumentStore::open(tmp.path()).await.unwrap());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(&format!("d{}", i), &format!("content {}", i)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 16);
        assert_eq!(store.load("d7").await.unwrap(), "content 7");
    }
}
