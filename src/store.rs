//! Key-value store of JSON documents.
//!
//! The game keeps a handful of named documents (`characters`, `game_state`,
//! `comments`). `JsonFileStore` maps each one to `<key>.json` inside a data
//! directory and replaces files atomically, so a crash mid-write leaves the
//! previous document in place.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Document holding the read-only character catalog
pub const CHARACTERS_DOC: &str = "characters";
/// Document holding the per-mode daily selection
pub const GAME_STATE_DOC: &str = "game_state";
/// Document holding the comment history
pub const COMMENTS_DOC: &str = "comments";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document key: {0}")]
    InvalidKey(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document. A document that was never saved is `None`.
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace a document as a single unit.
    async fn save(&self, key: &str, doc: &Value) -> Result<(), StoreError>;
}

/// Stores every document as a pretty-printed JSON file in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the data directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp_path = self.dir.join(format!(".{}.json.tmp", key));
        let bytes = serde_json::to_vec_pretty(doc)?;

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        tracing::debug!(key, bytes = bytes.len(), "Document saved");
        Ok(())
    }
}

/// In-memory store, used by tests and for throwaway servers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
    fail_writes: AtomicBool,
    /// Remaining forced failures per key
    failing_saves: std::sync::Mutex<HashMap<String, u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with documents
    pub fn with_docs(docs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            docs: RwLock::new(docs.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `times` saves of `key` fail; other keys are unaffected
    pub fn fail_next_saves(&self, key: &str, times: u32) {
        let mut failing = self.failing_saves.lock().unwrap_or_else(|p| p.into_inner());
        failing.insert(key.to_string(), times);
    }

    fn take_forced_failure(&self, key: &str) -> bool {
        let mut failing = self.failing_saves.lock().unwrap_or_else(|p| p.into_inner());
        match failing.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.take_forced_failure(key) {
            return Err(StoreError::Io(std::io::Error::other(
                "simulated write failure",
            )));
        }
        self.docs.write().await.insert(key.to_string(), doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_store_missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.load(COMMENTS_DOC).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_save_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store.save(COMMENTS_DOC, &json!([1, 2])).await.unwrap();
        store.save(COMMENTS_DOC, &json!([3])).await.unwrap();

        assert_eq!(store.load(COMMENTS_DOC).await.unwrap(), Some(json!([3])));
        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store
                .save(GAME_STATE_DOC, &json!({"classic": null}))
                .await
                .unwrap();
        }
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            store.load(GAME_STATE_DOC).await.unwrap(),
            Some(json!({"classic": null}))
        );
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("game_state.json"), "{not json").unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.load(GAME_STATE_DOC).await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.save("../escape", &json!(1)).await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_failing_writes_keep_old_value() {
        let store = MemoryStore::new();
        store.save("doc", &json!(1)).await.unwrap();
        store.set_fail_writes(true);
        assert!(store.save("doc", &json!(2)).await.is_err());
        assert_eq!(store.load("doc").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_memory_store_forced_failures_are_per_key() {
        let store = MemoryStore::new();
        store.fail_next_saves(COMMENTS_DOC, 1);

        assert!(store.save(GAME_STATE_DOC, &json!({})).await.is_ok());
        assert!(store.save(COMMENTS_DOC, &json!([])).await.is_err());
        assert!(store.save(COMMENTS_DOC, &json!([])).await.is_ok());
    }
}
