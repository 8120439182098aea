//! Flat-File Store
//!
//! One JSON array per collection under a data directory. Unreadable or
//! corrupt files degrade to an empty collection; every write rewrites the
//! whole file.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Collection, FileIndex, FileRecord, ListStore, RemoveTarget};
use crate::error::{BotError, BotResult};

const FILES_FILE: &str = "files.json";

pub struct JsonFileStore {
    dir: PathBuf,
    /// Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    fn files_path(&self) -> PathBuf {
        self.dir.join(FILES_FILE)
    }

    async fn read_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str(&json) {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring corrupt store file {:?}: {}", path, e);
                Vec::new()
            }
        }
    }

    async fn write_array<T: Serialize>(path: &Path, items: &[T]) -> BotResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(BotError::backend)?;
        }

        let json = serde_json::to_string_pretty(items).map_err(BotError::backend)?;
        fs::write(path, json).await.map_err(BotError::backend)?;
        debug!("Wrote {} entries to {:?}", items.len(), path);
        Ok(())
    }
}

#[async_trait]
impl ListStore for JsonFileStore {
    async fn add(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.collection_path(collection);

        let mut entries: Vec<String> = Self::read_array(&path).await;
        entries.push(entry.to_string());
        Self::write_array(&path, &entries).await
    }

    async fn list(&self, collection: Collection) -> BotResult<Vec<String>> {
        Ok(Self::read_array(&self.collection_path(collection)).await)
    }

    async fn remove(&self, collection: Collection, entry: &str) -> BotResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.collection_path(collection);

        let mut entries: Vec<String> = Self::read_array(&path).await;
        match RemoveTarget::parse(entry) {
            RemoveTarget::All => {
                if entries.is_empty() && !fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(());
                }
                entries.clear();
            }
            RemoveTarget::Exact(text) => match entries.iter().position(|e| e == text) {
                Some(idx) => {
                    entries.remove(idx);
                }
                None => return Ok(()),
            },
        }

        Self::write_array(&path, &entries).await
    }
}

#[async_trait]
impl FileIndex for JsonFileStore {
    async fn save(&self, record: FileRecord) -> BotResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.files_path();

        let mut records: Vec<FileRecord> = Self::read_array(&path).await;
        records.push(record);
        Self::write_array(&path, &records).await
    }

    async fn find(&self, keyword: &str) -> BotResult<Vec<FileRecord>> {
        let records: Vec<FileRecord> = Self::read_array(&self.files_path()).await;
        Ok(records.into_iter().filter(|r| r.matches(keyword)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_and_corrupt_files_read_empty() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        assert!(store.list(Collection::Cart).await.unwrap().is_empty());

        std::fs::write(store.collection_path(Collection::Notes), "{ not json").unwrap();
        assert!(store.list(Collection::Notes).await.unwrap().is_empty());

        // A corrupt file is replaced by the next write
        store.add(Collection::Notes, "call mum").await.unwrap();
        assert_eq!(store.list(Collection::Notes).await.unwrap(), vec!["call mum"]);
    }

    #[tokio::test]
    async fn test_write_creates_parent_directory() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("data"));

        store.add(Collection::Meals, "tacos").await.unwrap();

        let raw = std::fs::read_to_string(store.collection_path(Collection::Meals)).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec!["tacos"]);
    }

    #[tokio::test]
    async fn test_clear_on_missing_file_does_not_create_it() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        store.remove(Collection::Cart, "all").await.unwrap();
        assert!(!store.collection_path(Collection::Cart).exists());
    }

    #[tokio::test]
    async fn test_remove_oldest_duplicate() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        for item in ["eggs", "milk", "bread", "milk"] {
            store.add(Collection::Cart, item).await.unwrap();
        }
        store.remove(Collection::Cart, "milk").await.unwrap();

        assert_eq!(store.list(Collection::Cart).await.unwrap(), vec!["eggs", "bread", "milk"]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let temp_dir = tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::new(temp_dir.path()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add(Collection::Cart, &format!("item {}", i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list(Collection::Cart).await.unwrap().len(), 10);
    }
}
