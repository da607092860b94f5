//! JSON file watermark store.
//!
//! All topics share one file. Every write is a read-modify-write of the whole
//! file, serialised by a lock and committed with a temp-file rename so a crash
//! never leaves a half-written file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{TopicWatermark, Watermark, WatermarkUpdate};
use crate::storage::WatermarkStore;

type WatermarkMap = BTreeMap<String, Watermark>;

/// Local filesystem watermark store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the file at `path`; the file is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn load(&self) -> Result<WatermarkMap> {
        match self.read_bytes().await? {
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(WatermarkMap::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::store(format!("corrupt watermark file {:?}: {e}", self.path))
            }),
            None => Ok(WatermarkMap::new()),
        }
    }

    /// Write the map atomically (write to temp, then rename).
    async fn save(&self, marks: &WatermarkMap) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(marks)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for JsonFileStore {
    async fn read(&self, topic_key: &str) -> Result<Option<Watermark>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(topic_key).copied())
    }

    async fn write(&self, topic_key: &str, update: WatermarkUpdate) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut marks = self.load().await?;
        marks
            .entry(topic_key.to_string())
            .or_default()
            .set(update.field, update.value);
        self.save(&marks).await?;
        log::debug!(
            "Stored {} watermark {} for {}",
            update.field,
            update.value,
            topic_key
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TopicWatermark>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .map(|(topic_key, watermark)| TopicWatermark {
                topic_key,
                watermark,
            })
            .collect())
    }

    async fn commit(&self, topic_key: &str, updates: &[WatermarkUpdate]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut marks = self.load().await?;
        let mark = marks.entry(topic_key.to_string()).or_default();
        for update in updates {
            mark.set(update.field, update.value);
        }
        let committed = *mark;
        self.save(&marks).await?;
        log::debug!("Committed watermark {:?} for {}", committed, topic_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatermarkField;
    use tempfile::TempDir;

    fn update(field: WatermarkField, value: u64) -> WatermarkUpdate {
        WatermarkUpdate { field, value }
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("watermarks.json"));

        assert_eq!(store.read("ajou_normal").await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("watermarks.json");
        let store = JsonFileStore::new(&path);

        store
            .write("ajou_normal", update(WatermarkField::Pinned, 3))
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(
            store.read("ajou_normal").await.unwrap(),
            Some(Watermark::new(3, 0))
        );
    }

    #[tokio::test]
    async fn test_writes_keep_other_field_and_topics() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("watermarks.json"));

        store
            .initialize("ajou_normal", Watermark::new(2, 50))
            .await
            .unwrap();
        store
            .initialize("software", Watermark::new(1, 77))
            .await
            .unwrap();
        store
            .write("ajou_normal", update(WatermarkField::Sequential, 51))
            .await
            .unwrap();

        // A fresh handle sees the persisted state
        let reopened = JsonFileStore::new(store.path());
        assert_eq!(
            reopened.read("ajou_normal").await.unwrap(),
            Some(Watermark::new(2, 51))
        );
        assert_eq!(
            reopened.read("software").await.unwrap(),
            Some(Watermark::new(1, 77))
        );
    }

    #[tokio::test]
    async fn test_commit_writes_both_fields_at_once() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("watermarks.json"));
        store
            .initialize("ajou_cms", Watermark::new(2, 50))
            .await
            .unwrap();

        store
            .commit(
                "ajou_cms",
                &[
                    update(WatermarkField::Pinned, 3),
                    update(WatermarkField::Sequential, 51),
                ],
            )
            .await
            .unwrap();

        let reopened = JsonFileStore::new(store.path());
        assert_eq!(
            reopened.read("ajou_cms").await.unwrap(),
            Some(Watermark::new(3, 51))
        );
    }

    #[tokio::test]
    async fn test_commit_on_corrupt_file_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("watermarks.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        let result = store
            .commit("ajou_cms", &[update(WatermarkField::Pinned, 3)])
            .await;

        assert!(result.is_err());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{not json");
    }

    #[tokio::test]
    async fn test_file_layout() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("watermarks.json"));
        store
            .initialize("ajou_cms", Watermark::new(3, 104))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["ajou_cms"]["pinned_count"], 3);
        assert_eq!(json["ajou_cms"]["sequential_max"], 104);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("watermarks.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.read("ajou_normal").await,
            Err(AppError::Store(_))
        ));
    }
}
