//! In-memory watermark store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{TopicWatermark, Watermark, WatermarkUpdate};
use crate::storage::WatermarkStore;

/// Watermarks held in process memory; lost on exit.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    marks: RwLock<BTreeMap<String, Watermark>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with watermarks.
    pub fn with_marks<I, K>(marks: I) -> Self
    where
        I: IntoIterator<Item = (K, Watermark)>,
        K: Into<String>,
    {
        Self {
            marks: RwLock::new(marks.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn read(&self, topic_key: &str) -> Result<Option<Watermark>> {
        Ok(self.marks.read().await.get(topic_key).copied())
    }

    async fn write(&self, topic_key: &str, update: WatermarkUpdate) -> Result<()> {
        self.marks
            .write()
            .await
            .entry(topic_key.to_string())
            .or_default()
            .set(update.field, update.value);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TopicWatermark>> {
        Ok(self
            .marks
            .read()
            .await
            .iter()
            .map(|(key, mark)| TopicWatermark {
                topic_key: key.clone(),
                watermark: *mark,
            })
            .collect())
    }

    async fn commit(&self, topic_key: &str, updates: &[WatermarkUpdate]) -> Result<()> {
        let mut marks = self.marks.write().await;
        let mark = marks.entry(topic_key.to_string()).or_default();
        for update in updates {
            mark.set(update.field, update.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatermarkField;

    #[tokio::test]
    async fn test_unknown_topic_reads_none() {
        let store = MemoryWatermarkStore::new();
        assert_eq!(store.read("ajou_normal").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_single_field() {
        let store = MemoryWatermarkStore::with_marks([("ajou_normal", Watermark::new(2, 50))]);
        store
            .write(
                "ajou_normal",
                WatermarkUpdate {
                    field: WatermarkField::Sequential,
                    value: 51,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            store.read("ajou_normal").await.unwrap(),
            Some(Watermark::new(2, 51))
        );
    }

    #[tokio::test]
    async fn test_list_sorted_by_key() {
        let store = MemoryWatermarkStore::new();
        store.initialize("software", Watermark::new(1, 77)).await.unwrap();
        store.initialize("ajou_cms", Watermark::new(3, 51)).await.unwrap();

        let keys: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.topic_key)
            .collect();
        assert_eq!(keys, vec!["ajou_cms", "software"]);
    }

    #[tokio::test]
    async fn test_commit_applies_every_update() {
        let store = MemoryWatermarkStore::with_marks([("ajou_cms", Watermark::new(2, 50))]);
        store
            .commit(
                "ajou_cms",
                &[
                    WatermarkUpdate {
                        field: WatermarkField::Pinned,
                        value: 3,
                    },
                    WatermarkUpdate {
                        field: WatermarkField::Sequential,
                        value: 51,
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            store.read("ajou_cms").await.unwrap(),
            Some(Watermark::new(3, 51))
        );
    }
}
