//! Watermark persistence.
//!
//! The store is the only state that survives between polling cycles. Each
//! topic owns one record keyed by its topic key:
//!
//! ```text
//! {
//!   "ajou_normal": { "pinned_count": 3, "sequential_max": 1204 },
//!   "software":    { "pinned_count": 1, "sequential_max": 77 }
//! }
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TopicWatermark, Watermark, WatermarkField, WatermarkUpdate};

// Re-export for convenience
pub use local::JsonFileStore;
pub use memory::MemoryWatermarkStore;

/// Per-topic watermark persistence.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Stored watermark for a topic, `None` if the topic was never observed.
    async fn read(&self, topic_key: &str) -> Result<Option<Watermark>>;

    /// Write one field; the other field keeps its stored value (or zero).
    async fn write(&self, topic_key: &str, update: WatermarkUpdate) -> Result<()>;

    /// All stored watermarks, ordered by topic key.
    async fn list(&self) -> Result<Vec<TopicWatermark>>;

    /// Apply several field writes as one unit: either every update is stored
    /// or none is.
    async fn commit(&self, topic_key: &str, updates: &[WatermarkUpdate]) -> Result<()>;

    /// Record a first-observation baseline.
    async fn initialize(&self, topic_key: &str, watermark: Watermark) -> Result<()> {
        let updates = WatermarkField::ALL.map(|field| WatermarkUpdate {
            field,
            value: watermark.get(field),
        });
        self.commit(topic_key, &updates).await
    }
}
