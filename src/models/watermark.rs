//! Per-topic progress markers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Last observed pinned count and sequential maximum for a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Number of pinned notices last observed
    pub pinned_count: u64,

    /// Highest sequential notice number last observed
    pub sequential_max: u64,
}

impl Watermark {
    pub fn new(pinned_count: u64, sequential_max: u64) -> Self {
        Self {
            pinned_count,
            sequential_max,
        }
    }

    pub fn get(&self, field: WatermarkField) -> u64 {
        match field {
            WatermarkField::Pinned => self.pinned_count,
            WatermarkField::Sequential => self.sequential_max,
        }
    }

    pub fn set(&mut self, field: WatermarkField, value: u64) {
        match field {
            WatermarkField::Pinned => self.pinned_count = value,
            WatermarkField::Sequential => self.sequential_max = value,
        }
    }
}

/// A watermark together with the topic it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicWatermark {
    pub topic_key: String,
    #[serde(flatten)]
    pub watermark: Watermark,
}

/// The two independently numbered notice streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkField {
    Pinned,
    Sequential,
}

impl WatermarkField {
    pub const ALL: [WatermarkField; 2] = [WatermarkField::Pinned, WatermarkField::Sequential];
}

impl fmt::Display for WatermarkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatermarkField::Pinned => f.write_str("pinned"),
            WatermarkField::Sequential => f.write_str("sequential"),
        }
    }
}

/// A single field write issued to the watermark store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkUpdate {
    pub field: WatermarkField,
    pub value: u64,
}
