// src/models/mod.rs

//! Domain models for the notifier.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod notice;
mod topic;
mod watermark;

// Re-export all public types
pub use config::{
    Config, DetailFailurePolicy, HttpConfig, NotifierConfig, SinkConfig, StorageConfig,
    WEBHOOK_ENV, WebhookFormat,
};
pub use listing::{ListingSnapshot, RawRow};
pub use notice::{NoticeDetail, NoticeId, NoticeRecord, PINNED_SENTINEL, TopicLabel};
pub use topic::{BoardLayout, Topic};
pub use watermark::{TopicWatermark, Watermark, WatermarkField, WatermarkUpdate};
