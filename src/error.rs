// src/error.rs

//! Unified error handling for the notifier.

use std::fmt;

use thiserror::Error;

use crate::models::Watermark;

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Listing markup no longer matches the board layout
    #[error("HTML structure has changed at {topic}")]
    StructureChanged { topic: String },

    /// A field that must be present or numeric was not
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Watermark store could not be read
    #[error("Watermark store error: {0}")]
    Store(String),

    /// Watermark commit failed after the batch was computed; nothing was
    /// stored
    #[error(
        "Failed to persist watermark pinned={} sequential={} for {topic}: {message}",
        .target.pinned_count,
        .target.sequential_max
    )]
    Persistence {
        topic: String,
        target: Watermark,
        message: String,
    },

    /// First-observation baseline could not be stored
    #[error("Failed to persist baseline watermark for {topic}: {message}")]
    BaselinePersistence { topic: String, message: String },

    /// Notification delivery failed
    #[error("Sink error: {0}")]
    Sink(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a watermark store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a sink error.
    pub fn sink(message: impl fmt::Display) -> Self {
        Self::Sink(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error breaks the at-most-once delivery guarantee.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. } | Self::BaselinePersistence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_message_names_topic_and_target() {
        let err = AppError::Persistence {
            topic: "ajou_normal".to_string(),
            target: Watermark::new(3, 104),
            message: "disk full".to_string(),
        };
        assert!(err.is_persistence());
        assert_eq!(
            err.to_string(),
            "Failed to persist watermark pinned=3 sequential=104 for ajou_normal: disk full"
        );
    }

    #[test]
    fn test_structure_changed_is_not_persistence() {
        let err = AppError::StructureChanged {
            topic: "소프트웨어학과".to_string(),
        };
        assert!(!err.is_persistence());
        assert_eq!(err.to_string(), "HTML structure has changed at 소프트웨어학과");
    }
}
