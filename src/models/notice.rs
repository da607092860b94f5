//! Notice record structure.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Id text boards show in place of a number for pinned notices.
pub const PINNED_SENTINEL: &str = "공지";

/// Board-assigned notice identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeId {
    /// Pinned/boxed notice kept at the top of the board
    Pinned,
    /// Sequentially numbered notice
    Number(u64),
}

impl NoticeId {
    pub fn is_pinned(&self) -> bool {
        matches!(self, NoticeId::Pinned)
    }
}

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeId::Pinned => f.write_str(PINNED_SENTINEL),
            NoticeId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for NoticeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoticeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == PINNED_SENTINEL {
            return Ok(NoticeId::Pinned);
        }
        raw.parse()
            .map(NoticeId::Number)
            .map_err(serde::de::Error::custom)
    }
}

/// Which board a notice came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicLabel {
    /// Storage key (e.g. `ajou_normal`)
    pub key: String,

    /// Human-readable board name (e.g. `아주대학교 공지사항`)
    pub display_name: String,
}

/// Body text and images taken from a notice's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeDetail {
    pub content: String,
    pub images: Vec<String>,
}

/// One published notice.
///
/// Records are never mutated once built: enrichment returns a new record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoticeRecord {
    /// Board number, or the pinned sentinel
    pub id: NoticeId,

    /// Classification tag shown on some boards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Notice title
    pub title: String,

    /// Publishing unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Display date (`M월D일`)
    pub date: String,

    /// Absolute link to the notice
    pub url: String,

    /// Full body, only present after detail enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Absolute image URLs in page order
    #[serde(default)]
    pub images: Vec<String>,

    /// Source board
    pub topic: TopicLabel,

    /// Set when the detail page could not be fetched or parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

impl NoticeRecord {
    /// Whether the board pinned this notice.
    pub fn is_pinned(&self) -> bool {
        self.id.is_pinned()
    }

    /// Return a copy carrying the detail page's content.
    pub fn enriched(&self, detail: NoticeDetail) -> Self {
        Self {
            content: Some(detail.content),
            images: detail.images,
            detail_error: None,
            ..self.clone()
        }
    }

    /// Return a copy marked as having failed detail enrichment.
    pub fn with_detail_failure(&self, reason: impl Into<String>) -> Self {
        Self {
            content: None,
            images: Vec::new(),
            detail_error: Some(reason.into()),
            ..self.clone()
        }
    }

    /// Format notice for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{category}`, `{title}`, `{department}`, `{date}`, `{url}`
    /// - `{topic}`, `{topic_key}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id.to_string())
            .replace("{category}", self.category.as_deref().unwrap_or(""))
            .replace("{title}", &self.title)
            .replace("{department}", self.department.as_deref().unwrap_or(""))
            .replace("{date}", &self.date)
            .replace("{url}", &self.url)
            .replace("{topic}", &self.topic.display_name)
            .replace("{topic_key}", &self.topic.key)
    }
}
