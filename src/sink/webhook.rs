//! Webhook sink.
//!
//! Posts each notice either as its JSON record or as a Slack message with a
//! single attachment.

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{HttpConfig, NoticeRecord, WebhookFormat};
use crate::sink::NotificationSink;
use crate::utils::http::create_async_client;

/// Attachment bar colour.
const SLACK_COLOR: &str = "#0072ce";

/// Footer tag for pinned notices.
const IMPORTANT_TAG: &str = "[중요]";

/// HTTP POST sink.
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
    format: WebhookFormat,
}

impl WebhookSink {
    pub fn new(url: &str, format: WebhookFormat, http: &HttpConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(http)?,
            Url::parse(url)?,
            format,
        ))
    }

    pub fn with_client(client: reqwest::Client, url: Url, format: WebhookFormat) -> Self {
        Self {
            client,
            url,
            format,
        }
    }

    /// Request body for one notice.
    pub fn payload(&self, notice: &NoticeRecord) -> Result<Value> {
        match self.format {
            WebhookFormat::Json => Ok(serde_json::to_value(notice)?),
            WebhookFormat::Slack => Ok(slack_payload(notice)),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notice: &NoticeRecord) -> Result<()> {
        let body = self.payload(notice)?;
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::sink(format!("webhook post failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::sink(format!(
                "webhook returned HTTP {} for notice {}",
                status.as_u16(),
                notice.id
            )));
        }
        Ok(())
    }
}

/// Slack message with one attachment per notice.
pub fn slack_payload(notice: &NoticeRecord) -> Value {
    json!({
        "attachments": [{
            "color": SLACK_COLOR,
            "title": format!("{} {}", notice.date, notice.title),
            "title_link": notice.url,
            "text": notice.url,
            "footer": slack_footer(notice),
            "image_url": notice.images.first(),
        }]
    })
}

/// `[중요] [category] [department]`, skipping absent parts.
///
/// Boards without category or department are tagged with the topic name.
fn slack_footer(notice: &NoticeRecord) -> String {
    let mut parts = Vec::new();
    if notice.is_pinned() {
        parts.push(IMPORTANT_TAG.to_string());
    }
    let tags: Vec<String> = [notice.category.as_deref(), notice.department.as_deref()]
        .into_iter()
        .flatten()
        .map(|tag| format!("[{tag}]"))
        .collect();
    if tags.is_empty() {
        parts.push(format!("[{}]", notice.topic.display_name));
    } else {
        parts.extend(tags);
    }
    parts.join(" ")
}
