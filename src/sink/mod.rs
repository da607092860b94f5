//! Notification delivery.
//!
//! A sink receives each emitted notice once, in batch order. Retrying failed
//! deliveries is left to the receiving end.

pub mod log;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HttpConfig, NoticeRecord, SinkConfig};

pub use self::log::LogSink;
pub use webhook::WebhookSink;

/// Downstream receiver of emitted notices.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notice: &NoticeRecord) -> Result<()>;
}

/// Build the sink described by the configuration.
///
/// Without a webhook URL notices are only written to the log.
pub fn from_config(sink: &SinkConfig, http: &HttpConfig) -> Result<Arc<dyn NotificationSink>> {
    match &sink.webhook_url {
        Some(url) => Ok(Arc::new(WebhookSink::new(url, sink.format, http)?)),
        None => {
            ::log::info!("No webhook configured, notices are logged only");
            Ok(Arc::new(LogSink))
        }
    }
}
