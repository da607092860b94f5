//! Log-only sink.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::NoticeRecord;
use crate::sink::NotificationSink;

/// Writes each notice to the log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notice: &NoticeRecord) -> Result<()> {
        log::info!(
            "{}",
            notice.format("[{topic}] {id} {date} {title} <{url}>")
        );
        if let Some(reason) = &notice.detail_error {
            log::warn!("  detail unavailable: {reason}");
        }
        Ok(())
    }
}
