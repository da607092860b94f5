//! Fixtures and fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{BoardLayout, NoticeRecord, Topic, Watermark, WatermarkField, WatermarkUpdate};
use crate::sink::NotificationSink;
use crate::storage::{MemoryWatermarkStore, WatermarkStore};
use crate::utils::http::PageFetcher;

pub const CMS_LISTING_URL: &str = "https://www.ajou.ac.kr/kr/ajou/notice.do";

pub fn ajou_cms_topic() -> Topic {
    Topic {
        key: "ajou_cms".to_string(),
        display_name: "아주대학교 공지사항".to_string(),
        listing_url: CMS_LISTING_URL.to_string(),
        layout: BoardLayout::AjouCms,
    }
}

/// Detail URL the CMS layout builds for an article number.
pub fn cms_url(article: u64) -> String {
    format!("{CMS_LISTING_URL}?mode=view&articleNo={article}")
}

pub fn pinned_cms_row(title: &str, article: u64) -> String {
    format!(
        r#"<tr class="b-top-box"><td>공지</td><td><div><a href="?mode=view&articleNo={article}&article.offset=0&articleLimit=10" title="{title} 자세히 보기">{title}</a></div></td><td></td><td>학사팀</td></tr>"#
    )
}

pub fn cms_row(article: u64, title: &str) -> String {
    format!(
        r#"<tr><td>{article}</td><td><div><a href="?mode=view&articleNo={article}&article.offset=0&articleLimit=10" title="{title} 자세히 보기">{title}</a></div></td><td></td><td>학사팀</td></tr>"#
    )
}

pub fn ajou_cms_listing(pinned: &[String], sequential: &[String]) -> String {
    format!(
        r#"<html><body><div id="cms-content"><div><div><div class="bn-list-common01 type01">
        <table><tbody>{}{}</tbody></table>
        </div></div></div></div></body></html>"#,
        pinned.concat(),
        sequential.concat()
    )
}

pub fn ajou_cms_detail(paragraphs: &[&str], images: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!(
        r#"<html><body><div id="cms-content"><div><div><div class="bn-view-common01 type01">
        <div class="b-main-box"><div class="b-content-box">{body}{}</div></div>
        </div></div></div></div></body></html>"#,
        images.concat()
    )
}

enum FakePage {
    Body { body: String, delay: Duration },
    Status(u16),
}

/// Map-backed page source with per-URL delays and failures.
#[derive(Default)]
pub struct FakeFetcher {
    pages: Mutex<HashMap<String, FakePage>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn delayed_page(self, url: &str, body: impl Into<String>, delay_ms: u64) -> Self {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            FakePage::Body {
                body: body.into(),
                delay: Duration::from_millis(delay_ms),
            },
        );
        self
    }

    pub fn failing(self, url: &str, status: u16) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), FakePage::Status(status));
        self
    }

    pub fn set_page(&self, url: &str, body: impl Into<String>) {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            FakePage::Body {
                body: body.into(),
                delay: Duration::ZERO,
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        let (body, delay) = match self.pages.lock().unwrap().get(url) {
            Some(FakePage::Body { body, delay }) => (body.clone(), *delay),
            Some(FakePage::Status(status)) => {
                return Err(AppError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            None => {
                return Err(AppError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(body)
    }
}

/// Sink that records every delivered notice.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<NoticeRecord>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<NoticeRecord> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notice: &NoticeRecord) -> Result<()> {
        self.delivered.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Store whose writes touching one field always fail, leaving the
/// stored record untouched.
pub struct FailingStore {
    pub inner: MemoryWatermarkStore,
    pub failing_field: WatermarkField,
}

#[async_trait]
impl WatermarkStore for FailingStore {
    async fn read(&self, topic_key: &str) -> Result<Option<Watermark>> {
        self.inner.read(topic_key).await
    }

    async fn write(&self, topic_key: &str, update: WatermarkUpdate) -> Result<()> {
        if update.field == self.failing_field {
            return Err(AppError::store("disk full"));
        }
        self.inner.write(topic_key, update).await
    }

    async fn list(&self) -> Result<Vec<crate::models::TopicWatermark>> {
        self.inner.list().await
    }

    async fn commit(&self, topic_key: &str, updates: &[WatermarkUpdate]) -> Result<()> {
        if updates.iter().any(|u| u.field == self.failing_field) {
            return Err(AppError::store("disk full"));
        }
        self.inner.commit(topic_key, updates).await
    }
}
