//! Poll runner: one cycle per topic, run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};

use crate::models::Topic;
use crate::pipeline::cycle::{CycleOutcome, CycleReport, Notifier};

/// A topic whose cycle failed outright.
#[derive(Debug, Clone)]
pub struct TopicFailure {
    pub topic: String,
    pub message: String,

    /// Watermark write failed; notices may be delivered again
    pub persistence: bool,
}

/// Result of polling every topic once.
#[derive(Debug, Default)]
pub struct PollSummary {
    /// Completed cycles (including aborted ones), in topic order
    pub reports: Vec<CycleReport>,
    pub failures: Vec<TopicFailure>,
}

impl PollSummary {
    pub fn emitted(&self) -> usize {
        self.reports.iter().map(|r| r.emitted.len()).sum()
    }

    pub fn aborted(&self) -> usize {
        self.reports.iter().filter(|r| r.is_aborted()).count()
    }

    pub fn baselines(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, CycleOutcome::Baseline(_)))
            .count()
    }

    pub fn has_persistence_failure(&self) -> bool {
        self.failures.iter().any(|f| f.persistence)
    }
}

/// Run one cycle for every topic and wait for all of them.
///
/// Topics must be unique: two cycles for the same topic would race on its
/// watermark.
pub async fn run_poll(notifier: Arc<Notifier>, topics: &[Topic]) -> PollSummary {
    let mut tasks = JoinSet::new();
    let mut spawned: HashMap<Id, usize> = HashMap::new();
    for (index, topic) in topics.iter().cloned().enumerate() {
        let notifier = Arc::clone(&notifier);
        let handle = tasks.spawn(async move { notifier.run_cycle(&topic).await });
        spawned.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<CycleReport>> = vec![None; topics.len()];
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next_with_id().await {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let Some(&index) = spawned.get(&id) else {
            continue;
        };
        let topic = topics[index].key.clone();

        match joined {
            Ok((_, Ok(report))) => {
                match &report.outcome {
                    CycleOutcome::Aborted(reason) => {
                        log::warn!("[{}] Cycle aborted: {}", report.topic, reason)
                    }
                    _ => log::info!(
                        "[{}] Cycle complete: {} notice(s) emitted",
                        report.topic,
                        report.emitted.len()
                    ),
                }
                slots[index] = Some(report);
            }
            Ok((_, Err(e))) => {
                log::error!("[{}] Cycle failed: {}", topic, e);
                failures.push(TopicFailure {
                    topic,
                    persistence: e.is_persistence(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                log::error!("[{}] Cycle task panicked: {}", topic, e);
                failures.push(TopicFailure {
                    topic,
                    message: e.to_string(),
                    persistence: false,
                });
            }
        }
    }

    PollSummary {
        reports: slots.into_iter().flatten().collect(),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::Result;
    use crate::models::{BoardLayout, NotifierConfig, Watermark, WatermarkField};
    use crate::utils::http::PageFetcher;
    use crate::storage::MemoryWatermarkStore;
    use crate::testing::{
        FailingStore, FakeFetcher, RecordingSink, ajou_cms_detail, ajou_cms_listing,
        ajou_cms_topic, cms_row, cms_url,
    };

    fn second_topic() -> Topic {
        Topic {
            key: "ajou_cms_2".to_string(),
            display_name: "아주대학교 학사공지".to_string(),
            listing_url: "https://www.ajou.ac.kr/kr/ajou/notice_2.do".to_string(),
            layout: BoardLayout::AjouCms,
        }
    }

    fn fetcher() -> FakeFetcher {
        FakeFetcher::new()
            .page(
                &ajou_cms_topic().listing_url,
                ajou_cms_listing(&[], &[cms_row(51, "Notice 51"), cms_row(50, "Notice 50")]),
            )
            .page(&cms_url(51), ajou_cms_detail(&["본문"], &[]))
            .failing(&second_topic().listing_url, 500)
    }

    #[tokio::test]
    async fn test_poll_runs_every_topic() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(
            Arc::new(fetcher()),
            Arc::new(MemoryWatermarkStore::with_marks([
                ("ajou_cms", Watermark::new(0, 50)),
                ("ajou_cms_2", Watermark::new(0, 10)),
            ])),
            sink.clone(),
            NotifierConfig::default(),
            4,
        );

        let summary = run_poll(Arc::new(notifier), &[ajou_cms_topic(), second_topic()]).await;

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].topic, "ajou_cms");
        assert_eq!(summary.emitted(), 1);
        assert_eq!(summary.aborted(), 1);
        assert!(summary.failures.is_empty());
        assert_eq!(sink.titles(), vec!["Notice 51"]);
    }

    #[tokio::test]
    async fn test_poll_reports_persistence_failure() {
        let notifier = Notifier::new(
            Arc::new(fetcher()),
            Arc::new(FailingStore {
                inner: MemoryWatermarkStore::with_marks([("ajou_cms", Watermark::new(0, 50))]),
                failing_field: WatermarkField::Sequential,
            }),
            Arc::new(RecordingSink::default()),
            NotifierConfig::default(),
            4,
        );

        let summary = run_poll(Arc::new(notifier), &[ajou_cms_topic()]).await;

        assert!(summary.reports.is_empty());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].topic, "ajou_cms");
        assert!(summary.has_persistence_failure());
    }

    /// Fetcher that panics for one URL.
    struct PanicsOn {
        inner: FakeFetcher,
        url: String,
    }

    #[async_trait]
    impl PageFetcher for PanicsOn {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url == self.url {
                panic!("listing parser blew up");
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_poll_names_topic_of_panicked_cycle() {
        let fetcher = PanicsOn {
            inner: fetcher(),
            url: second_topic().listing_url,
        };
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(
            Arc::new(fetcher),
            Arc::new(MemoryWatermarkStore::with_marks([
                ("ajou_cms", Watermark::new(0, 50)),
                ("ajou_cms_2", Watermark::new(0, 10)),
            ])),
            sink.clone(),
            NotifierConfig::default(),
            4,
        );

        let summary = run_poll(Arc::new(notifier), &[ajou_cms_topic(), second_topic()]).await;

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].topic, "ajou_cms_2");
        assert!(!summary.failures[0].persistence);
        assert_eq!(sink.titles(), vec!["Notice 51"]);
    }
}
