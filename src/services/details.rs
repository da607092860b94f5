// src/services/details.rs

//! Concurrent detail enrichment.
//!
//! Fetches the detail page of every new notice with bounded parallelism.
//! Results come back in completion order and are put back in dispatch order
//! by index before returning.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::models::NoticeRecord;
use crate::services::SiteAdapter;
use crate::utils::http::PageFetcher;

/// Result of enriching one notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    /// Detail page read; carries the new record
    Enriched(NoticeRecord),
    /// Board does not enrich this notice; record passed through
    Skipped(NoticeRecord),
    /// Fetch or parse failed; carries the listing-level record
    Failed { record: NoticeRecord, error: String },
}

impl DetailOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DetailOutcome::Failed { .. })
    }

    pub fn record(&self) -> &NoticeRecord {
        match self {
            DetailOutcome::Enriched(record) | DetailOutcome::Skipped(record) => record,
            DetailOutcome::Failed { record, .. } => record,
        }
    }
}

/// Fans detail fetches out over a shared page fetcher.
#[derive(Clone)]
pub struct DetailFetcher {
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
}

impl DetailFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Enrich every record, returning exactly one outcome per input in input
    /// order.
    ///
    /// A failure never cancels sibling fetches.
    pub async fn enrich(
        &self,
        adapter: &SiteAdapter,
        records: Vec<NoticeRecord>,
    ) -> Vec<DetailOutcome> {
        let total = records.len();
        let fetcher = self.fetcher.as_ref();

        let mut slots: Vec<Option<DetailOutcome>> = vec![None; total];
        let mut results = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| async move {
                (index, Self::enrich_one(fetcher, adapter, record).await)
            })
            .buffer_unordered(self.concurrency);

        while let Some((index, outcome)) = results.next().await {
            if let DetailOutcome::Failed { record, error } = &outcome {
                log::warn!("Failed to fetch notice detail {}: {}", record.url, error);
            }
            slots[index] = Some(outcome);
        }

        let outcomes: Vec<DetailOutcome> = slots.into_iter().flatten().collect();
        debug_assert_eq!(outcomes.len(), total);
        outcomes
    }

    async fn enrich_one(
        fetcher: &dyn PageFetcher,
        adapter: &SiteAdapter,
        record: NoticeRecord,
    ) -> DetailOutcome {
        if !adapter.requires_detail(&record) {
            return DetailOutcome::Skipped(record);
        }
        match adapter.fetch_detail(fetcher, &record.url).await {
            Ok(detail) => DetailOutcome::Enriched(record.enriched(detail)),
            Err(e) => DetailOutcome::Failed {
                record,
                error: e.to_string(),
            },
        }
    }
}
