//! One polling cycle for one topic.
//!
//! ```text
//! Idle → ListingFetched → Validated → Diffed → Enriched → Persisted → Emitted
//!            │                │          │         │
//!            └────────────────┴──────────┴─────────┴──→ Aborted
//! ```
//!
//! Every abort happens before the watermark is written, so the next poll
//! starts again from the same baseline. A failed watermark write is the only
//! cycle failure returned as an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::{
    Config, DetailFailurePolicy, ListingSnapshot, NoticeRecord, NotifierConfig, Topic, Watermark,
};
use crate::pipeline::detect::{ChangePlan, detect_changes};
use crate::services::{DetailFetcher, DetailOutcome, SiteAdapter};
use crate::sink::{self, NotificationSink};
use crate::storage::{JsonFileStore, WatermarkStore};
use crate::utils::http::{HttpFetcher, PageFetcher};

/// Position of a cycle in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    ListingFetched,
    Validated,
    Diffed,
    Enriched,
    Persisted,
    Emitted,
    Aborted,
}

/// Why a cycle ended without touching the watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Topic could not be turned into a site adapter
    InvalidTopic(String),
    /// Stored watermark could not be read
    StoreUnavailable(String),
    /// Listing page fetch failed or returned a non-success status
    ListingFetch(String),
    /// Listing markup no longer matches the layout
    StructureChanged { consecutive: u32 },
    /// A listing value (id, link, date) could not be parsed
    Parse(String),
    /// Detail fetches failed under the hold policy
    DetailsHeld { failed: usize },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::InvalidTopic(e) => write!(f, "invalid topic: {e}"),
            AbortReason::StoreUnavailable(e) => write!(f, "watermark store unavailable: {e}"),
            AbortReason::ListingFetch(e) => write!(f, "listing fetch failed: {e}"),
            AbortReason::StructureChanged { consecutive } => {
                write!(f, "listing structure changed ({consecutive} in a row)")
            }
            AbortReason::Parse(e) => write!(f, "listing parse failed: {e}"),
            AbortReason::DetailsHeld { failed } => {
                write!(f, "{failed} detail fetch(es) failed, batch held")
            }
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New notices were handed to the sink
    Emitted,
    /// First observation: live values stored, nothing emitted
    Baseline(Watermark),
    /// Nothing new; corrections may still have been stored
    NoChange,
    Aborted(AbortReason),
}

/// Result of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub topic: String,
    pub state: CycleState,
    pub outcome: CycleOutcome,

    /// Watermark after the cycle (the stored one on abort)
    pub watermark: Option<Watermark>,

    /// Notices handed to the sink, in batch order
    pub emitted: Vec<NoticeRecord>,

    pub detail_failures: usize,
    pub delivery_failures: usize,
}

impl CycleReport {
    fn new(topic: &Topic) -> Self {
        Self {
            topic: topic.key.clone(),
            state: CycleState::Idle,
            outcome: CycleOutcome::NoChange,
            watermark: None,
            emitted: Vec::new(),
            detail_failures: 0,
            delivery_failures: 0,
        }
    }

    fn advance(&mut self, next: CycleState) {
        log::debug!("[{}] {:?} -> {:?}", self.topic, self.state, next);
        self.state = next;
    }

    fn abort(mut self, reason: AbortReason) -> Self {
        self.advance(CycleState::Aborted);
        self.outcome = CycleOutcome::Aborted(reason);
        self
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Aborted(_))
    }
}

/// Dry-run view of a topic: what the next cycle would emit.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub topic: String,
    pub stored: Option<Watermark>,
    pub live: Watermark,

    /// `None` on first observation
    pub plan: Option<ChangePlan>,

    /// Listing-level records that would be enriched and emitted
    pub pending: Vec<NoticeRecord>,
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Runs polling cycles against shared fetcher, store and sink.
pub struct Notifier {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn WatermarkStore>,
    sink: Arc<dyn NotificationSink>,
    details: DetailFetcher,
    options: NotifierConfig,
    drift: Mutex<HashMap<String, u32>>,
    clock: Clock,
}

impl Notifier {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn WatermarkStore>,
        sink: Arc<dyn NotificationSink>,
        options: NotifierConfig,
        max_concurrent: usize,
    ) -> Self {
        Self {
            details: DetailFetcher::new(Arc::clone(&fetcher), max_concurrent),
            fetcher,
            store,
            sink,
            options,
            drift: Mutex::new(HashMap::new()),
            clock: Box::new(|| Local::now().date_naive()),
        }
    }

    /// Wire up the HTTP fetcher, JSON file store and configured sink.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpFetcher::new(&config.http)?),
            Arc::new(JsonFileStore::new(&config.storage.watermark_file)),
            sink::from_config(&config.sink, &config.http)?,
            config.notifier.clone(),
            config.http.max_concurrent,
        ))
    }

    /// Replace the date source used for boards without a date column.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn WatermarkStore> {
        &self.store
    }

    /// Consecutive markup-drift aborts recorded for a topic: structure
    /// validation failures and listing values that no longer parse.
    pub fn drift_count(&self, topic_key: &str) -> u32 {
        self.drift
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic_key)
            .copied()
            .unwrap_or(0)
    }

    fn record_drift(&self, topic_key: &str) -> u32 {
        let mut drift = self.drift.lock().unwrap_or_else(PoisonError::into_inner);
        let count = drift.entry(topic_key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn abort_on_drift(&self, topic: &Topic, report: CycleReport, error: AppError) -> CycleReport {
        let consecutive = self.record_drift(&topic.key);
        let reason = match error {
            AppError::StructureChanged { .. } => {
                log::error!(
                    "[{}] HTML structure has changed at {} ({} consecutive)",
                    topic.key,
                    topic.display_name,
                    consecutive
                );
                AbortReason::StructureChanged { consecutive }
            }
            other => {
                log::warn!(
                    "[{}] Listing parse failed ({} consecutive): {}",
                    topic.key,
                    consecutive,
                    other
                );
                AbortReason::Parse(other.to_string())
            }
        };
        report.abort(reason)
    }

    fn clear_drift(&self, topic_key: &str) {
        let previous = self
            .drift
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic_key);
        if let Some(count) = previous {
            log::info!(
                "[{}] Listing structure recovered after {} failed cycle(s)",
                topic_key,
                count
            );
        }
    }

    /// Run one full cycle for a topic.
    ///
    /// Routine failures end in `CycleOutcome::Aborted`; an `Err` means the
    /// watermark could not be stored after the batch was computed.
    pub async fn run_cycle(&self, topic: &Topic) -> Result<CycleReport> {
        let mut report = CycleReport::new(topic);

        let adapter = match SiteAdapter::for_topic(topic) {
            Ok(adapter) => adapter,
            Err(e) => return Ok(report.abort(AbortReason::InvalidTopic(e.to_string()))),
        };

        let stored = match self.store.read(&topic.key).await {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("[{}] Failed to read watermark: {}", topic.key, e);
                return Ok(report.abort(AbortReason::StoreUnavailable(e.to_string())));
            }
        };
        report.watermark = stored;

        let markup = match self.fetcher.fetch(&topic.listing_url).await {
            Ok(markup) => markup,
            Err(e) => {
                log::warn!("[{}] Failed to fetch listing: {}", topic.key, e);
                return Ok(report.abort(AbortReason::ListingFetch(e.to_string())));
            }
        };
        report.advance(CycleState::ListingFetched);

        let snapshot = match adapter.read_listing(&markup) {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(self.abort_on_drift(topic, report, e)),
        };
        report.advance(CycleState::Validated);

        let Some(stored) = stored else {
            return self.bootstrap(topic, &snapshot, report).await;
        };

        let plan = match detect_changes(&snapshot, stored, self.options.max_sequential_window) {
            Ok(plan) => plan,
            Err(e) => return Ok(self.abort_on_drift(topic, report, e)),
        };
        report.advance(CycleState::Diffed);
        log::debug!(
            "[{}] stored {:?}, live {:?}, {} pinned and {} sequential new",
            topic.key,
            plan.stored,
            plan.next,
            plan.pinned_new,
            plan.sequential_new
        );

        let today = (self.clock)();
        let records: Result<Vec<NoticeRecord>> = plan
            .new_pinned(&snapshot)
            .iter()
            .chain(plan.new_sequential(&snapshot))
            .map(|row| adapter.extract_listing_row(row, today))
            .collect();
        let records = match records {
            Ok(records) => records,
            Err(e) => return Ok(self.abort_on_drift(topic, report, e)),
        };
        self.clear_drift(&topic.key);

        let outcomes = self.details.enrich(&adapter, records).await;
        report.detail_failures = outcomes.iter().filter(|o| o.is_failed()).count();
        if report.detail_failures > 0 && !self.options.detail_failure_policy.accepts_partial() {
            log::warn!(
                "[{}] Holding batch: {} detail fetch(es) failed",
                topic.key,
                report.detail_failures
            );
            let failed = report.detail_failures;
            return Ok(report.abort(AbortReason::DetailsHeld { failed }));
        }
        let batch = self.apply_policy(outcomes);
        report.advance(CycleState::Enriched);

        self.persist(topic, &plan).await?;
        report.watermark = Some(plan.next);
        report.advance(CycleState::Persisted);

        report.delivery_failures = self.emit(topic, &batch).await;
        report.emitted = batch;
        report.outcome = if plan.has_new() {
            CycleOutcome::Emitted
        } else {
            CycleOutcome::NoChange
        };
        report.advance(CycleState::Emitted);

        Ok(report)
    }

    /// Fetch, validate and diff a topic without enriching, writing or emitting.
    pub async fn inspect(&self, topic: &Topic) -> Result<InspectReport> {
        let adapter = SiteAdapter::for_topic(topic)?;
        let stored = self.store.read(&topic.key).await?;
        let markup = self.fetcher.fetch(&topic.listing_url).await?;
        let snapshot = adapter.read_listing(&markup)?;
        let live = Watermark::new(snapshot.pinned_count(), snapshot.sequential_max()?);

        let Some(stored) = stored else {
            return Ok(InspectReport {
                topic: topic.key.clone(),
                stored: None,
                live,
                plan: None,
                pending: Vec::new(),
            });
        };

        let plan = detect_changes(&snapshot, stored, self.options.max_sequential_window)?;
        let today = (self.clock)();
        let pending = plan
            .new_pinned(&snapshot)
            .iter()
            .chain(plan.new_sequential(&snapshot))
            .map(|row| adapter.extract_listing_row(row, today))
            .collect::<Result<_>>()?;

        Ok(InspectReport {
            topic: topic.key.clone(),
            stored: Some(stored),
            live,
            plan: Some(plan),
            pending,
        })
    }

    async fn bootstrap(
        &self,
        topic: &Topic,
        snapshot: &ListingSnapshot,
        mut report: CycleReport,
    ) -> Result<CycleReport> {
        let live = match snapshot.sequential_max() {
            Ok(max) => Watermark::new(snapshot.pinned_count(), max),
            Err(e) => return Ok(self.abort_on_drift(topic, report, e)),
        };
        self.clear_drift(&topic.key);
        report.advance(CycleState::Diffed);
        report.advance(CycleState::Enriched);

        self.store
            .initialize(&topic.key, live)
            .await
            .map_err(|e| {
                log::error!("[{}] Failed to store baseline watermark: {}", topic.key, e);
                AppError::BaselinePersistence {
                    topic: topic.key.clone(),
                    message: e.to_string(),
                }
            })?;
        log::info!(
            "[{}] First observation: baseline pinned={} sequential={}",
            topic.key,
            live.pinned_count,
            live.sequential_max
        );

        report.watermark = Some(live);
        report.advance(CycleState::Persisted);
        report.outcome = CycleOutcome::Baseline(live);
        report.advance(CycleState::Emitted);
        Ok(report)
    }

    fn apply_policy(&self, outcomes: Vec<DetailOutcome>) -> Vec<NoticeRecord> {
        let policy = self.options.detail_failure_policy;
        outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                DetailOutcome::Enriched(record) | DetailOutcome::Skipped(record) => Some(record),
                DetailOutcome::Failed { record, error } => match policy {
                    DetailFailurePolicy::Placeholder => Some(record.with_detail_failure(error)),
                    DetailFailurePolicy::Drop | DetailFailurePolicy::Hold => None,
                },
            })
            .collect()
    }

    /// Commit every changed field in one store operation, so a failure
    /// leaves both streams at their stored values.
    async fn persist(&self, topic: &Topic, plan: &ChangePlan) -> Result<()> {
        let updates = plan.updates();
        if updates.is_empty() {
            return Ok(());
        }
        self.store
            .commit(&topic.key, &updates)
            .await
            .map_err(|e| {
                log::error!(
                    "[{}] Failed to persist watermark {:?}: {}. Notices may be delivered twice.",
                    topic.key,
                    plan.next,
                    e
                );
                AppError::Persistence {
                    topic: topic.key.clone(),
                    target: plan.next,
                    message: e.to_string(),
                }
            })
    }

    /// Deliver the batch in order; returns the number of failed deliveries.
    async fn emit(&self, topic: &Topic, batch: &[NoticeRecord]) -> usize {
        let mut failures = 0;
        for notice in batch {
            match self.sink.deliver(notice).await {
                Ok(()) => log::info!("[{}] Sent notice {} {}", topic.key, notice.id, notice.title),
                Err(e) => {
                    failures += 1;
                    log::error!("[{}] Failed to send notice {}: {}", topic.key, notice.url, e);
                }
            }
        }
        failures
    }
}
