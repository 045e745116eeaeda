use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{ConfigError, IngestConfig};
use crate::extract::{RowExtractor, SelectorExtractor};
use crate::parser::{ParseContext, SkippedRow, parse_rows};
use crate::reconcile::{ReconcileError, Reconciler};
use crate::scraper::{ScheduleSource, ScraperError};
use crate::store::MatchStore;
use crate::types::DraftMatch;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] ScraperError),
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// What one ingestion run saw and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub trigger: Trigger,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_seen: usize,
    pub parsed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: Vec<SkippedRow>,
    /// Set when the run aborted; persisted state is untouched in that case.
    pub error: Option<String>,
}

impl RunReport {
    fn start(trigger: Trigger, source: &str) -> Self {
        let now = Utc::now();
        Self {
            trigger,
            source: source.to_string(),
            started_at: now,
            finished_at: now,
            rows_seen: 0,
            parsed: 0,
            inserted: 0,
            updated: 0,
            deleted: 0,
            failed: 0,
            skipped: Vec::new(),
            error: None,
        }
    }

    fn abort(mut self, error: IngestError) -> Self {
        log::error!("Ingestion aborted: {}", error);
        self.error = Some(error.to_string());
        self.finished_at = Utc::now();
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nIngestion ({}) from {}:", self.trigger, self.source)?;
        writeln!(f, "  Rows seen:  {}", self.rows_seen)?;
        writeln!(f, "  Parsed:     {}", self.parsed)?;
        writeln!(f, "  Inserted:   {}", self.inserted)?;
        writeln!(f, "  Updated:    {}", self.updated)?;
        if self.deleted > 0 {
            writeln!(f, "  Deleted:    {}", self.deleted)?;
        }
        writeln!(f, "  Failed:     {}", self.failed)?;
        writeln!(f, "  Skipped:    {}", self.skipped.len())?;
        for skip in &self.skipped {
            writeln!(f, "    row {:>3}: {}", skip.index, skip.reason)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "  Error:      {}", error)?;
        }
        Ok(())
    }
}

/// Drafts and skipped rows from one document, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBatch {
    pub rows_seen: usize,
    pub drafts: Vec<DraftMatch>,
    pub skipped: Vec<SkippedRow>,
}

impl ParsedBatch {
    pub fn from_document(extractor: &dyn RowExtractor, html: &str, ctx: &ParseContext) -> Self {
        let rows = extractor.extract(html);
        log::info!("Found {} candidate row(s)", rows.len());

        let mut drafts = Vec::with_capacity(rows.len());
        let mut skipped = Vec::new();
        for result in parse_rows(&rows, ctx) {
            match result {
                Ok(draft) => drafts.push(draft),
                Err(skip) => skipped.push(skip),
            }
        }

        Self {
            rows_seen: rows.len(),
            drafts,
            skipped,
        }
    }
}

/// The fetch → extract → parse → reconcile pipeline.
///
/// Every entry point goes through [`Ingestor::run`], which holds the
/// reconciler lock for the whole run, so scheduled and manual runs never
/// overlap.
pub struct Ingestor<S, F> {
    config: IngestConfig,
    tz: Tz,
    source: F,
    extractor: Box<dyn RowExtractor>,
    reconciler: Mutex<Reconciler<S>>,
}

impl<S: MatchStore, F: ScheduleSource> Ingestor<S, F> {
    pub fn new(config: IngestConfig, store: Arc<S>, source: F) -> Result<Self, ConfigError> {
        let tz = config.schedule.tz()?;
        let reconciler = Reconciler::new(store, config.policy);
        Ok(Self {
            config,
            tz,
            source,
            extractor: Box::new(SelectorExtractor),
            reconciler: Mutex::new(reconciler),
        })
    }

    pub fn with_extractor(mut self, extractor: impl RowExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// True while a run holds the lock.
    pub fn is_running(&self) -> bool {
        self.reconciler.try_lock().is_err()
    }

    /// Fetches and parses without touching the store.
    pub async fn preview(&self) -> Result<ParsedBatch, ScraperError> {
        let html = self.source.fetch_schedule().await?;
        Ok(ParsedBatch::from_document(
            self.extractor.as_ref(),
            &html,
            &self.parse_context(),
        ))
    }

    fn parse_context(&self) -> ParseContext {
        ParseContext::from_config(
            &self.config,
            Utc::now().with_timezone(&self.tz).naive_local(),
        )
    }

    /// Operator-initiated run; waits for any run already in progress.
    pub async fn run_now(&self) -> RunReport {
        self.run(Trigger::Manual).await
    }

    pub async fn run(&self, trigger: Trigger) -> RunReport {
        let mut reconciler = self.reconciler.lock().await;
        let mut report = RunReport::start(trigger, self.source.describe());

        log::info!("Starting {} ingestion from {}", trigger, self.source.describe());

        let html = match self.source.fetch_schedule().await {
            Ok(html) => html,
            Err(e) => return report.abort(e.into()),
        };

        let batch =
            ParsedBatch::from_document(self.extractor.as_ref(), &html, &self.parse_context());
        report.rows_seen = batch.rows_seen;
        report.parsed = batch.drafts.len();
        report.skipped = batch.skipped;

        let summary = match reconciler.reconcile(batch.drafts, Utc::now()).await {
            Ok(summary) => summary,
            Err(e) => return report.abort(e.into()),
        };

        report.inserted = summary.inserted;
        report.updated = summary.updated;
        report.deleted = summary.deleted;
        report.failed = summary.failed;
        report.finished_at = Utc::now();

        log::info!(
            "Ingestion finished - rows: {}, new: {}, updated: {}, skipped: {}, failed: {}",
            report.rows_seen,
            report.inserted,
            report.updated,
            report.skipped.len(),
            report.failed
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilePolicy;
    use crate::scraper::StaticSource;
    use crate::store::{MemoryStore, MemoryStoreError};
    use crate::types::{MatchRecord, NaturalKey, NewViewEvent, Outcome, ViewEvent};
    use std::fs;
    use uuid::Uuid;

    struct FailingSource;

    impl ScheduleSource for FailingSource {
        async fn fetch_schedule(&self) -> Result<String, ScraperError> {
            Err(ScraperError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection timed out",
            )))
        }

        fn describe(&self) -> &str {
            "unreachable"
        }
    }

    /// Memory store that refuses to insert one away team's fixture.
    struct RejectingStore {
        inner: MemoryStore,
        away_team: &'static str,
    }

    impl MatchStore for RejectingStore {
        type Error = MemoryStoreError;

        async fn get_match(&self, id: Uuid) -> Result<Option<MatchRecord>, Self::Error> {
            self.inner.get_match(id).await
        }

        async fn find_by_natural_key(
            &self,
            key: NaturalKey,
        ) -> Result<Option<MatchRecord>, Self::Error> {
            self.inner.find_by_natural_key(key).await
        }

        async fn insert_match(&self, record: MatchRecord) -> Result<(), Self::Error> {
            if record.away_team == self.away_team {
                return Err(MemoryStoreError::DuplicateKey(record.natural_key()));
            }
            self.inner.insert_match(record).await
        }

        async fn update_match(&self, record: MatchRecord) -> Result<(), Self::Error> {
            self.inner.update_match(record).await
        }

        async fn replace_all_matches(
            &self,
            records: Vec<MatchRecord>,
        ) -> Result<usize, Self::Error> {
            self.inner.replace_all_matches(records).await
        }

        async fn delete_match(&self, id: Uuid) -> Result<bool, Self::Error> {
            self.inner.delete_match(id).await
        }

        async fn list_matches(&self) -> Result<Vec<MatchRecord>, Self::Error> {
            self.inner.list_matches().await
        }

        async fn matches_in_year(&self, year: i32) -> Result<Vec<MatchRecord>, Self::Error> {
            self.inner.matches_in_year(year).await
        }

        async fn record_view(&self, view: NewViewEvent) -> Result<ViewEvent, Self::Error> {
            self.inner.record_view(view).await
        }

        async fn count_views(&self) -> Result<u64, Self::Error> {
            self.inner.count_views().await
        }

        async fn count_views_for_match(&self, match_id: Uuid) -> Result<u64, Self::Error> {
            self.inner.count_views_for_match(match_id).await
        }

        async fn count_views_in_year(&self, year: i32) -> Result<u64, Self::Error> {
            self.inner.count_views_in_year(year).await
        }
    }

    fn fixture_source(name: &str) -> StaticSource {
        let html = fs::read_to_string(format!("fixtures/{name}")).expect("Failed to read fixture");
        StaticSource::new(name, html)
    }

    #[tokio::test]
    async fn repeated_runs_are_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(
            IngestConfig::default(),
            store.clone(),
            fixture_source("schedule_items.html"),
        )
        .unwrap();

        let first = ingestor.run_now().await;
        assert!(first.is_success());
        assert_eq!(first.rows_seen, 3);
        assert_eq!(first.parsed, 2);
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped.len(), 1);
        let ids: Vec<_> = store.list_matches().await.unwrap().iter().map(|m| m.id).collect();

        let second = ingestor.run(Trigger::Scheduled).await;
        assert_eq!((second.inserted, second.updated), (0, 2));

        let after = store.list_matches().await.unwrap();
        assert_eq!(after.iter().map(|m| m.id).collect::<Vec<_>>(), ids);
        assert_eq!(after[0].outcome, Outcome::Win);
        assert_eq!(after[1].outcome, Outcome::Draw);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        let seed = Ingestor::new(
            IngestConfig::default(),
            store.clone(),
            fixture_source("schedule_items.html"),
        )
        .unwrap();
        seed.run_now().await;

        let broken = Ingestor::new(IngestConfig::default(), store.clone(), FailingSource).unwrap();
        let report = broken.run_now().await;

        assert!(!report.is_success());
        assert!(report.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.rows_seen, 0);
        assert_eq!(store.list_matches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn preview_does_not_write() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(
            IngestConfig::default(),
            store.clone(),
            fixture_source("schedule_items.html"),
        )
        .unwrap();

        let batch = ingestor.preview().await.unwrap();

        assert_eq!(batch.rows_seen, 3);
        assert_eq!(batch.drafts.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert!(store.list_matches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_page_is_an_empty_batch() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(
            IngestConfig::default(),
            store.clone(),
            StaticSource::new("blank", "<html><body></body></html>"),
        )
        .unwrap();

        let report = ingestor.run_now().await;

        assert!(report.is_success());
        assert_eq!(report.rows_seen, 0);
        assert_eq!(report.inserted, 0);
    }

    #[tokio::test]
    async fn one_failed_write_does_not_abort_the_batch() {
        let store = Arc::new(RejectingStore {
            inner: MemoryStore::new(),
            away_team: "FC大阪",
        });
        let ingestor = Ingestor::new(
            IngestConfig::default(),
            store.clone(),
            fixture_source("schedule_items.html"),
        )
        .unwrap();

        let report = ingestor.run_now().await;

        assert!(report.is_success());
        assert_eq!(report.parsed, 2);
        assert_eq!((report.inserted, report.failed), (1, 1));
        let stored = store.list_matches().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].away_team, "ギラヴァンツ北九州");
    }

    #[tokio::test]
    async fn full_replace_keeps_store_when_page_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let config = IngestConfig {
            policy: ReconcilePolicy::FullReplace,
            ..Default::default()
        };
        let seed = Ingestor::new(
            config.clone(),
            store.clone(),
            fixture_source("schedule_items.html"),
        )
        .unwrap();
        assert!(seed.run_now().await.is_success());

        let renewed = Ingestor::new(
            config,
            store.clone(),
            StaticSource::new("renewal", "<p>renewal</p>"),
        )
        .unwrap();
        let report = renewed.run_now().await;

        assert!(!report.is_success());
        assert_eq!(report.rows_seen, 0);
        assert_eq!(report.deleted, 0);
        assert!(report.error.as_deref().unwrap().contains("no matches"));
        assert_eq!(store.list_matches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_replace_error_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let config = IngestConfig {
            policy: ReconcilePolicy::FullReplace,
            ..Default::default()
        };
        let ingestor =
            Ingestor::new(config, store.clone(), fixture_source("schedule_items.html")).unwrap();
        ingestor.run_now().await;
        let id = store.list_matches().await.unwrap()[0].id;
        store
            .record_view(NewViewEvent {
                match_id: id,
                user_id: None,
                ip_address: None,
            })
            .await
            .unwrap();

        let report = ingestor.run_now().await;

        assert!(!report.is_success());
        assert_eq!(report.parsed, 2);
        assert!(store.get_match(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = Arc::new(
            Ingestor::new(
                IngestConfig::default(),
                store.clone(),
                fixture_source("schedule_items.html"),
            )
            .unwrap(),
        );

        let a = tokio::spawn({
            let ingestor = ingestor.clone();
            async move { ingestor.run(Trigger::Scheduled).await }
        });
        let b = tokio::spawn({
            let ingestor = ingestor.clone();
            async move { ingestor.run_now().await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.inserted + b.inserted, 2);
        assert_eq!(a.updated + b.updated, 2);
        assert_eq!(store.list_matches().await.unwrap().len(), 2);
    }
}
