use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReconcilePolicy;
use crate::store::MatchStore;
use crate::types::{DraftMatch, MatchRecord};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(String),
    #[error("Full replace refused: {0} view event(s) still reference existing matches")]
    ReplaceWouldOrphanViews(u64),
    #[error("Full replace refused: the batch has no matches")]
    EmptyBatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Drafts whose individual write failed; the rest of the batch still ran.
    pub failed: usize,
    /// Matches removed by a full replace.
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upserted {
    Inserted,
    Updated,
}

/// Merges parsed drafts into the store under one policy.
///
/// Takes `&mut self` so callers must hold exclusive access for the whole
/// batch; the ingestion pipeline keeps it behind its run lock.
#[derive(Debug)]
pub struct Reconciler<S> {
    store: Arc<S>,
    policy: ReconcilePolicy,
}

impl<S: MatchStore> Reconciler<S> {
    pub fn new(store: Arc<S>, policy: ReconcilePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    pub async fn reconcile(
        &mut self,
        drafts: Vec<DraftMatch>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileSummary, ReconcileError> {
        match self.policy {
            ReconcilePolicy::Incremental => Ok(self.upsert_all(drafts, now).await),
            ReconcilePolicy::FullReplace => self.replace_all(drafts, now).await,
        }
    }

    async fn upsert_all(&self, drafts: Vec<DraftMatch>, now: DateTime<Utc>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for draft in drafts {
            let key = draft.natural_key();
            match self.upsert(draft, now).await {
                Ok(Upserted::Inserted) => {
                    log::debug!("Inserted {}", key);
                    summary.inserted += 1;
                }
                Ok(Upserted::Updated) => {
                    log::debug!("Updated {}", key);
                    summary.updated += 1;
                }
                Err(e) => {
                    log::error!("Failed to store {}: {}", key, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn upsert(&self, draft: DraftMatch, now: DateTime<Utc>) -> Result<Upserted, S::Error> {
        match self.store.find_by_natural_key(draft.natural_key()).await? {
            Some(mut existing) => {
                existing.apply(draft, now);
                self.store.update_match(existing).await?;
                Ok(Upserted::Updated)
            }
            None => {
                self.store
                    .insert_match(MatchRecord::from_draft(draft, now))
                    .await?;
                Ok(Upserted::Inserted)
            }
        }
    }

    async fn replace_all(
        &self,
        drafts: Vec<DraftMatch>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileSummary, ReconcileError> {
        // A page that yields no rows is a layout change, not an empty season.
        if drafts.is_empty() {
            return Err(ReconcileError::EmptyBatch);
        }

        let views = self
            .store
            .count_views()
            .await
            .map_err(|e| ReconcileError::Store(e.to_string()))?;
        if views > 0 {
            return Err(ReconcileError::ReplaceWouldOrphanViews(views));
        }

        // Later rows win when the page lists the same fixture twice.
        let mut by_key: HashMap<_, usize> = HashMap::new();
        let mut records: Vec<MatchRecord> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let key = draft.natural_key();
            let record = MatchRecord::from_draft(draft, now);
            match by_key.get(&key) {
                Some(&i) => records[i] = record,
                None => {
                    by_key.insert(key, records.len());
                    records.push(record);
                }
            }
        }

        let inserted = records.len();
        let deleted = self
            .store
            .replace_all_matches(records)
            .await
            .map_err(|e| ReconcileError::Store(e.to_string()))?;

        log::info!("Replaced {} match(es) with {}", deleted, inserted);

        Ok(ReconcileSummary {
            inserted,
            deleted,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Location, NewViewEvent, Outcome};
    use chrono::NaiveDate;

    fn draft(day: u32, away: &str, score: Option<(u32, u32)>) -> DraftMatch {
        DraftMatch {
            round: day,
            match_date: NaiveDate::from_ymd_opt(2026, 10, day)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            home_team: "北九州".into(),
            away_team: away.into(),
            home_score: score.map(|s| s.0),
            away_score: score.map(|s| s.1),
            location: Location::Home,
            stadium: "北九州スタジアム".into(),
            competition: "J3リーグ".into(),
            match_info_url: None,
        }
    }

    #[tokio::test]
    async fn incremental_updates_in_place() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = Reconciler::new(store.clone(), ReconcilePolicy::Incremental);

        let first = reconciler
            .reconcile(vec![draft(25, "長野", None), draft(26, "岐阜", None)], Utc::now())
            .await
            .unwrap();
        assert_eq!((first.inserted, first.updated), (2, 0));
        let before = store
            .find_by_natural_key(draft(25, "長野", None).natural_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.outcome, Outcome::Scheduled);

        let second = reconciler
            .reconcile(vec![draft(25, "長野", Some((2, 0)))], Utc::now())
            .await
            .unwrap();
        assert_eq!((second.inserted, second.updated), (0, 1));

        let after = store.get_match(before.id).await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.outcome, Outcome::Win);
        assert_eq!(store.list_matches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn incremental_keeps_view_references() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = Reconciler::new(store.clone(), ReconcilePolicy::Incremental);
        reconciler
            .reconcile(vec![draft(25, "長野", None)], Utc::now())
            .await
            .unwrap();
        let id = store.list_matches().await.unwrap()[0].id;
        store
            .record_view(NewViewEvent {
                match_id: id,
                user_id: None,
                ip_address: None,
            })
            .await
            .unwrap();

        reconciler
            .reconcile(vec![draft(25, "長野", Some((0, 1)))], Utc::now())
            .await
            .unwrap();

        assert_eq!(store.count_views_for_match(id).await.unwrap(), 1);
        assert_eq!(store.count_views_in_year(2026).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn full_replace_assigns_new_ids() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = Reconciler::new(store.clone(), ReconcilePolicy::FullReplace);

        reconciler
            .reconcile(vec![draft(25, "長野", None)], Utc::now())
            .await
            .unwrap();
        let old_id = store.list_matches().await.unwrap()[0].id;

        let summary = reconciler
            .reconcile(
                vec![draft(25, "長野", Some((1, 1))), draft(25, "長野", Some((2, 1)))],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.inserted, 1);

        let all = store.list_matches().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_ne!(all[0].id, old_id);
        assert_eq!(all[0].outcome, Outcome::Win);
    }

    #[tokio::test]
    async fn full_replace_refuses_to_orphan_views() {
        let store = Arc::new(MemoryStore::new());
        let mut reconciler = Reconciler::new(store.clone(), ReconcilePolicy::FullReplace);
        reconciler
            .reconcile(vec![draft(25, "長野", None)], Utc::now())
            .await
            .unwrap();
        let id = store.list_matches().await.unwrap()[0].id;
        store
            .record_view(NewViewEvent {
                match_id: id,
                user_id: None,
                ip_address: None,
            })
            .await
            .unwrap();

        let err = reconciler
            .reconcile(vec![draft(25, "長野", Some((1, 0)))], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ReplaceWouldOrphanViews(1)));
        assert_eq!(store.get_match(id).await.unwrap().unwrap().outcome, Outcome::Scheduled);
    }
}
