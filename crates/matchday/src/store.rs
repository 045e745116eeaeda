//! The persistence seam consumed by ingestion and statistics.
//!
//! The match table is written only by the reconciler and by explicit
//! administrative deletes; view events are append-only.

use std::future::Future;

use chrono::{Datelike, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{MatchRecord, NaturalKey, NewViewEvent, ViewEvent};

pub trait MatchStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_match(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<MatchRecord>, Self::Error>> + Send + '_;

    fn find_by_natural_key(
        &self,
        key: NaturalKey,
    ) -> impl Future<Output = Result<Option<MatchRecord>, Self::Error>> + Send + '_;

    /// Fails if a match with the same natural key already exists.
    fn insert_match(
        &self,
        record: MatchRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

    /// Overwrites the match with `record.id`; fails if it does not exist.
    fn update_match(
        &self,
        record: MatchRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

    /// Deletes every match and inserts `records` as one atomic step.
    /// Returns how many matches were deleted. Fails without writing if any
    /// view event exists.
    fn replace_all_matches(
        &self,
        records: Vec<MatchRecord>,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

    /// Returns `false` if no such match existed. Fails if any view event
    /// references the match.
    fn delete_match(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

    /// All matches, latest kickoff first.
    fn list_matches(&self) -> impl Future<Output = Result<Vec<MatchRecord>, Self::Error>> + Send + '_;

    fn matches_in_year(
        &self,
        year: i32,
    ) -> impl Future<Output = Result<Vec<MatchRecord>, Self::Error>> + Send + '_;

    /// Fails if `view.match_id` does not exist.
    fn record_view(
        &self,
        view: NewViewEvent,
    ) -> impl Future<Output = Result<ViewEvent, Self::Error>> + Send + '_;

    fn count_views(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

    fn count_views_for_match(
        &self,
        match_id: Uuid,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

    /// Views whose match kicks off in `year`.
    fn count_views_in_year(
        &self,
        year: i32,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("match not found: {0}")]
    MatchNotFound(Uuid),
    #[error("a match already exists for {0}")]
    DuplicateKey(NaturalKey),
    #[error("match {id} still has {views} view event(s)")]
    MatchHasViews { id: Uuid, views: u64 },
    #[error("{0} view event(s) still reference stored matches")]
    ViewsExist(u64),
}

#[derive(Debug, Default)]
struct MemoryState {
    matches: Vec<MatchRecord>,
    views: Vec<ViewEvent>,
}

/// Store kept entirely in process memory; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn get_match(&self, id: Uuid) -> Result<Option<MatchRecord>, Self::Error> {
        let state = self.state.read().await;
        Ok(state.matches.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_natural_key(&self, key: NaturalKey) -> Result<Option<MatchRecord>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .iter()
            .find(|m| m.natural_key() == key)
            .cloned())
    }

    async fn insert_match(&self, record: MatchRecord) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        let key = record.natural_key();
        if state.matches.iter().any(|m| m.natural_key() == key) {
            return Err(MemoryStoreError::DuplicateKey(key));
        }
        state.matches.push(record);
        Ok(())
    }

    async fn update_match(&self, record: MatchRecord) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        let slot = state
            .matches
            .iter_mut()
            .find(|m| m.id == record.id)
            .ok_or(MemoryStoreError::MatchNotFound(record.id))?;
        *slot = record;
        Ok(())
    }

    async fn replace_all_matches(&self, records: Vec<MatchRecord>) -> Result<usize, Self::Error> {
        let mut state = self.state.write().await;
        if !state.views.is_empty() {
            return Err(MemoryStoreError::ViewsExist(state.views.len() as u64));
        }
        let deleted = state.matches.len();
        state.matches = records;
        Ok(deleted)
    }

    async fn delete_match(&self, id: Uuid) -> Result<bool, Self::Error> {
        let mut state = self.state.write().await;
        let views = state.views.iter().filter(|v| v.match_id == id).count() as u64;
        if views > 0 {
            return Err(MemoryStoreError::MatchHasViews { id, views });
        }
        let before = state.matches.len();
        state.matches.retain(|m| m.id != id);
        Ok(state.matches.len() != before)
    }

    async fn list_matches(&self) -> Result<Vec<MatchRecord>, Self::Error> {
        let state = self.state.read().await;
        let mut matches = state.matches.clone();
        matches.sort_by(|a, b| b.match_date.cmp(&a.match_date));
        Ok(matches)
    }

    async fn matches_in_year(&self, year: i32) -> Result<Vec<MatchRecord>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.year() == year)
            .cloned()
            .collect())
    }

    async fn record_view(&self, view: NewViewEvent) -> Result<ViewEvent, Self::Error> {
        let mut state = self.state.write().await;
        if !state.matches.iter().any(|m| m.id == view.match_id) {
            return Err(MemoryStoreError::MatchNotFound(view.match_id));
        }
        let event = view.into_event(Utc::now());
        state.views.push(event.clone());
        Ok(event)
    }

    async fn count_views(&self) -> Result<u64, Self::Error> {
        Ok(self.state.read().await.views.len() as u64)
    }

    async fn count_views_for_match(&self, match_id: Uuid) -> Result<u64, Self::Error> {
        let state = self.state.read().await;
        Ok(state.views.iter().filter(|v| v.match_id == match_id).count() as u64)
    }

    async fn count_views_in_year(&self, year: i32) -> Result<u64, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .views
            .iter()
            .filter(|v| {
                state
                    .matches
                    .iter()
                    .any(|m| m.id == v.match_id && m.match_date.year() == year)
            })
            .count() as u64)
    }
}
