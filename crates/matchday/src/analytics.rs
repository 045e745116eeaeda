use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::outcome;
use crate::store::MatchStore;
use crate::types::{MatchRecord, Outcome, YearlyStats};

/// Read-only yearly reporting over the match and view tables.
///
/// Runs independently of ingestion; a query that overlaps a run may see a
/// partially reconciled batch.
pub struct Analytics<S> {
    store: Arc<S>,
}

impl<S: MatchStore> Analytics<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn yearly_stats(&self, year: i32) -> Result<YearlyStats, S::Error> {
        let (matches, views) = futures::try_join!(
            self.store.matches_in_year(year),
            self.store.count_views_in_year(year)
        )?;

        let mut stats = tally(year, &matches);
        stats.total_views = views;

        log::debug!("Computed stats for {}: {}", year, stats);
        Ok(stats)
    }

    /// One entry per year in `from..=to`, oldest first.
    pub async fn stats_range(&self, from: i32, to: i32) -> Result<Vec<YearlyStats>, S::Error> {
        try_join_all((from..=to).map(|year| self.yearly_stats(year))).await
    }

    pub async fn stats_since(
        &self,
        start_year: i32,
        current_year: i32,
    ) -> Result<Vec<YearlyStats>, S::Error> {
        self.stats_range(start_year, current_year.max(start_year)).await
    }
}

/// Counts matches and results for one year. Outcomes are recomputed from the
/// scores rather than read from the stored column.
pub fn tally(year: i32, matches: &[MatchRecord]) -> YearlyStats {
    let mut stats = YearlyStats::empty(year);
    let mut seen = HashSet::new();

    for m in matches.iter().filter(|m| m.year() == year) {
        if !seen.insert(m.id) {
            continue;
        }
        stats.total_matches += 1;
        match outcome::calculate(m.home_score, m.away_score, m.location) {
            Outcome::Win => stats.wins += 1,
            Outcome::Draw => stats.draws += 1,
            Outcome::Lose => stats.losses += 1,
            Outcome::Scheduled => {}
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{DraftMatch, Location, NewViewEvent};
    use chrono::{NaiveDate, Utc};

    fn record(year: i32, day: u32, location: Location, score: Option<(u32, u32)>) -> MatchRecord {
        MatchRecord::from_draft(
            DraftMatch {
                round: day,
                match_date: NaiveDate::from_ymd_opt(year, 4, day)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap(),
                home_team: "北九州".into(),
                away_team: format!("相手{day}"),
                home_score: score.map(|s| s.0),
                away_score: score.map(|s| s.1),
                location,
                stadium: String::new(),
                competition: "J3リーグ".into(),
                match_info_url: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_tally_uses_location_perspective() {
        let matches = vec![
            record(2025, 1, Location::Home, Some((2, 0))),
            record(2025, 2, Location::Away, Some((2, 0))),
            record(2025, 3, Location::Away, Some((1, 1))),
            record(2025, 4, Location::Home, None),
            record(2024, 5, Location::Home, Some((3, 0))),
        ];

        let stats = tally(2025, &matches);

        assert_eq!(stats.total_matches, 4);
        assert_eq!((stats.wins, stats.draws, stats.losses), (1, 1, 1));
    }

    #[test]
    fn test_tally_ignores_stored_outcome() {
        let mut m = record(2025, 1, Location::Home, Some((0, 3)));
        m.outcome = Outcome::Win;

        let stats = tally(2025, &[m]);

        assert_eq!((stats.wins, stats.losses), (0, 1));
    }

    #[test]
    fn test_tally_counts_each_match_once() {
        let m = record(2025, 1, Location::Home, Some((1, 0)));
        let stats = tally(2025, &[m.clone(), m]);
        assert_eq!(stats.total_matches, 1);
        assert_eq!(stats.wins, 1);
    }

    #[tokio::test]
    async fn empty_year_is_all_zero() {
        let analytics = Analytics::new(Arc::new(MemoryStore::new()));
        let stats = analytics.yearly_stats(1999).await.unwrap();
        assert_eq!(stats, YearlyStats::empty(1999));
    }

    #[tokio::test]
    async fn views_are_attributed_to_match_year() {
        let store = Arc::new(MemoryStore::new());
        let old = record(2024, 10, Location::Home, Some((0, 0)));
        let new = record(2025, 11, Location::Away, Some((0, 1)));
        let (old_id, new_id) = (old.id, new.id);
        store.insert_match(old).await.unwrap();
        store.insert_match(new).await.unwrap();

        for (id, n) in [(old_id, 1), (new_id, 2)] {
            for _ in 0..n {
                store
                    .record_view(NewViewEvent {
                        match_id: id,
                        user_id: None,
                        ip_address: None,
                    })
                    .await
                    .unwrap();
            }
        }

        let analytics = Analytics::new(store);
        let stats = analytics.stats_since(2023, 2025).await.unwrap();

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0], YearlyStats::empty(2023));
        assert_eq!((stats[1].total_views, stats[1].draws), (1, 1));
        assert_eq!((stats[2].total_views, stats[2].wins), (2, 1));
    }
}
