use crate::types::{MatchRecord, Outcome};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
pub struct MatchFilter {
    /// Exact competition name, e.g. "J3リーグ"
    pub competition: Option<String>,
    pub round: Option<u32>,
    pub year: Option<i32>,
    /// Inclusive, YYYY-MM-DD
    pub start_date: Option<NaiveDate>,
    /// Inclusive, YYYY-MM-DD
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MatchFilter {
    /// Expects `matches` latest first, as the store lists them.
    pub fn apply(self, mut matches: Vec<MatchRecord>) -> Vec<MatchRecord> {
        if let Some(competition) = &self.competition {
            matches.retain(|m| &m.competition == competition);
        }
        if let Some(round) = self.round {
            matches.retain(|m| m.round == round);
        }
        if let Some(year) = self.year {
            matches.retain(|m| m.year() == year);
        }
        if let Some(start) = self.start_date {
            matches.retain(|m| m.match_date.date() >= start);
        }
        if let Some(end) = self.end_date {
            matches.retain(|m| m.match_date.date() <= end);
        }
        if let Some(off) = self.offset {
            matches = matches.into_iter().skip(off).collect();
        }
        if let Some(lim) = self.limit {
            matches.truncate(lim);
        }
        matches
    }

    pub fn validate(self) -> Result<Self, String> {
        if let Some(start) = self.start_date
            && let Some(end) = self.end_date
            && start > end
        {
            return Err(format!(
                "Start date ({start}) cannot be after end date ({end})"
            ));
        }
        if self.round.is_some_and(|r| r == 0) {
            return Err("Round must be greater than 0".to_string());
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MatchSummary {
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub scheduled: usize,
    pub total: usize,
}

impl MatchSummary {
    pub fn from_matches(matches: &[MatchRecord]) -> MatchSummary {
        let count = |outcome: Outcome| matches.iter().filter(|m| m.outcome == outcome).count();
        MatchSummary {
            wins: count(Outcome::Win),
            draws: count(Outcome::Draw),
            losses: count(Outcome::Lose),
            scheduled: count(Outcome::Scheduled),
            total: matches.len(),
        }
    }
}

impl std::fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Wins:      {}", self.wins)?;
        writeln!(f, "  Draws:     {}", self.draws)?;
        writeln!(f, "  Losses:    {}", self.losses)?;
        writeln!(f, "  Scheduled: {}", self.scheduled)?;
        writeln!(f, "  Total:     {}", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DraftMatch, Location};
    use chrono::Utc;

    fn matches() -> Vec<MatchRecord> {
        let mk = |round: u32, month: u32, competition: &str, score: Option<(u32, u32)>| {
            MatchRecord::from_draft(
                DraftMatch {
                    round,
                    match_date: NaiveDate::from_ymd_opt(2025, month, 1)
                        .unwrap()
                        .and_hms_opt(14, 0, 0)
                        .unwrap(),
                    home_team: "北九州".into(),
                    away_team: format!("相手{round}"),
                    home_score: score.map(|s| s.0),
                    away_score: score.map(|s| s.1),
                    location: Location::Home,
                    stadium: String::new(),
                    competition: competition.into(),
                    match_info_url: None,
                },
                Utc::now(),
            )
        };
        vec![
            mk(4, 9, "J3リーグ", None),
            mk(3, 6, "YBCルヴァンカップ", Some((0, 2))),
            mk(2, 4, "J3リーグ", Some((1, 1))),
            mk(1, 3, "J3リーグ", Some((2, 0))),
        ]
    }

    #[test]
    fn test_filter_by_competition_and_round() {
        let filter = MatchFilter {
            competition: Some("J3リーグ".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(matches()).len(), 3);

        let filter = MatchFilter {
            round: Some(3),
            ..Default::default()
        };
        let found = filter.apply(matches());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].competition, "YBCルヴァンカップ");
    }

    #[test]
    fn test_filter_date_range_with_paging() {
        let filter = MatchFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 9, 1),
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let found = filter.apply(matches());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].round, 3);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let filter = MatchFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
        assert!(
            MatchFilter {
                limit: Some(0),
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let summary = MatchSummary::from_matches(&matches());
        assert_eq!(
            summary,
            MatchSummary {
                wins: 1,
                draws: 1,
                losses: 1,
                scheduled: 1,
                total: 4,
            }
        );
    }
}
