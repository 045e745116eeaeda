use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome;

#[derive(Debug, thiserror::Error)]
#[error("Invalid location '{0}'. Accepted values: 'HOME', 'AWAY'")]
pub struct LocationParseError(String);

#[derive(Debug, thiserror::Error)]
#[error("Invalid outcome '{0}'. Accepted values: 'WIN', 'LOSE', 'DRAW', 'SCHEDULED'")]
pub struct OutcomeParseError(String);

/// Venue of a match relative to the tracked team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Home,
    Away,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Home => "HOME",
            Location::Away => "AWAY",
        }
    }
}

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("home") || s == "ホーム" => Ok(Location::Home),
            s if s.eq_ignore_ascii_case("away") || s == "アウェイ" => Ok(Location::Away),
            _ => Err(LocationParseError(s.to_string())),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a match from the tracked team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
    Scheduled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Lose => "LOSE",
            Outcome::Draw => "DRAW",
            Outcome::Scheduled => "SCHEDULED",
        }
    }
}

impl FromStr for Outcome {
    type Err = OutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WIN" => Ok(Outcome::Win),
            "LOSE" => Ok(Outcome::Lose),
            "DRAW" => Ok(Outcome::Draw),
            "SCHEDULED" => Ok(Outcome::Scheduled),
            _ => Err(OutcomeParseError(s.to_string())),
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a match across ingestion runs, independent of its storage id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub match_date: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
}

impl Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} vs {}",
            self.match_date.format("%Y-%m-%d %H:%M"),
            self.home_team,
            self.away_team
        )
    }
}

/// A parsed schedule row that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMatch {
    pub round: u32,
    pub match_date: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub location: Location,
    pub stadium: String,
    pub competition: String,
    pub match_info_url: Option<String>,
}

impl DraftMatch {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_date: self.match_date,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        outcome::calculate(self.home_score, self.away_score, self.location)
    }
}

impl Display for DraftMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_card(
            f,
            self.round,
            self.match_date,
            &self.home_team,
            &self.away_team,
            self.home_score.zip(self.away_score),
            self.location,
            self.outcome(),
        )?;
        write!(f, "\n      {} / {}", self.stadium, self.competition)
    }
}

/// A persisted match.
///
/// `outcome` is derived from the scores and location whenever the record is
/// created or updated, and is never set on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub round: u32,
    pub match_date: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub location: Location,
    pub stadium: String,
    pub competition: String,
    pub match_info_url: Option<String>,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Builds a new record with a fresh identity.
    pub fn from_draft(draft: DraftMatch, now: DateTime<Utc>) -> Self {
        let outcome = draft.outcome();
        Self {
            id: Uuid::new_v4(),
            round: draft.round,
            match_date: draft.match_date,
            home_team: draft.home_team,
            away_team: draft.away_team,
            home_score: draft.home_score,
            away_score: draft.away_score,
            location: draft.location,
            stadium: draft.stadium,
            competition: draft.competition,
            match_info_url: draft.match_info_url,
            outcome,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites every mutable field from `draft`, keeping `id` and `created_at`.
    pub fn apply(&mut self, draft: DraftMatch, now: DateTime<Utc>) {
        self.outcome = draft.outcome();
        self.round = draft.round;
        self.match_date = draft.match_date;
        self.home_team = draft.home_team;
        self.away_team = draft.away_team;
        self.home_score = draft.home_score;
        self.away_score = draft.away_score;
        self.location = draft.location;
        self.stadium = draft.stadium;
        self.competition = draft.competition;
        self.match_info_url = draft.match_info_url;
        self.updated_at = now;
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_date: self.match_date,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
        }
    }

    pub fn year(&self) -> i32 {
        self.match_date.year()
    }
}

impl Display for MatchRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_card(
            f,
            self.round,
            self.match_date,
            &self.home_team,
            &self.away_team,
            self.home_score.zip(self.away_score),
            self.location,
            self.outcome,
        )?;
        write!(f, "\n      {} / {}", self.stadium, self.competition)?;
        if let Some(url) = &self.match_info_url {
            write!(f, "\n      {}", url)?;
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn write_card(
    f: &mut std::fmt::Formatter<'_>,
    round: u32,
    date: NaiveDateTime,
    home: &str,
    away: &str,
    score: Option<(u32, u32)>,
    location: Location,
    outcome: Outcome,
) -> std::fmt::Result {
    let score = match score {
        Some((h, a)) => format!("{} - {}", h, a),
        None => "vs".to_string(),
    };
    write!(
        f,
        "[R{:>2}] {} {} {} {} ({}) {}",
        round,
        date.format("%Y-%m-%d %H:%M"),
        home,
        score,
        away,
        location,
        outcome
    )
}

/// A single recorded page view of a match. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub id: Uuid,
    pub match_id: Uuid,
    pub viewed_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewViewEvent {
    pub match_id: Uuid,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl NewViewEvent {
    pub fn into_event(self, now: DateTime<Utc>) -> ViewEvent {
        ViewEvent {
            id: Uuid::new_v4(),
            match_id: self.match_id,
            viewed_at: now,
            user_id: self.user_id,
            ip_address: self.ip_address,
        }
    }
}

/// Per-year totals for the tracked team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearlyStats {
    pub year: i32,
    pub total_views: u64,
    pub total_matches: u64,
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl YearlyStats {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }
}

impl Display for YearlyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} match(es), {} view(s), W{} D{} L{}",
            self.year, self.total_matches, self.total_views, self.wins, self.draws, self.losses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> DraftMatch {
        DraftMatch {
            round: 10,
            match_date: NaiveDate::from_ymd_opt(2026, 10, 25)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            home_team: "北九州".into(),
            away_team: "長野".into(),
            home_score: Some(2),
            away_score: Some(0),
            location: Location::Home,
            stadium: "北九州スタジアム".into(),
            competition: "J3リーグ".into(),
            match_info_url: None,
        }
    }

    #[test]
    fn test_location_from_str() {
        assert_eq!("HOME".parse::<Location>().unwrap(), Location::Home);
        assert_eq!(" away ".parse::<Location>().unwrap(), Location::Away);
        assert_eq!("ホーム".parse::<Location>().unwrap(), Location::Home);
        assert!("neutral".parse::<Location>().is_err());
    }

    #[test]
    fn test_outcome_round_trips_through_str() {
        for outcome in [Outcome::Win, Outcome::Lose, Outcome::Draw, Outcome::Scheduled] {
            assert_eq!(outcome.as_str().parse::<Outcome>().unwrap(), outcome);
        }
    }

    #[test]
    fn test_apply_keeps_identity_and_recomputes_outcome() {
        let created = Utc::now();
        let mut record = MatchRecord::from_draft(draft(), created);
        let id = record.id;
        assert_eq!(record.outcome, Outcome::Win);

        let mut changed = draft();
        changed.home_score = Some(0);
        changed.away_score = Some(1);
        let later = created + chrono::Duration::minutes(5);
        record.apply(changed, later);

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.outcome, Outcome::Lose);
    }

    #[test]
    fn test_natural_key_matches_between_draft_and_record() {
        let record = MatchRecord::from_draft(draft(), Utc::now());
        assert_eq!(record.natural_key(), draft().natural_key());
    }
}
