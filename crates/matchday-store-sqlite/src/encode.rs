//! Conversions between domain types and the text columns SQLite stores.
//!
//! Instants are RFC 3339, kickoff times are naive ISO 8601 so that the
//! `match_date` column sorts chronologically as text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use matchday::types::{Location, MatchRecord, Outcome};
use uuid::Uuid;

use crate::{Error, Result};

const MATCH_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const MATCH_COLUMNS: &str = "match_id, round, match_date, home_team, away_team, \
    home_score, away_score, location, stadium, competition, match_info_url, outcome, \
    created_at, updated_at";

pub fn encode_uuid(id: Uuid) -> String {
    id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_match_date(dt: NaiveDateTime) -> String {
    dt.format(MATCH_DATE_FORMAT).to_string()
}

pub fn decode_match_date(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, MATCH_DATE_FORMAT)
        .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// Half-open `[start, end)` bounds of `year` in `match_date` encoding.
pub fn year_bounds(year: i32) -> Result<(String, String)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::DateParse(format!("year out of range: {year}")))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::DateParse(format!("year out of range: {year}")))?;
    Ok((encode_match_date(start), encode_match_date(end)))
}

/// Column values of one `matches` row, in [`MATCH_COLUMNS`] order.
pub struct MatchRow {
    pub match_id: String,
    pub round: u32,
    pub match_date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub location: String,
    pub stadium: String,
    pub competition: String,
    pub match_info_url: Option<String>,
    pub outcome: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MatchRow {
    pub fn from_record(m: &MatchRecord) -> Self {
        Self {
            match_id: encode_uuid(m.id),
            round: m.round,
            match_date: encode_match_date(m.match_date),
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            home_score: m.home_score,
            away_score: m.away_score,
            location: m.location.as_str().to_owned(),
            stadium: m.stadium.clone(),
            competition: m.competition.clone(),
            match_info_url: m.match_info_url.clone(),
            outcome: m.outcome.as_str().to_owned(),
            created_at: encode_dt(m.created_at),
            updated_at: encode_dt(m.updated_at),
        }
    }

    pub fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            match_id: row.get(0)?,
            round: row.get(1)?,
            match_date: row.get(2)?,
            home_team: row.get(3)?,
            away_team: row.get(4)?,
            home_score: row.get(5)?,
            away_score: row.get(6)?,
            location: row.get(7)?,
            stadium: row.get(8)?,
            competition: row.get(9)?,
            match_info_url: row.get(10)?,
            outcome: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO matches ({MATCH_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            rusqlite::params![
                self.match_id,
                self.round,
                self.match_date,
                self.home_team,
                self.away_team,
                self.home_score,
                self.away_score,
                self.location,
                self.stadium,
                self.competition,
                self.match_info_url,
                self.outcome,
                self.created_at,
                self.updated_at,
            ],
        )
    }

    pub fn into_record(self) -> Result<MatchRecord> {
        Ok(MatchRecord {
            id: decode_uuid(&self.match_id)?,
            round: self.round,
            match_date: decode_match_date(&self.match_date)?,
            home_team: self.home_team,
            away_team: self.away_team,
            home_score: self.home_score,
            away_score: self.away_score,
            location: self
                .location
                .parse::<Location>()
                .map_err(|e| Error::Decode(e.to_string()))?,
            stadium: self.stadium,
            competition: self.competition,
            match_info_url: self.match_info_url,
            outcome: self
                .outcome
                .parse::<Outcome>()
                .map_err(|e| Error::Decode(e.to_string()))?,
            created_at: decode_dt(&self.created_at)?,
            updated_at: decode_dt(&self.updated_at)?,
        })
    }
}
