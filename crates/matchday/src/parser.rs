use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::{DateFallback, IngestConfig};
use crate::extract::{RawRow, RowLayout};
use crate::types::{DraftMatch, Location};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("No round number in '{0}'")]
    RoundParse(String),
    #[error("Failed to parse date: {0}")]
    DateParse(String),
    #[error("Failed to split teams from '{0}'")]
    TeamsParse(String),
    #[error("Neither '{home}' nor '{away}' is the tracked team")]
    NotTrackedTeam { home: String, away: String },
    #[error("Failed to resolve URL: {0}")]
    UrlParse(String),
}

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("invalid regex: number"));

static RE_DATE_JA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日.*?(\d{1,2})\s*[:：]\s*(\d{2})")
        .expect("invalid regex: japanese date")
});

static RE_DATE_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\D+?(\d{1,2}):(\d{2})")
        .expect("invalid regex: numeric date")
});

static RE_DATE_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[./](\d{1,2}).*?(\d{1,2}):(\d{2})").expect("invalid regex: short date")
});

static RE_TEAM_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vs|VS|:|-").expect("invalid regex: team separator"));

static RE_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[:\-]\s*(\d+)").expect("invalid regex: score"));

/// Everything the row parser needs besides the row itself.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Local wall-clock time of the run; drives year inference.
    pub now: NaiveDateTime,
    pub tracked_team: String,
    pub default_competition: String,
    pub base_url: String,
    pub unparsable_date: DateFallback,
}

impl ParseContext {
    pub fn from_config(config: &IngestConfig, now: NaiveDateTime) -> Self {
        Self {
            now,
            tracked_team: config.tracked_team.clone(),
            default_competition: config.default_competition.clone(),
            base_url: config.base_url.clone(),
            unparsable_date: config.unparsable_date,
        }
    }

    fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

/// A row that did not become a draft, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: String,
}

pub type RowResult = Result<DraftMatch, SkippedRow>;

/// Parses every row independently; a bad row never affects its neighbours.
pub fn parse_rows(rows: &[RawRow], ctx: &ParseContext) -> Vec<RowResult> {
    rows.iter()
        .map(|row| {
            parse_row(row, ctx).map_err(|e| {
                log::warn!("Skipping row {}: {}", row.index, e);
                SkippedRow {
                    index: row.index,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

pub fn parse_row(row: &RawRow, ctx: &ParseContext) -> Result<DraftMatch, ParseError> {
    let round_text = row.round.as_deref().ok_or(ParseError::MissingField("round"))?;
    let round = parse_round(round_text)?;

    let date_text = row.date.as_deref().ok_or(ParseError::MissingField("date"))?;
    let match_date = match parse_match_date(date_text, ctx.today()) {
        Ok(date) => date,
        Err(e) => match ctx.unparsable_date {
            DateFallback::Skip => return Err(e),
            DateFallback::CurrentTimestamp => {
                log::warn!(
                    "Row {}: {}; falling back to current time {}",
                    row.index,
                    e,
                    ctx.now
                );
                truncate_to_minute(ctx.now)
            }
        },
    };

    let (home_team, away_team, score_text) = match row.layout {
        RowLayout::Table => {
            let card = row.card.as_deref().ok_or(ParseError::MissingField("card"))?;
            let (home, away) = parse_teams(card)?;
            (home, away, Some(card))
        }
        RowLayout::Item => {
            let home = row
                .home_team
                .clone()
                .ok_or(ParseError::MissingField("home_team"))?;
            let away = row
                .away_team
                .clone()
                .ok_or(ParseError::MissingField("away_team"))?;
            if !home.contains(&ctx.tracked_team) && !away.contains(&ctx.tracked_team) {
                return Err(ParseError::NotTrackedTeam { home, away });
            }
            (home, away, row.score.as_deref())
        }
    };

    let (home_score, away_score) = score_text.and_then(parse_score).unzip();

    let location = row
        .location
        .as_deref()
        .and_then(|l| l.parse::<Location>().ok())
        .unwrap_or_else(|| {
            let inferred = infer_location(&home_team, &ctx.tracked_team);
            log::debug!("Row {}: inferred location {}", row.index, inferred);
            inferred
        });

    let stadium = row.stadium.clone().unwrap_or_default();

    let competition = row
        .competition
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| ctx.default_competition.clone());

    let match_info_url = row.href.as_deref().and_then(|href| {
        resolve_url(&ctx.base_url, href)
            .inspect_err(|e| log::warn!("Row {}: {}", row.index, e))
            .ok()
    });

    Ok(DraftMatch {
        round,
        match_date,
        home_team,
        away_team,
        home_score,
        away_score,
        location,
        stadium,
        competition,
        match_info_url,
    })
}

/// First run of digits in the round cell, e.g. `第10節` → 10.
fn parse_round(text: &str) -> Result<u32, ParseError> {
    RE_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ParseError::RoundParse(text.to_string()))
}

/// Accepts `YYYY年M月D日 H:MM`, `YYYY-MM-DD HH:MM` (or `/`, `.`) and the
/// year-less `M.D(曜)H:MM`. Without a year, a month earlier than today's
/// belongs to next year.
pub fn parse_match_date(text: &str, today: NaiveDate) -> Result<NaiveDateTime, ParseError> {
    let captures = RE_DATE_JA
        .captures(text)
        .or_else(|| RE_DATE_NUMERIC.captures(text));

    let (year, month, day, hour, minute) = if let Some(caps) = captures {
        (
            caps[1].parse::<i32>().ok(),
            caps[2].parse::<u32>().ok(),
            caps[3].parse::<u32>().ok(),
            caps[4].parse::<u32>().ok(),
            caps[5].parse::<u32>().ok(),
        )
    } else if let Some(caps) = RE_DATE_SHORT.captures(text) {
        let month = caps[1].parse::<u32>().ok();
        (
            month.map(|m| infer_year(m, today)),
            month,
            caps[2].parse::<u32>().ok(),
            caps[3].parse::<u32>().ok(),
            caps[4].parse::<u32>().ok(),
        )
    } else {
        return Err(ParseError::DateParse(format!("No date pattern in '{}'", text)));
    };

    let (Some(year), Some(month), Some(day), Some(hour), Some(minute)) =
        (year, month, day, hour, minute)
    else {
        return Err(ParseError::DateParse(format!("Invalid number in '{}'", text)));
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ParseError::DateParse(format!("Invalid date: {}-{}-{}", year, month, day))
    })?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ParseError::DateParse(format!("Invalid time: {}:{:02}", hour, minute)))?;

    Ok(date.and_time(time))
}

pub fn infer_year(month: u32, today: NaiveDate) -> i32 {
    if month < today.month() {
        today.year() + 1
    } else {
        today.year()
    }
}

fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Splits a match card such as `北九州 2:0 長野` into home and away names.
pub fn parse_teams(card: &str) -> Result<(String, String), ParseError> {
    let tokens: Vec<String> = RE_TEAM_SEPARATOR
        .split(card)
        .map(|part| {
            part.chars()
                .filter(|c| !c.is_ascii_digit())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect();

    match <[String; 2]>::try_from(tokens) {
        Ok([home, away]) => Ok((home, away)),
        Err(_) => Err(ParseError::TeamsParse(card.to_string())),
    }
}

/// `None` means the fixture has not been played yet.
pub fn parse_score(text: &str) -> Option<(u32, u32)> {
    let caps = RE_SCORE.captures(text)?;
    let home = caps[1].parse().ok()?;
    let away = caps[2].parse().ok()?;
    Some((home, away))
}

fn infer_location(home_team: &str, tracked_team: &str) -> Location {
    if home_team.contains(tracked_team) {
        Location::Home
    } else {
        Location::Away
    }
}

fn resolve_url(base_url: &str, href: &str) -> Result<String, ParseError> {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(String::from)
        .map_err(|e| ParseError::UrlParse(format!("{} against {}: {}", href, base_url, e)))
}
