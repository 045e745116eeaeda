use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
    #[error("Invalid schedule time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("User agent must not be empty")]
    EmptyUserAgent,
    #[error("Invalid timeout {0}s, expected 1 to 300")]
    InvalidTimeout(u64),
}

const MAX_TIMEOUT_SECS: u64 = 300;

/// How parsed drafts are merged into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Update matches in place by natural key, insert the rest.
    #[default]
    Incremental,
    /// Delete every match and insert the current batch with new ids.
    FullReplace,
}

/// What to do with a row whose date matches none of the known formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFallback {
    #[default]
    Skip,
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub time: String,
    /// IANA timezone name the time is interpreted in.
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: "12:00".to_string(),
            timezone: "Asia/Tokyo".to_string(),
        }
    }
}

impl ScheduleConfig {
    pub fn fire_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidTime(self.time.clone()))
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub source_url: String,
    /// Relative links in the schedule are resolved against this.
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub tracked_team: String,
    pub default_competition: String,
    pub policy: ReconcilePolicy,
    pub unparsable_date: DateFallback,
    pub schedule: ScheduleConfig,
    pub stats_start_year: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_url: crate::SCHEDULE_URL.to_string(),
            base_url: crate::BASE_URL.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 10,
            tracked_team: crate::TRACKED_TEAM.to_string(),
            default_competition: crate::DEFAULT_COMPETITION.to_string(),
            policy: ReconcilePolicy::default(),
            unparsable_date: DateFallback::default(),
            schedule: ScheduleConfig::default(),
            stats_start_year: 2023,
        }
    }
}

impl IngestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyUserAgent);
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }
        self.schedule.fire_time()?;
        self.schedule.tz()?;
        Ok(self)
    }
}
