pub mod analytics;
pub mod config;
pub mod extract;
pub mod ingest;
pub mod outcome;
pub mod parser;
pub mod reconcile;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod types;
pub mod utils;

pub use analytics::Analytics;
pub use config::IngestConfig;
pub use ingest::{Ingestor, ParsedBatch, RunReport, Trigger};
pub use scheduler::DailyScheduler;
pub use scraper::{ScheduleSource, StaticSource, WebScraper};
pub use store::{MatchStore, MemoryStore};

pub const SCHEDULE_URL: &str = "https://www.giravanz.jp/game/schedule.html";
pub const BASE_URL: &str = "https://www.giravanz.jp";

/// Name fragment identifying the tracked club in fixture cards.
pub const TRACKED_TEAM: &str = "北九州";
pub const DEFAULT_COMPETITION: &str = "J3リーグ";
