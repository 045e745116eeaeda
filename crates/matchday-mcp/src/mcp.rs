use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use matchday::types::NewViewEvent;
use matchday::utils::MatchFilter;
use matchday::{Analytics, IngestConfig, Ingestor, MatchStore, WebScraper};
use matchday_store_sqlite::SqliteStore;
use rmcp::{
    ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_DB_PATH: &str = "matchday.db";

type SharedIngestor = Arc<Ingestor<SqliteStore, WebScraper>>;

/// Tool surface over one store and one ingestion pipeline.
///
/// Clones share the pipeline, so every session goes through the same run
/// lock as the daily scheduler.
#[derive(Clone)]
pub struct McpServer {
    store: Arc<SqliteStore>,
    ingestor: SharedIngestor,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl McpServer {
    pub fn new(store: Arc<SqliteStore>, ingestor: SharedIngestor) -> Self {
        Self {
            store,
            ingestor,
            tool_router: Self::tool_router(),
        }
    }

    /// Reads `MATCHDAY_CONFIG` (optional TOML file) and `MATCHDAY_DB`.
    pub async fn from_env() -> Result<Self, anyhow::Error> {
        let config = match std::env::var_os("MATCHDAY_CONFIG") {
            Some(path) => IngestConfig::from_file(PathBuf::from(path))?,
            None => IngestConfig::default(),
        };
        let db = std::env::var("MATCHDAY_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.into());

        log::info!("Using match database {}", db);

        let store = Arc::new(SqliteStore::open(&db).await?);
        let scraper = WebScraper::new(&config)?;
        let ingestor = Arc::new(Ingestor::new(config, store.clone(), scraper)?);

        Ok(Self::new(store, ingestor))
    }

    pub fn ingestor(&self) -> &SharedIngestor {
        &self.ingestor
    }

    #[tool(
        name = "run_ingestion",
        description = "Fetch the club's schedule page now and merge it into the match store. Returns a run report with counts of rows seen, inserted, updated and skipped (with reasons), and the error if the run aborted. Waits if a run is already in progress."
    )]
    pub async fn run_ingestion(&self) -> Result<String, McpError> {
        let report = self.ingestor.run_now().await;
        if !report.is_success() {
            log::warn!("Manual ingestion failed: {:?}", report.error);
        }
        to_json(&report, "run report")
    }

    #[tool(
        name = "preview_schedule",
        description = "Fetch and parse the club's schedule page without storing anything. Returns the parsed matches and the rows that were skipped, with reasons."
    )]
    pub async fn preview_schedule(&self) -> Result<String, McpError> {
        let batch = self
            .ingestor
            .preview()
            .await
            .inspect_err(|e| log::error!("Failed to fetch schedule: {e:?}"))
            .map_err(|e| McpError::internal_error(format!("Failed to fetch schedule: {e}"), None))?;

        to_json(&batch, "parsed schedule")
    }

    #[tool(
        name = "list_matches",
        description = "List stored matches, latest first. Supports filtering by competition, round, year and an inclusive date range (YYYY-MM-DD), plus limit and offset."
    )]
    pub async fn list_matches(
        &self,
        Parameters(filter): Parameters<MatchFilter>,
    ) -> Result<String, McpError> {
        let filter = filter
            .validate()
            .inspect_err(|e| log::error!("Invalid params: {e:?}"))
            .map_err(|e| McpError::invalid_params(e, None))?;

        let matches = self
            .store
            .list_matches()
            .await
            .inspect_err(|e| log::error!("Failed to list matches: {e:?}"))
            .map_err(|e| McpError::internal_error(format!("Failed to list matches: {e}"), None))?;

        to_json(&filter.apply(matches), "matches")
    }

    #[tool(
        name = "yearly_stats",
        description = "Season totals for the tracked club: matches, page views, wins, draws and losses. Pass `year` for one season, or omit it for every season from the configured start year to the current year."
    )]
    pub async fn yearly_stats(
        &self,
        Parameters(params): Parameters<YearlyStatsParams>,
    ) -> Result<String, McpError> {
        let analytics = Analytics::new(self.store.clone());

        let stats = match params.year {
            Some(year) => analytics.yearly_stats(year).await.map(|s| vec![s]),
            None => {
                let config = self.ingestor.config();
                let tz = config
                    .schedule
                    .tz()
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                let current_year = Utc::now().with_timezone(&tz).year();
                analytics
                    .stats_since(config.stats_start_year, current_year)
                    .await
            }
        }
        .inspect_err(|e| log::error!("Failed to compute stats: {e:?}"))
        .map_err(|e| McpError::internal_error(format!("Failed to compute stats: {e}"), None))?;

        to_json(&stats, "stats")
    }

    #[tool(
        name = "record_view",
        description = "Record one page view of a stored match. Fails if the match id is unknown."
    )]
    pub async fn record_view(
        &self,
        Parameters(params): Parameters<RecordViewParams>,
    ) -> Result<String, McpError> {
        let match_id = Uuid::parse_str(&params.match_id)
            .map_err(|e| McpError::invalid_params(format!("Invalid match id: {e}"), None))?;

        let event = self
            .store
            .record_view(NewViewEvent {
                match_id,
                user_id: params.user_id,
                ip_address: params.ip_address,
            })
            .await
            .inspect_err(|e| log::error!("Failed to record view: {e:?}"))
            .map_err(|e| McpError::invalid_params(format!("Failed to record view: {e}"), None))?;

        to_json(&event, "view event")
    }
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .inspect_err(|e| log::error!("Serialization error: {e:?}"))
        .map_err(|e| McpError::internal_error(format!("Failed to serialize {what}: {e}"), None))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct YearlyStatsParams {
    year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecordViewParams {
    /// Id of the match, as returned by `list_matches`
    match_id: String,
    user_id: Option<String>,
    ip_address: Option<String>,
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(include_str!("./instructions.md").to_string()),
            ..Default::default()
        }
    }
}
