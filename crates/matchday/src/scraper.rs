use std::future::Future;
use std::path::Path;

use reqwest::Client;

use crate::config::IngestConfig;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Failed to read schedule file: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can hand the pipeline one schedule document per run.
pub trait ScheduleSource: Send + Sync {
    fn fetch_schedule(&self) -> impl Future<Output = Result<String, ScraperError>> + Send + '_;

    /// Where the document comes from, for logging.
    fn describe(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    source_url: String,
}

impl WebScraper {
    pub fn new(config: &IngestConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            source_url: config.source_url.clone(),
        })
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| {
                if e.is_timeout() {
                    log::error!("Timed out fetching {url}");
                } else {
                    log::error!("HTTP error: {e:?}");
                }
            })?
            .error_for_status()
            .inspect_err(|e| log::error!("Bad status from {url}: {e}"))?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

impl ScheduleSource for WebScraper {
    async fn fetch_schedule(&self) -> Result<String, ScraperError> {
        log::info!("Fetching match schedule from {}...", self.source_url);
        self.get_html(&self.source_url).await
    }

    fn describe(&self) -> &str {
        &self.source_url
    }
}

/// A schedule page captured ahead of time, e.g. a saved copy of the site.
#[derive(Debug, Clone)]
pub struct StaticSource {
    label: String,
    html: String,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            html: html.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), html))
    }
}

impl ScheduleSource for StaticSource {
    async fn fetch_schedule(&self) -> Result<String, ScraperError> {
        Ok(self.html.clone())
    }

    fn describe(&self) -> &str {
        &self.label
    }
}
