use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use matchday::config::{IngestConfig, ReconcilePolicy};
use matchday::scraper::ScraperError;
use matchday::types::NewViewEvent;
use matchday::utils::{MatchFilter, MatchSummary};
use matchday::{
    Analytics, DailyScheduler, Ingestor, MatchStore, MemoryStore, RunReport, ScheduleSource,
    StaticSource, WebScraper,
};
use matchday_store_sqlite::SqliteStore;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "matchday")]
#[command(about = "Club match schedule ingestion and season statistics", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        env = "MATCHDAY_DB",
        default_value = "matchday.db",
        global = true,
        help = "Path to the SQLite database"
    )]
    db: PathBuf,

    #[arg(
        short = 'c',
        long,
        env = "MATCHDAY_CONFIG",
        global = true,
        help = "TOML file overriding the default ingestion settings"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum Policy {
    Incremental,
    FullReplace,
}

impl From<Policy> for ReconcilePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Incremental => ReconcilePolicy::Incremental,
            Policy::FullReplace => ReconcilePolicy::FullReplace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline once and print the run report
    Ingest {
        #[arg(long, help = "Read the schedule from a saved HTML file instead of the site")]
        file: Option<PathBuf>,

        #[arg(long, help = "Reconcile into a throwaway in-memory store")]
        dry_run: bool,

        #[arg(long, value_enum, help = "Override the configured reconciliation policy")]
        policy: Option<Policy>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Parse a schedule page and show the drafts without storing anything
    Parse {
        #[arg(help = "Saved schedule HTML; fetches the live page when omitted")]
        file: Option<PathBuf>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Run the daily scheduler until interrupted
    Daemon {
        #[arg(long, help = "Also run once immediately on startup")]
        run_now: bool,
    },
    /// List stored matches with optional filtering and pagination
    List {
        #[arg(
            long,
            help = "Maximum number of results to return",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        limit: Option<u16>,

        #[arg(long, help = "Number of results to skip from the beginning")]
        offset: Option<usize>,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Only matches on or after this date",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        start_date: Option<NaiveDate>,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Only matches on or before this date",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        end_date: Option<NaiveDate>,

        #[arg(long, help = "Filter by competition name")]
        competition: Option<String>,

        #[arg(long, help = "Filter by round number")]
        round: Option<u32>,

        #[arg(long, help = "Filter by season year")]
        year: Option<i32>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Record a page view of a match
    View {
        #[arg(help = "Id of the viewed match")]
        match_id: Uuid,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        ip_address: Option<String>,
    },
    /// Per-year match, view and result totals
    Stats {
        #[arg(long, help = "Single year; defaults to every year since the configured start")]
        year: Option<i32>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Delete one match by id (administrative)
    Delete {
        #[arg(help = "Id of the match to delete")]
        match_id: Uuid,
    },
}

/// Where the schedule document comes from for this invocation.
enum Source {
    Web(WebScraper),
    File(StaticSource),
}

impl Source {
    fn new(file: Option<PathBuf>, config: &IngestConfig) -> Result<Self, ScraperError> {
        match file {
            Some(path) => Ok(Source::File(StaticSource::from_file(path)?)),
            None => Ok(Source::Web(WebScraper::new(config)?)),
        }
    }
}

impl ScheduleSource for Source {
    async fn fetch_schedule(&self) -> Result<String, ScraperError> {
        match self {
            Source::Web(s) => s.fetch_schedule().await,
            Source::File(s) => s.fetch_schedule().await,
        }
    }

    fn describe(&self) -> &str {
        match self {
            Source::Web(s) => s.describe(),
            Source::File(s) => s.describe(),
        }
    }
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> IngestConfig {
    match path {
        Some(path) => IngestConfig::from_file(path).unwrap_or_else(|e| {
            log::error!("Error loading config from {}: {}", path.display(), e);
            process::exit(1);
        }),
        None => IngestConfig::default(),
    }
}

async fn open_store(path: &PathBuf) -> Arc<SqliteStore> {
    let store = SqliteStore::open(path).await.unwrap_or_else(|e| {
        log::error!("Error opening database {}: {}", path.display(), e);
        process::exit(1);
    });
    Arc::new(store)
}

async fn ingest_into<S: MatchStore>(config: IngestConfig, store: Arc<S>, source: Source) -> RunReport {
    let ingestor = Ingestor::new(config, store, source).unwrap_or_else(|e| {
        log::error!("Invalid config: {}", e);
        process::exit(1);
    });
    ingestor.run_now().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let mut config = load_config(cli.config.as_ref());

    match cli.command {
        Commands::Ingest {
            file,
            dry_run,
            policy,
            format,
        } => {
            if let Some(policy) = policy {
                config.policy = policy.into();
            }

            let source = Source::new(file, &config).unwrap_or_else(|e| {
                log::error!("Error creating schedule source: {}", e);
                process::exit(1);
            });

            let report = if dry_run {
                log::info!("Dry run: nothing will be written to {}", cli.db.display());
                ingest_into(config, Arc::new(MemoryStore::new()), source).await
            } else {
                ingest_into(config, open_store(&cli.db).await, source).await
            };

            match format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => print!("{}", report),
            }

            if !report.is_success() {
                process::exit(1);
            }
        }

        Commands::Parse { file, format } => {
            let source = Source::new(file, &config).unwrap_or_else(|e| {
                log::error!("Error creating schedule source: {}", e);
                process::exit(1);
            });
            let ingestor = Ingestor::new(config, Arc::new(MemoryStore::new()), source)
                .unwrap_or_else(|e| {
                    log::error!("Invalid config: {}", e);
                    process::exit(1);
                });

            let batch = ingestor.preview().await.unwrap_or_else(|e| {
                log::error!("Error fetching schedule: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&batch),
                OutputFormat::Text => {
                    if batch.drafts.is_empty() {
                        println!("No matches parsed.");
                    }
                    for (i, draft) in batch.drafts.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, draft);
                    }
                    println!("\n{} of {} row(s) parsed", batch.drafts.len(), batch.rows_seen);
                    for skip in &batch.skipped {
                        println!("  skipped row {:>3}: {}", skip.index, skip.reason);
                    }
                }
            }
        }

        Commands::Daemon { run_now } => {
            let scraper = WebScraper::new(&config).unwrap_or_else(|e| {
                log::error!("Error creating scraper: {}", e);
                process::exit(1);
            });
            let store = open_store(&cli.db).await;
            let ingestor = Ingestor::new(config.clone(), store, scraper).unwrap_or_else(|e| {
                log::error!("Invalid config: {}", e);
                process::exit(1);
            });
            let scheduler = DailyScheduler::new(Arc::new(ingestor), &config.schedule)
                .unwrap_or_else(|e| {
                    log::error!("Invalid schedule: {}", e);
                    process::exit(1);
                });

            if run_now {
                let report = scheduler.trigger_now().await;
                print!("{}", report);
            }

            let handle = scheduler.start();
            log::info!(
                "Scheduler running; next ingestion at {}. Press Ctrl+C to stop.",
                scheduler.next_run()
            );

            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }

            scheduler.stop();
            if let Err(e) = handle.await {
                log::error!("Scheduler task failed: {}", e);
            }
        }

        Commands::List {
            limit,
            offset,
            start_date,
            end_date,
            competition,
            round,
            year,
            format,
        } => {
            let filter = MatchFilter {
                competition,
                round,
                year,
                start_date,
                end_date,
                limit: limit.map(usize::from),
                offset,
            };

            let filter = filter.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let store = open_store(&cli.db).await;
            let matches = store.list_matches().await.unwrap_or_else(|e| {
                log::error!("Error listing matches: {}", e);
                process::exit(1);
            });
            let matches = filter.apply(matches);

            match format {
                OutputFormat::Json => serialize_json(&matches),
                OutputFormat::Text => {
                    if matches.is_empty() {
                        println!("No matches to display.");
                    } else {
                        for (i, m) in matches.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, m);
                            println!("      id: {}", m.id);
                        }
                        print!("{}", MatchSummary::from_matches(&matches));
                    }
                }
            }
        }

        Commands::View {
            match_id,
            user_id,
            ip_address,
        } => {
            let store = open_store(&cli.db).await;
            let event = store
                .record_view(NewViewEvent {
                    match_id,
                    user_id,
                    ip_address,
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error recording view: {}", e);
                    process::exit(1);
                });
            let total = store.count_views_for_match(match_id).await.unwrap_or_else(|e| {
                log::error!("Error counting views: {}", e);
                process::exit(1);
            });

            println!("Recorded view {} ({} total for this match)", event.id, total);
        }

        Commands::Stats { year, format } => {
            let analytics = Analytics::new(open_store(&cli.db).await);

            let result = match year {
                Some(year) => analytics.yearly_stats(year).await.map(|s| vec![s]),
                None => {
                    let tz = config.schedule.tz().unwrap_or_else(|e| {
                        log::error!("Invalid config: {}", e);
                        process::exit(1);
                    });
                    let current_year = Utc::now().with_timezone(&tz).year();
                    analytics
                        .stats_since(config.stats_start_year, current_year)
                        .await
                }
            };

            let stats = result.unwrap_or_else(|e| {
                log::error!("Error computing statistics: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&stats),
                OutputFormat::Text => {
                    for s in &stats {
                        println!("{}", s);
                    }
                }
            }
        }

        Commands::Delete { match_id } => {
            let store = open_store(&cli.db).await;
            match store.delete_match(match_id).await {
                Ok(true) => println!("Deleted match {}", match_id),
                Ok(false) => {
                    log::error!("No match with id {}", match_id);
                    process::exit(1);
                }
                Err(e) => {
                    log::error!("Error deleting match: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}
