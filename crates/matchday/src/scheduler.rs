use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ScheduleConfig};
use crate::ingest::{Ingestor, RunReport, Trigger};
use crate::scraper::ScheduleSource;
use crate::store::MatchStore;

/// Fires the ingestion pipeline once a day at a fixed local time.
///
/// Manual runs go through [`DailyScheduler::trigger_now`] and share the
/// ingestor's run lock with the timer.
pub struct DailyScheduler<S, F> {
    ingestor: Arc<Ingestor<S, F>>,
    at: NaiveTime,
    tz: Tz,
    token: CancellationToken,
}

impl<S, F> DailyScheduler<S, F>
where
    S: MatchStore + 'static,
    F: ScheduleSource + 'static,
{
    pub fn new(ingestor: Arc<Ingestor<S, F>>, config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ingestor,
            at: config.fire_time()?,
            tz: config.tz()?,
            token: CancellationToken::new(),
        })
    }

    pub fn ingestor(&self) -> &Arc<Ingestor<S, F>> {
        &self.ingestor
    }

    pub fn next_run(&self) -> DateTime<Tz> {
        next_run_after(Utc::now().with_timezone(&self.tz), self.at)
    }

    pub async fn trigger_now(&self) -> RunReport {
        log::info!("Manual ingestion triggered");
        self.ingestor.run_now().await
    }

    /// Starts the timer loop. It runs until [`DailyScheduler::stop`] is called.
    pub fn start(&self) -> JoinHandle<()> {
        let ingestor = self.ingestor.clone();
        let token = self.token.clone();
        let (at, tz) = (self.at, self.tz);

        tokio::spawn(async move {
            loop {
                let now = Utc::now().with_timezone(&tz);
                let next = next_run_after(now, at);
                log::info!("Next scheduled ingestion at {}", next);
                let wait = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = token.cancelled() => {
                        log::info!("Scheduler stopped");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        let report = ingestor.run(Trigger::Scheduled).await;
                        if report.is_success() {
                            log::info!("{}", report);
                        } else {
                            log::warn!("{}", report);
                        }
                    }
                }
            }
        })
    }

    /// Stops the timer; a run already in progress finishes first.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The first instant strictly after `now` whose local time is `at`.
///
/// A time skipped by a DST jump fires an hour later; an ambiguous one fires
/// at its earlier occurrence.
pub fn next_run_after<Z: TimeZone>(now: DateTime<Z>, at: NaiveTime) -> DateTime<Z> {
    let tz = now.timezone();
    let next = (0..=2)
        .filter_map(|offset| {
            let local = now.date_naive().checked_add_days(Days::new(offset))?.and_time(at);
            tz.from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + TimeDelta::hours(1))).earliest())
        })
        .find(|candidate| *candidate > now);
    next.unwrap_or_else(|| now + TimeDelta::days(1))
}
