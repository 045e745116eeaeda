use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use matchday::store::MatchStore;
use matchday::types::{MatchRecord, NaturalKey, NewViewEvent, ViewEvent};

use crate::{
    Error, Result,
    encode::{MATCH_COLUMNS, MatchRow, encode_dt, encode_match_date, encode_uuid, year_bounds},
    schema::SCHEMA,
};

/// Match and view-event tables in a single SQLite file.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening match database at {}", path.display());
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn select_matches(
        &self,
        clause: &'static str,
        params: Vec<String>,
    ) -> Result<Vec<MatchRecord>> {
        let rows: Vec<MatchRow> = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches {clause}"))?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), MatchRow::from_sql)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(MatchRow::into_record).collect()
    }

    async fn count(&self, sql: &'static str, params: Vec<String>) -> Result<u64> {
        let n: i64 = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(sql, rusqlite::params_from_iter(params), |r| r.get(0))?)
            })
            .await?;
        Ok(n.max(0) as u64)
    }
}

impl MatchStore for SqliteStore {
    type Error = Error;

    async fn get_match(&self, id: Uuid) -> Result<Option<MatchRecord>> {
        let mut found = self
            .select_matches("WHERE match_id = ?1", vec![encode_uuid(id)])
            .await?;
        Ok(found.pop())
    }

    async fn find_by_natural_key(&self, key: NaturalKey) -> Result<Option<MatchRecord>> {
        let mut found = self
            .select_matches(
                "WHERE match_date = ?1 AND home_team = ?2 AND away_team = ?3",
                vec![encode_match_date(key.match_date), key.home_team, key.away_team],
            )
            .await?;
        Ok(found.pop())
    }

    async fn insert_match(&self, record: MatchRecord) -> Result<()> {
        let row = MatchRow::from_record(&record);
        let inserted = self.conn.call(move |conn| Ok(row.insert(conn)?)).await?;
        if inserted == 0 {
            return Err(Error::DuplicateKey(record.natural_key()));
        }
        Ok(())
    }

    async fn update_match(&self, record: MatchRecord) -> Result<()> {
        let row = MatchRow::from_record(&record);

        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE matches SET
                       round = ?2, match_date = ?3, home_team = ?4, away_team = ?5,
                       home_score = ?6, away_score = ?7, location = ?8, stadium = ?9,
                       competition = ?10, match_info_url = ?11, outcome = ?12,
                       updated_at = ?13
                     WHERE match_id = ?1",
                    rusqlite::params![
                        row.match_id,
                        row.round,
                        row.match_date,
                        row.home_team,
                        row.away_team,
                        row.home_score,
                        row.away_score,
                        row.location,
                        row.stadium,
                        row.competition,
                        row.match_info_url,
                        row.outcome,
                        row.updated_at,
                    ],
                )?)
            })
            .await?;

        if updated == 0 {
            return Err(Error::MatchNotFound(record.id));
        }
        Ok(())
    }

    async fn replace_all_matches(&self, records: Vec<MatchRecord>) -> Result<usize> {
        let rows: Vec<MatchRow> = records.iter().map(MatchRow::from_record).collect();

        let replaced = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let views: i64 =
                    tx.query_row("SELECT COUNT(*) FROM match_views", [], |r| r.get(0))?;
                if views > 0 {
                    return Ok(Err(views as u64));
                }
                let deleted = tx.execute("DELETE FROM matches", [])?;
                for row in &rows {
                    row.insert(&tx)?;
                }
                tx.commit()?;
                Ok(Ok(deleted))
            })
            .await?;
        let deleted = replaced.map_err(Error::ViewsExist)?;

        log::debug!("Replaced {} stored match(es) with {}", deleted, records.len());
        Ok(deleted)
    }

    async fn delete_match(&self, id: Uuid) -> Result<bool> {
        let views = self.count_views_for_match(id).await?;
        if views > 0 {
            return Err(Error::MatchHasViews { id, views });
        }

        let id_str = encode_uuid(id);
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM matches WHERE match_id = ?1",
                    rusqlite::params![id_str],
                )?)
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn list_matches(&self) -> Result<Vec<MatchRecord>> {
        self.select_matches("ORDER BY match_date DESC", Vec::new())
            .await
    }

    async fn matches_in_year(&self, year: i32) -> Result<Vec<MatchRecord>> {
        let (start, end) = year_bounds(year)?;
        self.select_matches(
            "WHERE match_date >= ?1 AND match_date < ?2 ORDER BY match_date",
            vec![start, end],
        )
        .await
    }

    async fn record_view(&self, view: NewViewEvent) -> Result<ViewEvent> {
        let event = view.into_event(Utc::now());
        let match_id = event.match_id;

        let id_str = encode_uuid(event.id);
        let match_str = encode_uuid(event.match_id);
        let at_str = encode_dt(event.viewed_at);
        let user_id = event.user_id.clone();
        let ip_address = event.ip_address.clone();

        let inserted = self
            .conn
            .call(move |conn| {
                let exists = conn
                    .query_row(
                        "SELECT 1 FROM matches WHERE match_id = ?1",
                        rusqlite::params![match_str],
                        |_| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                if !exists {
                    return Ok(false);
                }

                conn.execute(
                    "INSERT INTO match_views (view_id, match_id, viewed_at, user_id, ip_address)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id_str, match_str, at_str, user_id, ip_address],
                )?;
                Ok(true)
            })
            .await?;

        if !inserted {
            return Err(Error::MatchNotFound(match_id));
        }
        Ok(event)
    }

    async fn count_views(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM match_views", Vec::new())
            .await
    }

    async fn count_views_for_match(&self, match_id: Uuid) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM match_views WHERE match_id = ?1",
            vec![encode_uuid(match_id)],
        )
        .await
    }

    async fn count_views_in_year(&self, year: i32) -> Result<u64> {
        let (start, end) = year_bounds(year)?;
        self.count(
            "SELECT COUNT(*) FROM match_views v
             JOIN matches m ON m.match_id = v.match_id
             WHERE m.match_date >= ?1 AND m.match_date < ?2",
            vec![start, end],
        )
        .await
    }
}
