use matchday::types::NaturalKey;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("uuid parse error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("date/time parse error: {0}")]
    DateParse(String),

    /// A stored column held a value the domain types do not accept.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("a match already exists for {0}")]
    DuplicateKey(NaturalKey),

    #[error("match {id} still has {views} view event(s)")]
    MatchHasViews { id: Uuid, views: u64 },

    #[error("{0} view event(s) still reference stored matches")]
    ViewsExist(u64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
