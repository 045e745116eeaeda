/// Idempotent DDL run on every open.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS matches (
    match_id       TEXT PRIMARY KEY,
    round          INTEGER NOT NULL,
    match_date     TEXT NOT NULL,   -- local kickoff, %Y-%m-%dT%H:%M:%S
    home_team      TEXT NOT NULL,
    away_team      TEXT NOT NULL,
    home_score     INTEGER,
    away_score     INTEGER,
    location       TEXT NOT NULL,   -- 'HOME' | 'AWAY'
    stadium        TEXT NOT NULL,
    competition    TEXT NOT NULL,
    match_info_url TEXT,
    outcome        TEXT NOT NULL,   -- 'WIN' | 'LOSE' | 'DRAW' | 'SCHEDULED'
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (match_date, home_team, away_team)
);

-- Append-only. No ON DELETE action: a referenced match cannot be removed.
CREATE TABLE IF NOT EXISTS match_views (
    view_id    TEXT PRIMARY KEY,
    match_id   TEXT NOT NULL REFERENCES matches(match_id),
    viewed_at  TEXT NOT NULL,
    user_id    TEXT,
    ip_address TEXT
);

CREATE INDEX IF NOT EXISTS matches_date_idx     ON matches(match_date);
CREATE INDEX IF NOT EXISTS match_views_match_idx ON match_views(match_id);

PRAGMA user_version = 1;
";
