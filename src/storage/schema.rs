//! Snapshot database schema
//!
//! One database is written per snapshot date, next to that day's JSONL files.

/// Tables for records, daily metrics and per-channel installs
pub const SCHEMA_SQL: &str = r#"
-- Latest extracted record per item
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL,
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    canonical_url TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    total_installs INTEGER,
    weekly_installs INTEGER,
    weekly_installs_raw TEXT,
    first_seen_date TEXT,
    github_url TEXT,
    og_image_url TEXT,
    install_command TEXT,
    categories TEXT NOT NULL DEFAULT '[]',
    run_id TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    discovery_source TEXT NOT NULL,
    source_endpoint TEXT NOT NULL,
    discovery_pass INTEGER NOT NULL,
    rank_at_fetch INTEGER,
    http_status INTEGER,
    parser_version TEXT NOT NULL,
    content_hash TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_repo ON records(owner, repo);
CREATE INDEX IF NOT EXISTS idx_records_source ON records(discovery_source);

-- One popularity row per item per snapshot date
CREATE TABLE IF NOT EXISTS daily_metrics (
    id TEXT NOT NULL,
    snapshot_date TEXT NOT NULL,
    total_installs INTEGER,
    weekly_installs INTEGER,
    PRIMARY KEY (id, snapshot_date)
);

-- Per-channel install counts
CREATE TABLE IF NOT EXISTS channel_installs (
    id TEXT NOT NULL,
    snapshot_date TEXT NOT NULL,
    channel TEXT NOT NULL,
    installs INTEGER NOT NULL,
    PRIMARY KEY (id, snapshot_date, channel)
);

CREATE INDEX IF NOT EXISTS idx_channel_installs_id ON channel_installs(id);
"#;

/// Creates any missing tables and indexes; safe to run on every open
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
