//! SQLite-backed record store
//!
//! Records are keyed by canonical id and metrics by id and snapshot date, so
//! re-running a day's extraction overwrites rather than duplicates.

use crate::model::{CanonicalId, ChannelInstalls, DailyMetrics, DetailRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{InstallRanking, RecordStore, StorageError, StorageResult};
use crate::ScoutError;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;

/// Snapshot database for one day of extraction
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Opens (or creates) the database at `path` in WAL mode
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Throwaway store for unit tests
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// SQLite integers are signed; counts beyond `i64::MAX` are stored as NULL
fn to_db_int(value: Option<u64>) -> Option<i64> {
    value.and_then(|n| i64::try_from(n).ok())
}

fn from_db_int(value: Option<i64>) -> Option<u64> {
    value.and_then(|n| u64::try_from(n).ok())
}

impl RecordStore for SqliteRecordStore {
    // ===== Records =====

    fn upsert_records(&mut self, records: &[DetailRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        for record in records {
            let categories = serde_json::to_string(&record.categories)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            tx.execute(
                "INSERT OR REPLACE INTO records (
                    id, item_id, owner, repo, canonical_url, name, description,
                    total_installs, weekly_installs, weekly_installs_raw, first_seen_date,
                    github_url, og_image_url, install_command, categories, run_id, fetched_at,
                    discovery_source, source_endpoint, discovery_pass, rank_at_fetch,
                    http_status, parser_version, content_hash
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
                )",
                params![
                    record.id.as_str(),
                    record.item_id,
                    record.owner,
                    record.repo,
                    record.canonical_url,
                    record.name,
                    record.description,
                    to_db_int(record.total_installs),
                    to_db_int(record.weekly_installs),
                    record.weekly_installs_raw,
                    record.first_seen_date.map(|d| d.to_string()),
                    record.github_url,
                    record.og_image_url,
                    record.install_command,
                    categories,
                    record.run_id,
                    record.fetched_at.to_rfc3339(),
                    record.discovery_source.as_str(),
                    record.source_endpoint.as_str(),
                    record.discovery_pass,
                    record.rank_at_fetch,
                    record.http_status,
                    record.parser_version,
                    record.content_hash,
                ],
            )?;

            tx.execute(
                "DELETE FROM channel_installs WHERE id = ?1",
                params![record.id.as_str()],
            )?;

            let snapshot_date = record.fetched_at.date_naive().to_string();
            for (channel, installs) in &record.channel_installs {
                tx.execute(
                    "INSERT INTO channel_installs (id, snapshot_date, channel, installs)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.id.as_str(),
                        snapshot_date,
                        channel,
                        to_db_int(Some(*installs)).unwrap_or(i64::MAX)
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    fn get_channel_installs(&self, id: &CanonicalId) -> StorageResult<ChannelInstalls> {
        let mut stmt = self
            .conn
            .prepare("SELECT channel, installs FROM channel_installs WHERE id = ?1")?;

        let rows = stmt.query_map(params![id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut channels = ChannelInstalls::new();
        for row in rows {
            let (channel, installs) = row?;
            if let Some(installs) = from_db_int(Some(installs)) {
                channels.insert(channel, installs);
            }
        }
        Ok(channels)
    }

    fn contains_record(&self, id: &CanonicalId) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ===== Metrics =====

    fn upsert_metrics(&mut self, metrics: &[DailyMetrics]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        for row in metrics {
            tx.execute(
                "INSERT OR REPLACE INTO daily_metrics (id, snapshot_date, total_installs, weekly_installs)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.id.as_str(),
                    row.snapshot_date.to_string(),
                    to_db_int(row.total_installs),
                    to_db_int(row.weekly_installs),
                ],
            )?;
        }
        tx.commit()?;
        Ok(metrics.len())
    }

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_metrics(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM daily_metrics", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_discovery_source(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT discovery_source, COUNT(*) FROM records GROUP BY discovery_source")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (source, count) = row?;
            counts.insert(source, count as u64);
        }
        Ok(counts)
    }

    fn count_repos(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT owner, repo FROM records)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn top_by_installs(&self, limit: usize) -> StorageResult<Vec<InstallRanking>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, total_installs FROM records
             ORDER BY total_installs IS NULL, total_installs DESC, id ASC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(InstallRanking {
                id: row.get(0)?,
                name: row.get(1)?,
                total_installs: from_db_int(row.get(2)?),
            })
        })?;

        let mut ranking = Vec::new();
        for row in rows {
            ranking.push(row?);
        }
        Ok(ranking)
    }
}
