//! Storage traits and error types
//!
//! This module defines the trait interface for the record store and the
//! error type shared by every persistence helper (SQLite, JSONL,
//! checkpoints, the run lock).

use crate::model::{CanonicalId, ChannelInstalls, DailyMetrics, DetailRecord};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock held by another process: {0}")]
    LockHeld(String),
}

impl From<tempfile::PersistError> for StorageError {
    fn from(err: tempfile::PersistError) -> Self {
        StorageError::Io(err.error)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Top entry returned by [`RecordStore::top_by_installs`]
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRanking {
    pub id: String,
    pub name: String,
    pub total_installs: Option<u64>,
}

/// Trait for record store implementations
///
/// A store holds the latest record per item plus one metrics row per item
/// and snapshot date.
pub trait RecordStore {
    // ===== Records =====

    /// Inserts or replaces records keyed by id
    ///
    /// Channel install rows for each written id are replaced wholesale, so a
    /// channel that disappears from a record also disappears from the store.
    ///
    /// # Returns
    ///
    /// The number of records written
    fn upsert_records(&mut self, records: &[DetailRecord]) -> StorageResult<usize>;

    /// Gets the stored channel installs for one item
    fn get_channel_installs(&self, id: &CanonicalId) -> StorageResult<ChannelInstalls>;

    /// Checks whether a record exists
    fn contains_record(&self, id: &CanonicalId) -> StorageResult<bool>;

    // ===== Metrics =====

    /// Inserts or replaces daily metrics rows keyed by (id, snapshot date)
    fn upsert_metrics(&mut self, metrics: &[DailyMetrics]) -> StorageResult<usize>;

    // ===== Statistics =====

    /// Counts stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Counts stored metrics rows
    fn count_metrics(&self) -> StorageResult<u64>;

    /// Counts records per discovery source
    fn count_by_discovery_source(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Counts distinct `owner/repo` pairs
    fn count_repos(&self) -> StorageResult<u64>;

    /// Returns the most-installed records, highest first
    fn top_by_installs(&self, limit: usize) -> StorageResult<Vec<InstallRanking>>;
}
