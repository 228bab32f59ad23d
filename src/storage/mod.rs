//! Storage module for persisting pipeline state
//!
//! This module handles everything the pipeline writes to disk:
//! - Checkpoints with atomic replacement and a `.bak` fallback
//! - JSON Lines snapshot files
//! - The persisted discovery frontier
//! - The SQLite mirror of each snapshot
//! - The single-run lock

mod atomic;
mod checkpoint;
mod frontier;
mod jsonl;
mod layout;
mod lock;
mod schema;
mod sqlite;
mod traits;

pub use atomic::{write_json_atomic, AtomicFile};
pub use checkpoint::{
    backup_path, load_checkpoint, load_checkpoint_state, save_checkpoint, Checkpoint,
    CheckpointState, DiscoveryCheckpoint, ExtractionCheckpoint, FailureRecord,
    CHECKPOINT_SCHEMA_VERSION,
};
pub use frontier::{load_frontier, persist_frontier, RepoIndex};
pub use jsonl::{
    append_jsonl, count_jsonl_rows_with_errors, read_jsonl, read_jsonl_with_errors, write_jsonl,
    JsonlRead,
};
pub use layout::OutputLayout;
pub use lock::PipelineLock;
pub use sqlite::SqliteRecordStore;
pub use traits::{InstallRanking, RecordStore, StorageError, StorageResult};

use crate::ScoutError;
use std::path::Path;

/// Opens (creating if needed) a snapshot database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRecordStore)` - Successfully initialized storage
/// * `Err(ScoutError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> Result<SqliteRecordStore, ScoutError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteRecordStore::new(path)
}
