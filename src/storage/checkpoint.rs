//! Resumable checkpoints
//!
//! Checkpoints are JSON documents written atomically. Before the new file
//! replaces the old one, the old one is rotated to `<path>.bak`, so a torn
//! or corrupted primary can still be recovered from the previous save.

use crate::model::{CanonicalId, PassSummary};
use crate::storage::atomic::AtomicFile;
use crate::storage::traits::StorageResult;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Layout version written into every checkpoint
pub const CHECKPOINT_SCHEMA_VERSION: &str = "1";

/// Anything that can be stored as a checkpoint
pub trait Checkpoint: Serialize + DeserializeOwned {
    fn schema_version(&self) -> &str;

    /// Finished checkpoints are kept for inspection but never resumed
    fn is_finished(&self) -> bool;
}

/// Discovery progress for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCheckpoint {
    pub schema_version: String,
    pub run_id: String,
    #[serde(default)]
    pub search_queries_completed: BTreeSet<String>,
    #[serde(default)]
    pub repos_crawled: BTreeSet<String>,
    #[serde(default)]
    pub discovered_ids: BTreeSet<CanonicalId>,
    #[serde(default)]
    pub pass_summaries: Vec<PassSummary>,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub finished: bool,
}

impl DiscoveryCheckpoint {
    pub fn new(run_id: &str) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            search_queries_completed: BTreeSet::new(),
            repos_crawled: BTreeSet::new(),
            discovered_ids: BTreeSet::new(),
            pass_summaries: Vec::new(),
            started_at: now,
            last_updated: now,
            finished: false,
        }
    }
}

impl Checkpoint for DiscoveryCheckpoint {
    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Why an item could not be extracted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub error: String,
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
    pub http_status: Option<u16>,
}

/// Extraction progress for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCheckpoint {
    pub schema_version: String,
    pub run_id: String,
    #[serde(default)]
    pub completed: BTreeSet<CanonicalId>,
    #[serde(default)]
    pub failed: BTreeMap<CanonicalId, FailureRecord>,
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub finished: bool,
}

impl ExtractionCheckpoint {
    pub fn new(run_id: &str, total: usize) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            completed: BTreeSet::new(),
            failed: BTreeMap::new(),
            total,
            started_at: now,
            last_updated: now,
            finished: false,
        }
    }
}

impl Checkpoint for ExtractionCheckpoint {
    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Outcome of reading a checkpoint from disk
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointState<T> {
    /// A usable checkpoint, from the primary file or its backup
    Loaded(T),
    /// Neither the primary nor the backup exists
    Absent,
    /// At least one file exists but none could be used
    Unrecoverable,
}

impl<T> CheckpointState<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CheckpointState::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// Returns `<path>.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Saves a checkpoint, keeping the previous version as `<path>.bak`
///
/// # Arguments
///
/// * `path` - Primary checkpoint location
/// * `value` - The checkpoint to write
///
/// # Returns
///
/// * `Ok(())` - The new checkpoint is in place
/// * `Err(StorageError)` - Nothing was replaced; the staged file is removed
pub fn save_checkpoint<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let mut staged = AtomicFile::create(path)?;
    {
        let mut writer = BufWriter::new(staged.file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    match fs::rename(path, backup_path(path)) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    staged.commit()
}

/// Reads one checkpoint file; `None` for anything unusable
fn read_checkpoint_file<T: Checkpoint>(path: &Path) -> Option<T> {
    let text = fs::read_to_string(path).ok()?;
    let value: T = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Checkpoint {} is corrupt: {}", path.display(), e);
            return None;
        }
    };

    if value.schema_version() != CHECKPOINT_SCHEMA_VERSION {
        tracing::warn!(
            "Checkpoint {} has unsupported schema version {}",
            path.display(),
            value.schema_version()
        );
        return None;
    }

    Some(value)
}

/// Loads a checkpoint, falling back to the backup when the primary is
/// missing or unusable
pub fn load_checkpoint_state<T: Checkpoint>(path: &Path) -> CheckpointState<T> {
    let backup = backup_path(path);
    let primary_exists = path.exists();
    let backup_exists = backup.exists();

    if !primary_exists && !backup_exists {
        return CheckpointState::Absent;
    }

    if primary_exists {
        if let Some(value) = read_checkpoint_file(path) {
            return CheckpointState::Loaded(value);
        }
    } else {
        tracing::warn!(
            "Checkpoint {} is missing, trying backup",
            path.display()
        );
    }

    if backup_exists {
        if let Some(value) = read_checkpoint_file(&backup) {
            tracing::warn!("Recovered checkpoint from backup {}", backup.display());
            return CheckpointState::Loaded(value);
        }
    }

    tracing::error!(
        "Checkpoint {} and its backup are both unusable",
        path.display()
    );
    CheckpointState::Unrecoverable
}

/// Loads a checkpoint, returning `None` when nothing usable exists
pub fn load_checkpoint<T: Checkpoint>(path: &Path) -> Option<T> {
    load_checkpoint_state(path).into_option()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(run_id: &str) -> ExtractionCheckpoint {
        let mut checkpoint = ExtractionCheckpoint::new(run_id, 3);
        checkpoint
            .completed
            .insert(CanonicalId::new("acme", "tools", "lint"));
        checkpoint.failed.insert(
            CanonicalId::new("acme", "tools", "fmt"),
            FailureRecord {
                error: "http_404".to_string(),
                attempts: 1,
                last_attempt: Utc::now(),
                http_status: Some(404),
            },
        );
        checkpoint
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("out/checkpoints/extraction.json")),
            PathBuf::from("out/checkpoints/extraction.json.bak")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints/extraction.json");

        let checkpoint = sample("run-1");
        save_checkpoint(&path, &checkpoint).unwrap();

        let loaded: ExtractionCheckpoint = load_checkpoint(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_second_save_rotates_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extraction.json");

        save_checkpoint(&path, &sample("run-1")).unwrap();
        save_checkpoint(&path, &sample("run-2")).unwrap();

        let backup: ExtractionCheckpoint =
            serde_json::from_str(&fs::read_to_string(backup_path(&path)).unwrap()).unwrap();
        assert_eq!(backup.run_id, "run-1");

        let primary: ExtractionCheckpoint = load_checkpoint(&path).unwrap();
        assert_eq!(primary.run_id, "run-2");
    }

    #[test]
    fn test_corrupt_primary_recovers_from_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extraction.json");

        save_checkpoint(&path, &sample("run-1")).unwrap();
        save_checkpoint(&path, &sample("run-2")).unwrap();
        fs::write(&path, "{\"schema_version\": \"1\", \"run_").unwrap();

        let loaded: ExtractionCheckpoint = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
    }

    #[test]
    fn test_missing_primary_uses_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extraction.json");

        save_checkpoint(&path, &sample("run-1")).unwrap();
        fs::rename(&path, backup_path(&path)).unwrap();

        let loaded: ExtractionCheckpoint = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
    }

    #[test]
    fn test_both_corrupt_is_unrecoverable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extraction.json");
        fs::write(&path, "not json").unwrap();
        fs::write(backup_path(&path), "{").unwrap();

        let state: CheckpointState<ExtractionCheckpoint> = load_checkpoint_state(&path);
        assert_eq!(state, CheckpointState::Unrecoverable);
    }

    #[test]
    fn test_absent() {
        let dir = TempDir::new().unwrap();
        let state: CheckpointState<DiscoveryCheckpoint> =
            load_checkpoint_state(&dir.path().join("discovery.json"));
        assert_eq!(state, CheckpointState::Absent);
    }

    #[test]
    fn test_unknown_schema_version_is_unusable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("discovery.json");

        let mut checkpoint = DiscoveryCheckpoint::new("run-1");
        checkpoint.schema_version = "99".to_string();
        save_checkpoint(&path, &checkpoint).unwrap();

        let state: CheckpointState<DiscoveryCheckpoint> = load_checkpoint_state(&path);
        assert_eq!(state, CheckpointState::Unrecoverable);
    }
}
