//! Output directory layout

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Resolves every file the pipeline reads or writes under the output root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".pipeline.lock")
    }

    // ===== Discovery =====

    pub fn discovery_dir(&self) -> PathBuf {
        self.root.join("discovery")
    }

    pub fn discovered_items_path(&self) -> PathBuf {
        self.discovery_dir().join("discovered_items.jsonl")
    }

    pub fn repos_path(&self) -> PathBuf {
        self.discovery_dir().join("repos.json")
    }

    pub fn convergence_report_path(&self) -> PathBuf {
        self.discovery_dir().join("convergence_report.json")
    }

    pub fn discovery_summary_path(&self) -> PathBuf {
        self.discovery_dir().join("discovery_summary.json")
    }

    // ===== Checkpoints =====

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn discovery_checkpoint_path(&self) -> PathBuf {
        self.checkpoints_dir().join("discovery_state.json")
    }

    pub fn extraction_checkpoint_path(&self) -> PathBuf {
        self.checkpoints_dir().join("extraction_state.json")
    }

    /// Items found by search queries an unfinished discovery already completed
    pub fn partial_discovery_path(&self) -> PathBuf {
        self.checkpoints_dir().join("discovery_items.jsonl")
    }

    /// Records extracted by completed batches of an unfinished run
    pub fn partial_records_path(&self) -> PathBuf {
        self.checkpoints_dir().join("extraction_records.jsonl")
    }

    // ===== Snapshots =====

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn snapshot_dir(&self, date: NaiveDate) -> PathBuf {
        self.snapshots_dir().join(date.format("%Y-%m-%d").to_string())
    }

    pub fn records_path(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join("records.jsonl")
    }

    pub fn metrics_path(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join("metrics.jsonl")
    }

    pub fn database_path(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join("records.db")
    }

    /// Dates of every snapshot directory, oldest first
    ///
    /// Entries whose name is not an ISO date are ignored.
    pub fn snapshot_dates(&self) -> std::io::Result<Vec<NaiveDate>> {
        let entries = match std::fs::read_dir(self.snapshots_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(date) = entry
                .file_name()
                .to_str()
                .and_then(|name| NaiveDate::parse_from_str(name, "%Y-%m-%d").ok())
            {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    // ===== Reports =====

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn quality_report_path(&self) -> PathBuf {
        self.reports_dir().join("quality_report.json")
    }
}
