//! Detail extraction engine
//!
//! Items are processed in fixed-size batches. Within a batch every item runs
//! in its own task, bounded by a semaphore; a task that panics is recorded
//! as an `unexpected:` failure for that item only. After each non-final
//! batch the completed set, the failure map and the batch's records are
//! persisted so an interrupted run can resume without refetching.

use crate::config::ExtractionConfig;
use crate::extraction::parser::{extract_detail_record, ExtractError, RecordContext};
use crate::fetch::FetchClient;
use crate::model::{CanonicalId, DetailRecord, DiscoveredItem, Frontier};
use crate::site::SiteUrls;
use crate::storage::{
    append_jsonl, read_jsonl, save_checkpoint, ExtractionCheckpoint, FailureRecord,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Engine settings
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub concurrency: usize,
    pub batch_size: usize,
    pub parser_version: String,

    /// Where intermediate checkpoints are saved; `None` disables them
    pub checkpoint_path: Option<PathBuf>,

    /// Where records of completed batches are appended; `None` disables it
    pub records_path: Option<PathBuf>,
}

impl ExtractionOptions {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            batch_size: config.batch_size,
            parser_version: config.parser_version.clone(),
            checkpoint_path: None,
            records_path: None,
        }
    }
}

/// Result of extracting a single item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Success(Box<DetailRecord>),
    /// The page was fetched but is not a usable detail page
    SoftFailure {
        error: String,
        http_status: Option<u16>,
    },
    /// Transport, status or value failure, or a panic in the item's task
    HardFailure {
        error: String,
        http_status: Option<u16>,
    },
}

/// Records and failures of one extraction run
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub records: Vec<DetailRecord>,
    pub failures: BTreeMap<CanonicalId, FailureRecord>,

    /// Progress as of the end of the run (not yet marked finished)
    pub checkpoint: ExtractionCheckpoint,
}

/// Fetches and parses one detail page
pub async fn extract_item(
    client: &FetchClient,
    site: &SiteUrls,
    item: &DiscoveredItem,
    run_id: &str,
    parser_version: &str,
) -> ItemOutcome {
    let url = site.detail_page(&item.owner, &item.repo, &item.item_id);

    let page = match client.fetch_html(&url).await {
        Ok(page) => page,
        Err(e) if e.is_soft() => {
            return ItemOutcome::SoftFailure {
                error: e.to_string(),
                http_status: e.status(),
            }
        }
        Err(e) => {
            return ItemOutcome::HardFailure {
                error: e.to_string(),
                http_status: e.status(),
            }
        }
    };

    let context = RecordContext {
        site,
        run_id,
        parser_version,
    };
    match extract_detail_record(item, &page.body, Some(page.status), Utc::now(), &context) {
        Ok(record) => ItemOutcome::Success(Box::new(record)),
        Err(e @ ExtractError::Soft(_)) => ItemOutcome::SoftFailure {
            error: e.to_string(),
            http_status: Some(page.status),
        },
        Err(e @ ExtractError::Value(_)) => ItemOutcome::HardFailure {
            error: e.to_string(),
            http_status: Some(page.status),
        },
    }
}

/// Restores progress from a resumed checkpoint
///
/// An id counts as completed only if its record was persisted; ids whose
/// record is missing are fetched again.
fn restore_progress(
    resume: Option<ExtractionCheckpoint>,
    options: &ExtractionOptions,
    run_id: &str,
    total: usize,
) -> (ExtractionCheckpoint, Vec<DetailRecord>) {
    let Some(mut checkpoint) = resume else {
        if let Some(path) = &options.records_path {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to clear partial records {}: {}", path.display(), e);
                }
            }
        }
        return (ExtractionCheckpoint::new(run_id, total), Vec::new());
    };

    let stored: Vec<DetailRecord> = match &options.records_path {
        Some(path) => read_jsonl(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to read partial records {}: {}", path.display(), e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    let mut records = BTreeMap::new();
    for record in stored {
        if checkpoint.completed.contains(&record.id) {
            records.entry(record.id.clone()).or_insert(record);
        }
    }

    let before = checkpoint.completed.len();
    checkpoint.completed.retain(|id| records.contains_key(id));
    if checkpoint.completed.len() < before {
        tracing::warn!(
            "{} completed items have no stored record and will be fetched again",
            before - checkpoint.completed.len()
        );
    }

    checkpoint.total = total;
    (checkpoint, records.into_values().collect())
}

/// Extracts every frontier item not already completed
///
/// # Arguments
///
/// * `client` - Shared fetch client
/// * `site` - Endpoint builder for detail pages
/// * `frontier` - Items to extract
/// * `run_id` - Stamped onto every record and checkpoint
/// * `options` - Concurrency, batching and persistence settings
/// * `resume` - An unfinished checkpoint to continue from
///
/// # Returns
///
/// Records (including those restored from the resumed run) and the failure
/// map. Failures never abort the run.
pub async fn run_extraction(
    client: &FetchClient,
    site: &SiteUrls,
    frontier: &Frontier,
    run_id: &str,
    options: &ExtractionOptions,
    resume: Option<ExtractionCheckpoint>,
) -> ExtractionResult {
    let (mut checkpoint, mut records) = restore_progress(resume, options, run_id, frontier.len());
    let previous_failures = std::mem::take(&mut checkpoint.failed);

    let pending: Vec<DiscoveredItem> = frontier
        .values()
        .filter(|item| !checkpoint.completed.contains(&item.id))
        .cloned()
        .collect();
    let total = pending.len();
    tracing::info!(
        "Extracting {} items ({} already completed)",
        total,
        checkpoint.completed.len()
    );

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let run_id_shared: Arc<str> = Arc::from(run_id);
    let parser_version: Arc<str> = Arc::from(options.parser_version.as_str());
    let batch_size = options.batch_size.max(1);

    for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
        let mut handles = Vec::with_capacity(batch.len());
        for item in batch {
            let client = client.clone();
            let site = site.clone();
            let item = item.clone();
            let semaphore = Arc::clone(&semaphore);
            let run_id = Arc::clone(&run_id_shared);
            let parser_version = Arc::clone(&parser_version);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                extract_item(&client, &site, &item, &run_id, &parser_version).await
            }));
        }

        let mut batch_records = Vec::new();
        for (item, handle) in batch.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Unexpected error extracting {}: {}", item.id, e);
                    ItemOutcome::HardFailure {
                        error: format!("unexpected: {}", e),
                        http_status: None,
                    }
                }
            };

            match outcome {
                ItemOutcome::Success(record) => {
                    checkpoint.completed.insert(item.id.clone());
                    batch_records.push(*record);
                }
                ItemOutcome::SoftFailure { error, http_status } => {
                    tracing::warn!("Soft error for {}: {}", item.id, error);
                    record_failure(&mut checkpoint, &previous_failures, item, error, http_status);
                }
                ItemOutcome::HardFailure { error, http_status } => {
                    tracing::error!("Failed to extract {}: {}", item.id, error);
                    record_failure(&mut checkpoint, &previous_failures, item, error, http_status);
                }
            }
        }

        let processed = (batch_index * batch_size + batch.len()).min(total);
        let is_final = processed >= total;

        if let Some(path) = &options.records_path {
            if let Err(e) = append_jsonl(path, &batch_records) {
                tracing::error!("Failed to persist batch records to {}: {}", path.display(), e);
            }
        }
        records.extend(batch_records);

        if !is_final {
            checkpoint.last_updated = Utc::now();
            if let Some(path) = &options.checkpoint_path {
                match save_checkpoint(path, &checkpoint) {
                    Ok(()) => tracing::info!(
                        "Checkpoint saved: {}/{} completed, {} failures",
                        checkpoint.completed.len(),
                        checkpoint.total,
                        checkpoint.failed.len()
                    ),
                    Err(e) => tracing::error!("Failed to save extraction checkpoint: {}", e),
                }
            }
        }
    }

    checkpoint.last_updated = Utc::now();
    tracing::info!(
        "Extraction complete: {} records, {} failures",
        records.len(),
        checkpoint.failed.len()
    );

    ExtractionResult {
        records,
        failures: checkpoint.failed.clone(),
        checkpoint,
    }
}

fn record_failure(
    checkpoint: &mut ExtractionCheckpoint,
    previous: &BTreeMap<CanonicalId, FailureRecord>,
    item: &DiscoveredItem,
    error: String,
    http_status: Option<u16>,
) {
    let attempts = previous.get(&item.id).map(|f| f.attempts).unwrap_or(0) + 1;
    checkpoint.failed.insert(
        item.id.clone(),
        FailureRecord {
            error,
            attempts,
            last_attempt: Utc::now(),
            http_status,
        },
    );
}
