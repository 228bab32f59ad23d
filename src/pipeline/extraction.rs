//! Extraction phase
//!
//! Extracts every frontier item, then writes the day's snapshot: records and
//! metrics as JSON Lines plus the SQLite mirror. The final checkpoint is
//! marked finished so the next run starts over.

use crate::config::Config;
use crate::extraction::{run_extraction, ExtractionOptions};
use crate::fetch::FetchClient;
use crate::model::{CanonicalId, DailyMetrics, DetailRecord, Frontier};
use crate::pipeline::load_resumable;
use crate::site::SiteUrls;
use crate::storage::{
    open_store, save_checkpoint, write_jsonl, ExtractionCheckpoint, FailureRecord, OutputLayout,
    RecordStore,
};
use crate::ScoutError;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

/// Output of one extraction phase
#[derive(Debug)]
pub struct ExtractionPhase {
    pub records: Vec<DetailRecord>,
    pub failures: BTreeMap<CanonicalId, FailureRecord>,
    pub snapshot_date: NaiveDate,
}

/// Runs the extraction phase over `frontier`
///
/// # Arguments
///
/// * `config` - Run configuration
/// * `client` - Shared fetch client
/// * `site` - Endpoint URLs
/// * `layout` - Output directory layout
/// * `frontier` - Items to extract
/// * `run_id` - Identifier stamped on every record
/// * `resume` - Whether an unfinished extraction checkpoint may be continued
///
/// # Returns
///
/// * `Ok(ExtractionPhase)` - Records, failures and the snapshot date written
/// * `Err(ScoutError)` - An unusable checkpoint in strict mode, or a write failure
pub async fn run_extraction_phase(
    config: &Config,
    client: &FetchClient,
    site: &SiteUrls,
    layout: &OutputLayout,
    frontier: &Frontier,
    run_id: &str,
    resume: bool,
) -> Result<ExtractionPhase, ScoutError> {
    let checkpoint_path = layout.extraction_checkpoint_path();
    let partial_path = layout.partial_records_path();

    let resumed: Option<ExtractionCheckpoint> = if resume {
        load_resumable(&checkpoint_path, config.output.strict_checkpoints)?
    } else {
        None
    };

    let mut options = ExtractionOptions::from_config(&config.extraction);
    options.checkpoint_path = Some(checkpoint_path.clone());
    options.records_path = Some(partial_path.clone());

    let result = run_extraction(client, site, frontier, run_id, &options, resumed).await;

    let snapshot_date = Utc::now().date_naive();
    let metrics: Vec<DailyMetrics> = result
        .records
        .iter()
        .map(|record| DailyMetrics::from_record(record, snapshot_date))
        .collect();

    let written = write_jsonl(&layout.records_path(snapshot_date), &result.records)?;
    write_jsonl(&layout.metrics_path(snapshot_date), &metrics)?;
    tracing::info!(
        "Wrote snapshot {}: {} records, {} metrics rows",
        snapshot_date,
        written,
        metrics.len()
    );

    let mut store = open_store(&layout.database_path(snapshot_date))?;
    let upserted = store.upsert_records(&result.records)?;
    store.upsert_metrics(&metrics)?;
    tracing::info!("Upserted {} records into snapshot database", upserted);

    let mut checkpoint = result.checkpoint;
    checkpoint.finished = true;
    checkpoint.last_updated = Utc::now();
    save_checkpoint(&checkpoint_path, &checkpoint)?;

    match fs::remove_file(&partial_path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove partial records {}: {}",
            partial_path.display(),
            e
        ),
    }

    Ok(ExtractionPhase {
        records: result.records,
        failures: result.failures,
        snapshot_date,
    })
}
