//! Statistics generation from a snapshot database
//!
//! This module provides functionality for extracting and displaying
//! snapshot statistics from the storage layer.

use crate::storage::{InstallRanking, RecordStore};
use crate::ScoutError;
use std::collections::BTreeMap;

/// Number of top items listed
const TOP_ITEMS: usize = 10;

/// Snapshot statistics summary
#[derive(Debug, Clone)]
pub struct SnapshotStatistics {
    /// Total number of records stored
    pub total_records: u64,

    /// Total number of daily metrics rows
    pub total_metrics: u64,

    /// Number of distinct `owner/repo` pairs
    pub total_repos: u64,

    /// Count of records by discovery source
    pub records_by_source: BTreeMap<String, u64>,

    /// Most installed items
    pub top_items: Vec<InstallRanking>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
///
/// # Returns
///
/// * `Ok(SnapshotStatistics)` - Successfully loaded statistics
/// * `Err(ScoutError)` - Failed to query statistics
pub fn load_statistics(store: &dyn RecordStore) -> Result<SnapshotStatistics, ScoutError> {
    Ok(SnapshotStatistics {
        total_records: store.count_records()?,
        total_metrics: store.count_metrics()?,
        total_repos: store.count_repos()?,
        records_by_source: store.count_by_discovery_source()?,
        top_items: store.top_by_installs(TOP_ITEMS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Unique repos: {}", stats.total_repos);
    println!("  Metrics rows: {}", stats.total_metrics);
    println!();

    println!("Records by Source:");
    // Sort sources by count (descending)
    let mut source_counts: Vec<_> = stats.records_by_source.iter().collect();
    source_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (source, count) in source_counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", source, count, percentage);
    }
    println!();

    if !stats.top_items.is_empty() {
        println!("Top Items by Installs:");
        for (rank, item) in stats.top_items.iter().enumerate() {
            let installs = item
                .total_installs
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:>2}. {} ({}) {}", rank + 1, item.id, item.name, installs);
        }
        println!();
    }
}
