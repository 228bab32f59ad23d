//! Discovered frontier persistence

use crate::model::{DiscoveredItem, Frontier, RepoSet};
use crate::storage::atomic::write_json_atomic;
use crate::storage::jsonl::{read_jsonl_with_errors, write_jsonl};
use crate::storage::layout::OutputLayout;
use crate::storage::traits::StorageResult;
use serde::{Deserialize, Serialize};

/// Contents of `repos.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoIndex {
    pub run_id: String,
    pub repos: RepoSet,
}

/// Writes the frontier and its repo index
pub fn persist_frontier(
    layout: &OutputLayout,
    frontier: &Frontier,
    repos: &RepoSet,
    run_id: &str,
) -> StorageResult<()> {
    let written = write_jsonl(&layout.discovered_items_path(), frontier.values())?;
    write_json_atomic(
        &layout.repos_path(),
        &RepoIndex {
            run_id: run_id.to_string(),
            repos: repos.clone(),
        },
    )?;

    tracing::info!(
        "Persisted frontier: {} items across {} repos",
        written,
        repos.len()
    );
    Ok(())
}

/// Loads the previously persisted frontier; a missing file is an empty frontier
///
/// Rows are re-keyed by their id, so a hand-edited file with duplicate rows
/// keeps the first occurrence.
pub fn load_frontier(layout: &OutputLayout) -> StorageResult<Frontier> {
    let read = read_jsonl_with_errors::<DiscoveredItem>(&layout.discovered_items_path())?;

    let mut frontier = Frontier::new();
    for item in read.rows {
        frontier.entry(item.id.clone()).or_insert(item);
    }
    Ok(frontier)
}
