//! Convergence telemetry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metrics for one paginated discovery pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass_number: u32,
    pub ids_seen: usize,
    pub repos_seen: usize,
    pub new_ids: usize,
    pub new_repos: usize,
    pub growth_pct: f64,
}

/// Why the controller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceReason {
    ReposStableAndGrowthThresholdMet,
    ConvergedAfterSearchFallback,
    MaxPassesReached,
}

impl ConvergenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReposStableAndGrowthThresholdMet => "repos_stable_and_growth_threshold_met",
            Self::ConvergedAfterSearchFallback => "converged_after_search_fallback",
            Self::MaxPassesReached => "max_passes_reached",
        }
    }
}

impl fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of the convergence controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passes_executed: u32,
    pub converged: bool,
    pub reason: ConvergenceReason,
    pub total_ids: usize,
    pub total_repos: usize,
    pub pass_summaries: Vec<PassSummary>,
    pub fallback_used: bool,
}

/// Per-run discovery totals, written next to the frontier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_items: usize,
    pub total_repos: usize,

    /// Items each source returned before merging, keyed by discovery method
    pub by_source: BTreeMap<String, usize>,

    /// Items the merged frontier credits to each method
    pub merged_by_method: BTreeMap<String, usize>,

    pub convergence: Option<ConvergenceReport>,
}
