//! Quality report
//!
//! Summarizes one extraction run: how many records were produced, which
//! items failed, and how well the core fields are populated. The pipeline
//! adds discovery totals, block-monitor posture and completeness checks
//! before writing it to `reports/quality_report.json`.

use crate::model::{CanonicalId, DetailRecord, DiscoverySummary};
use crate::output::completeness::{BaselineCheck, CompletenessReport};
use crate::storage::FailureRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields whose coverage is reported
pub const CORE_FIELDS: [&str; 3] = ["name", "description", "total_installs"];

/// Number of failing ids listed in the report
pub const FAILURE_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub failures: usize,

    /// First failing ids in sorted order
    pub failure_ids: Vec<String>,

    /// Records missing each core field; fields with no gaps are omitted
    pub missing_counts: BTreeMap<String, usize>,

    /// Percentage of records with each core field present
    pub coverage: BTreeMap<String, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_discovered: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_repos: Option<usize>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub discovery_by_source: BTreeMap<String, usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_escalation_recommended: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineCheck>,
}

/// Builds the record and failure part of the report
pub fn build_quality_report(
    records: &[DetailRecord],
    failures: &BTreeMap<CanonicalId, FailureRecord>,
) -> QualityReport {
    let total = records.len();
    let mut missing_counts: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        if record.name.trim().is_empty() {
            *missing_counts.entry("name".to_string()).or_default() += 1;
        }
        if record.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
            *missing_counts.entry("description".to_string()).or_default() += 1;
        }
        if record.total_installs.is_none() {
            *missing_counts.entry("total_installs".to_string()).or_default() += 1;
        }
    }

    let coverage = CORE_FIELDS
        .iter()
        .map(|field| {
            let missing = missing_counts.get(*field).copied().unwrap_or(0);
            let pct = if total == 0 {
                0.0
            } else {
                (total - missing) as f64 * 100.0 / total as f64
            };
            (field.to_string(), pct)
        })
        .collect();

    // BTreeMap keys are already sorted
    let failure_ids = failures
        .keys()
        .take(FAILURE_SAMPLE_SIZE)
        .map(|id| id.to_string())
        .collect();

    QualityReport {
        total_records: total,
        failures: failures.len(),
        failure_ids,
        missing_counts,
        coverage,
        run_id: None,
        config_hash: None,
        total_discovered: None,
        total_repos: None,
        discovery_by_source: BTreeMap::new(),
        browser_escalation_recommended: None,
        blocked_percent: None,
        completeness: None,
        baseline: None,
    }
}

impl QualityReport {
    /// Attaches discovery totals
    pub fn with_discovery(mut self, summary: &DiscoverySummary) -> Self {
        self.total_discovered = Some(summary.total_items);
        self.total_repos = Some(summary.total_repos);
        self.discovery_by_source = summary.by_source.clone();
        self
    }

    /// True when a completeness or baseline gate reports a regression
    pub fn below_baseline(&self) -> bool {
        self.completeness
            .as_ref()
            .is_some_and(|c| c.status.is_regression())
            || self
                .baseline
                .as_ref()
                .is_some_and(|b| b.status.is_regression())
    }
}
