//! Snapshot completeness checks
//!
//! Two gates guard against silently shrinking datasets: a comparison with
//! the most recent earlier snapshot on disk, and an explicit comparison with
//! an operator-supplied baseline total.

use crate::storage::{count_jsonl_rows_with_errors, OutputLayout, StorageResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome of a completeness comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessStatus {
    /// No earlier snapshot to compare with
    NoBaseline,
    /// At least as many records as the baseline
    Ok,
    /// Fewer records than the baseline
    Regression,
    /// The earlier snapshot had unreadable rows, so its count is a lower bound
    Degraded,
}

impl CompletenessStatus {
    pub fn is_regression(&self) -> bool {
        matches!(self, CompletenessStatus::Regression)
    }
}

/// Comparison against the previous snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub previous_snapshot_date: Option<NaiveDate>,
    pub previous_count: Option<usize>,
    pub previous_parse_errors: Option<usize>,
    pub current_count: usize,
    pub delta: Option<i64>,
    pub delta_pct: Option<f64>,
    pub status: CompletenessStatus,
}

/// Comparison against an explicit baseline total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineCheck {
    pub status: CompletenessStatus,
    pub current_total: usize,
    pub baseline_total: usize,
    pub delta: i64,
    pub delta_pct: f64,
}

fn signed_delta(current: usize, previous: usize) -> i64 {
    current as i64 - previous as i64
}

fn percent(delta: i64, base: usize) -> f64 {
    if base == 0 {
        0.0
    } else {
        delta as f64 * 100.0 / base as f64
    }
}

/// Compares `current_count` with the latest snapshot dated before `current_date`
///
/// The earlier snapshot's `records.jsonl` is counted tolerantly; if any of
/// its lines were unreadable the status is `degraded` regardless of the delta.
pub fn compare_with_previous_snapshot(
    layout: &OutputLayout,
    current_date: NaiveDate,
    current_count: usize,
) -> StorageResult<CompletenessReport> {
    let previous_date = layout
        .snapshot_dates()?
        .into_iter()
        .filter(|date| *date < current_date)
        .next_back();

    let Some(previous_date) = previous_date else {
        return Ok(CompletenessReport {
            previous_snapshot_date: None,
            previous_count: None,
            previous_parse_errors: None,
            current_count,
            delta: None,
            delta_pct: None,
            status: CompletenessStatus::NoBaseline,
        });
    };

    let (previous_count, previous_parse_errors) =
        count_jsonl_rows_with_errors(&layout.records_path(previous_date))?;
    let delta = signed_delta(current_count, previous_count);

    let status = if previous_parse_errors > 0 {
        CompletenessStatus::Degraded
    } else if delta >= 0 {
        CompletenessStatus::Ok
    } else {
        CompletenessStatus::Regression
    };

    Ok(CompletenessReport {
        previous_snapshot_date: Some(previous_date),
        previous_count: Some(previous_count),
        previous_parse_errors: Some(previous_parse_errors),
        current_count,
        delta: Some(delta),
        delta_pct: Some(percent(delta, previous_count)),
        status,
    })
}

/// Checks a current total against an explicit baseline
pub fn verify_completeness(current_total: usize, baseline_total: usize) -> BaselineCheck {
    let delta = signed_delta(current_total, baseline_total);
    BaselineCheck {
        status: if current_total >= baseline_total {
            CompletenessStatus::Ok
        } else {
            CompletenessStatus::Regression
        },
        current_total,
        baseline_total,
        delta,
        delta_pct: percent(delta, baseline_total),
    }
}
