//! Output module for run reports and snapshot statistics
//!
//! This module handles:
//! - The per-run quality report
//! - Completeness checks against earlier snapshots and explicit baselines
//! - Printing statistics from a snapshot database

pub mod completeness;
pub mod quality;
pub mod stats;

pub use completeness::{
    compare_with_previous_snapshot, verify_completeness, BaselineCheck, CompletenessReport,
    CompletenessStatus,
};
pub use quality::{build_quality_report, QualityReport, CORE_FIELDS, FAILURE_SAMPLE_SIZE};
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};
