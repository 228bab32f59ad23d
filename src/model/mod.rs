//! Core data types shared by discovery, extraction and storage
//!
//! - [`CanonicalId`]: case-insensitive `owner/repo/item` identity
//! - [`DiscoveredItem`]: one frontier entry and its provenance
//! - [`DetailRecord`]: the full record extracted from a detail page
//! - [`ConvergenceReport`]: per-pass telemetry of the paginated crawl
//! - [`DiscoverySummary`]: per-source totals of one discovery run

mod convergence;
mod identity;
mod item;
mod record;

pub use convergence::{ConvergenceReason, ConvergenceReport, DiscoverySummary, PassSummary};
pub use identity::{repo_key, split_source, CanonicalId};
pub use item::{DiscoveredItem, DiscoveryMethod, Frontier};
pub use record::{ChannelInstalls, DailyMetrics, DetailRecord};

#[cfg(test)]
pub(crate) use record::sample_record;

use std::collections::BTreeSet;

/// Set of `owner/repo` keys seen during discovery
pub type RepoSet = BTreeSet<String>;
