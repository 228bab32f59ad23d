//! Extracted detail records and the daily metrics projection

use crate::model::identity::CanonicalId;
use crate::model::item::DiscoveryMethod;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-channel install counts keyed by channel name (`opencode`, `gemini_cli`, ...)
pub type ChannelInstalls = BTreeMap<String, u64>;

/// Full structured record extracted from one detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: CanonicalId,
    pub item_id: String,
    pub owner: String,
    pub repo: String,
    pub canonical_url: String,

    // Popularity
    pub total_installs: Option<u64>,
    pub weekly_installs: Option<u64>,
    pub weekly_installs_raw: Option<String>,
    #[serde(default)]
    pub channel_installs: ChannelInstalls,

    // Descriptive
    pub name: String,
    pub description: Option<String>,
    pub first_seen_date: Option<NaiveDate>,
    pub github_url: Option<String>,
    pub og_image_url: Option<String>,
    pub content: Option<String>,
    pub install_command: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,

    // Provenance
    pub run_id: String,
    pub fetched_at: DateTime<Utc>,
    pub discovery_source: DiscoveryMethod,
    pub source_endpoint: DiscoveryMethod,
    pub discovery_pass: u32,
    pub rank_at_fetch: Option<u32>,
    pub http_status: Option<u16>,
    pub parser_version: String,
    pub content_hash: Option<String>,
}

/// Daily popularity snapshot for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub id: CanonicalId,
    pub snapshot_date: NaiveDate,
    pub total_installs: Option<u64>,
    pub weekly_installs: Option<u64>,
    #[serde(default)]
    pub channel_installs: ChannelInstalls,
}

impl DailyMetrics {
    pub fn from_record(record: &DetailRecord, snapshot_date: NaiveDate) -> Self {
        Self {
            id: record.id.clone(),
            snapshot_date,
            total_installs: record.total_installs,
            weekly_installs: record.weekly_installs,
            channel_installs: record.channel_installs.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_record(owner: &str, repo: &str, item_id: &str) -> DetailRecord {
    DetailRecord {
        id: CanonicalId::new(owner, repo, item_id),
        item_id: item_id.to_lowercase(),
        owner: owner.to_lowercase(),
        repo: repo.to_lowercase(),
        canonical_url: format!("https://skills.sh/{}/{}/{}", owner, repo, item_id),
        total_installs: Some(1200),
        weekly_installs: Some(300),
        weekly_installs_raw: Some("300".to_string()),
        channel_installs: ChannelInstalls::from([("codex".to_string(), 40)]),
        name: item_id.to_string(),
        description: Some("A sample".to_string()),
        first_seen_date: NaiveDate::from_ymd_opt(2025, 1, 15),
        github_url: None,
        og_image_url: None,
        content: None,
        install_command: Some(format!("npx skills add {}/{}", owner, repo)),
        categories: vec!["testing".to_string()],
        run_id: "20250101T000000Z".to_string(),
        fetched_at: Utc::now(),
        discovery_source: DiscoveryMethod::PaginatedApi,
        source_endpoint: DiscoveryMethod::PaginatedApi,
        discovery_pass: 1,
        rank_at_fetch: Some(1),
        http_status: Some(200),
        parser_version: "0.1.0".to_string(),
        content_hash: None,
    }
}
