//! Discovery records

use crate::model::identity::CanonicalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How an item was first found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    PaginatedApi,
    QueryEnumeration,
    Sitemap,
    HomepagePayload,
    RepoPage,
    ManualBrowser,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaginatedApi => "paginated_api",
            Self::QueryEnumeration => "query_enumeration",
            Self::Sitemap => "sitemap",
            Self::HomepagePayload => "homepage_payload",
            Self::RepoPage => "repo_page",
            Self::ManualBrowser => "manual_browser",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "paginated_api" => Some(Self::PaginatedApi),
            "query_enumeration" => Some(Self::QueryEnumeration),
            "sitemap" => Some(Self::Sitemap),
            "homepage_payload" => Some(Self::HomepagePayload),
            "repo_page" => Some(Self::RepoPage),
            "manual_browser" => Some(Self::ManualBrowser),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A minimal record of one item found during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub id: CanonicalId,

    /// Item id as published, lowercased
    pub item_id: String,

    pub owner: String,
    pub repo: String,

    /// Display name; falls back to the raw item id
    pub name: String,

    /// Install count reported by the source, when it reports one
    pub installs: Option<u64>,

    pub discovered_via: DiscoveryMethod,

    /// Where the record was fetched from; currently always `discovered_via`
    pub source_endpoint: DiscoveryMethod,

    /// 1-based discovery pass
    pub discovery_pass: u32,

    /// 1-based position within the source response, if the source is ordered
    pub rank_at_fetch: Option<u32>,

    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredItem {
    /// Creates a record for a first pass, unranked discovery
    pub fn new(
        owner: &str,
        repo: &str,
        raw_item_id: &str,
        name: Option<&str>,
        method: DiscoveryMethod,
    ) -> Self {
        let display = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| raw_item_id.trim());

        Self {
            id: CanonicalId::new(owner, repo, raw_item_id),
            item_id: raw_item_id.trim().to_lowercase(),
            owner: owner.trim().to_lowercase(),
            repo: repo.trim().to_lowercase(),
            name: display.to_string(),
            installs: None,
            discovered_via: method,
            source_endpoint: method,
            discovery_pass: 1,
            rank_at_fetch: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_installs(mut self, installs: Option<u64>) -> Self {
        self.installs = installs;
        self
    }

    pub fn with_pass(mut self, pass: u32) -> Self {
        self.discovery_pass = pass.max(1);
        self
    }

    pub fn with_rank(mut self, rank: Option<u32>) -> Self {
        self.rank_at_fetch = rank.filter(|r| *r >= 1);
        self
    }

    /// The `owner/repo` key of this item
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A merged frontier keyed by canonical identity, in deterministic order
pub type Frontier = BTreeMap<CanonicalId, DiscoveredItem>;
