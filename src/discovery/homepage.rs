//! Homepage embedded-payload discovery
//!
//! The homepage ships its leaderboard as server-rendered payload chunks
//! pushed from inline scripts (`self.__next_f.push([1,"..."])`). Each chunk
//! is a JSON string literal containing JSON fragments; arrays and objects
//! that mention an id-like key are pulled out and parsed as listing entries.

use crate::discovery::entries::parse_listing_entry;
use crate::fetch::FetchClient;
use crate::model::{DiscoveredItem, DiscoveryMethod, Frontier, RepoSet};
use crate::site::SiteUrls;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PUSH_CHUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)self\.__next_f\.push\(\[1,"((?:[^"\\]|\\.)*)"\]\)"#)
        .expect("hardcoded regex pattern is valid")
});

static ID_ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[(?:[^\[\]]*"(?:skillId|id)"[^\[\]]*)\]"#)
        .expect("hardcoded regex pattern is valid")
});

static ID_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"(?:skillId|id)"[^{}]*\}"#).expect("hardcoded regex pattern is valid")
});

/// Extracts and decodes every pushed payload chunk, in page order
///
/// A chunk that is not a valid JSON string literal is kept raw.
pub fn extract_payload_chunks(html: &str) -> Vec<String> {
    PUSH_CHUNK_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|raw| {
            let raw = raw.as_str();
            serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
        })
        .collect()
}

/// Extracts JSON objects from a chunk: members of id-bearing arrays first,
/// then standalone id-bearing objects
pub fn extract_json_objects(text: &str) -> Vec<Map<String, Value>> {
    let mut results = Vec::new();

    for found in ID_ARRAY_RE.find_iter(text) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(found.as_str()) {
            results.extend(items.into_iter().filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            }));
        }
    }

    for found in ID_OBJECT_RE.find_iter(text) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(found.as_str()) {
            results.push(map);
        }
    }

    results
}

/// Parses the homepage into ranked, deduplicated discovery records
///
/// Only objects carrying `skillId` are considered. Rank is the position of
/// the object among those candidates, in first-seen order.
pub fn parse_homepage_html(html: &str) -> Vec<DiscoveredItem> {
    let candidates: Vec<Value> = extract_payload_chunks(html)
        .iter()
        .flat_map(|chunk| extract_json_objects(chunk))
        .filter(|obj| obj.contains_key("skillId"))
        .map(Value::Object)
        .collect();

    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for (index, raw) in candidates.iter().enumerate() {
        let rank = u32::try_from(index + 1).ok();
        let Some(item) = parse_listing_entry(raw, DiscoveryMethod::HomepagePayload, 1, rank) else {
            continue;
        };
        if seen.insert(item.id.clone()) {
            items.push(item);
        }
    }

    tracing::info!("Homepage payload parsed: {} items found", items.len());
    items
}

/// Fetches the homepage and extracts its embedded listing; failures yield nothing
pub async fn run_homepage_discovery(client: &FetchClient, site: &SiteUrls) -> (Frontier, RepoSet) {
    let html = match client.fetch_text(&site.homepage()).await {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Failed to fetch homepage for payload discovery: {}", e);
            return Default::default();
        }
    };

    let mut items = Frontier::new();
    let mut repos = RepoSet::new();
    for item in parse_homepage_html(&html) {
        repos.insert(item.repo_key());
        items.insert(item.id.clone(), item);
    }
    (items, repos)
}
