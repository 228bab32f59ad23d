//! Boundary parsing of untyped listing payloads
//!
//! The listing, search and homepage sources all publish entries shaped like
//! `{"source": "owner/repo", "skillId": "...", "name": "...", "installs": 123}`.
//! Entries that do not match are skipped, never guessed at.

use crate::model::{split_source, DiscoveredItem, DiscoveryMethod, Frontier, RepoSet};
use crate::{FetchError, FetchResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// `/<owner>/<repo>/<item>` with an optional trailing slash
static ITEM_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/?$")
        .expect("hardcoded regex pattern is valid")
});

/// `/<owner>/<repo>/<item>` exactly
static STRICT_ITEM_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$")
        .expect("hardcoded regex pattern is valid")
});

fn captures_to_parts(caps: regex::Captures<'_>) -> Option<(&str, &str, &str)> {
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str()))
}

/// Matches a three-segment item path, tolerating a trailing slash
pub fn match_item_path(path: &str) -> Option<(&str, &str, &str)> {
    ITEM_PATH_RE.captures(path).and_then(captures_to_parts)
}

/// Matches a three-segment item path exactly
pub fn match_strict_item_path(path: &str) -> Option<(&str, &str, &str)> {
    STRICT_ITEM_PATH_RE.captures(path).and_then(captures_to_parts)
}

/// Reads a string-ish JSON field, accepting numbers as well as strings
fn field_as_string(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts one listing entry into a discovery record
///
/// Returns `None` when the entry is not an object, its `source` does not
/// split into `owner/repo`, or it has no `skillId`.
pub fn parse_listing_entry(
    raw: &Value,
    method: DiscoveryMethod,
    pass_number: u32,
    rank: Option<u32>,
) -> Option<DiscoveredItem> {
    let raw = raw.as_object()?;
    let source = field_as_string(raw, "source").unwrap_or_default();
    let item_id = field_as_string(raw, "skillId").filter(|id| !id.is_empty())?;
    let (owner, repo) = split_source(&source)?;
    let name = field_as_string(raw, "name");
    let installs = raw.get("installs").and_then(Value::as_u64);

    Some(
        DiscoveredItem::new(&owner, &repo, &item_id, name.as_deref(), method)
            .with_installs(installs)
            .with_pass(pass_number)
            .with_rank(rank),
    )
}

/// Returns the `skills` array of a listing payload
///
/// A missing key is an empty page; a present key that is not an array is a
/// shape violation.
pub fn skills_array<'a>(payload: &'a Map<String, Value>, url: &str) -> FetchResult<&'a [Value]> {
    match payload.get("skills") {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(FetchError::ShapeViolation {
            url: url.to_string(),
            message: "`skills` is not an array".to_string(),
        }),
    }
}

/// Parses every entry of a ranked response, first occurrence wins
///
/// Ranks are the 1-based position in the response, counting skipped entries.
pub fn collect_ranked_entries(
    entries: &[Value],
    method: DiscoveryMethod,
    pass_number: u32,
) -> (Frontier, RepoSet) {
    let mut items = Frontier::new();
    let mut repos = RepoSet::new();

    for (index, raw) in entries.iter().enumerate() {
        let rank = u32::try_from(index + 1).ok();
        if let Some(item) = parse_listing_entry(raw, method, pass_number, rank) {
            repos.insert(item.repo_key());
            items.entry(item.id.clone()).or_insert(item);
        }
    }

    (items, repos)
}
