//! Keyword search enumeration
//!
//! The search endpoint caps results per query, so the sweep walks the whole
//! two-character query space over `a-z0-9` (36 × 36 = 1,296 queries) and
//! unions what comes back. Each query is isolated: a failed query logs and
//! contributes nothing.

use crate::discovery::entries::collect_ranked_entries;
use crate::fetch::FetchClient;
use crate::model::{DiscoveryMethod, Frontier, RepoSet};
use crate::site::SiteUrls;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeSet;

const QUERY_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Every two-character query over `a-z0-9`, in lexicographic alphabet order
pub fn generate_two_char_queries() -> Vec<String> {
    QUERY_ALPHABET
        .chars()
        .flat_map(|a| QUERY_ALPHABET.chars().map(move |b| format!("{}{}", a, b)))
        .collect()
}

/// Runs one search query
///
/// HTTP 400 means the server rejected the query and is treated as an empty
/// result without logging. Any other failure is logged and also yields an
/// empty result.
pub async fn search_one_query(
    client: &FetchClient,
    site: &SiteUrls,
    query: &str,
    limit: u32,
    pass_number: u32,
) -> (Frontier, RepoSet) {
    let url = site.search(query, limit);

    let page = match client.fetch(&url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Search query '{}' failed: {}", query, e);
            return Default::default();
        }
    };

    if page.status == 400 {
        return Default::default();
    }
    if page.status != 200 {
        tracing::warn!("Search query '{}' returned status {}", query, page.status);
        return Default::default();
    }

    let payload: Value = match serde_json::from_slice(&page.body) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Search query '{}' returned invalid JSON", query);
            return Default::default();
        }
    };

    match payload.get("skills").and_then(Value::as_array) {
        Some(entries) => {
            collect_ranked_entries(entries, DiscoveryMethod::QueryEnumeration, pass_number)
        }
        None => Default::default(),
    }
}

/// Result of an enumeration sweep
#[derive(Debug, Default)]
pub struct SearchSweep {
    pub items: Frontier,
    pub repos: RepoSet,
    /// Queries finished in this sweep, in completion order
    pub completed: Vec<String>,
}

/// Options for [`run_search_sweep`]
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub query_limit: u32,
    pub concurrency: usize,
    /// Only run the first `sample` remaining queries
    pub sample: Option<usize>,
    /// Invoke the progress hook after this many completed queries
    pub progress_every: usize,
}

/// Runs the two-character enumeration with bounded concurrency
///
/// Queries in `already_completed` are skipped, so an interrupted sweep
/// resumes where it stopped. Every `progress_every` completions,
/// `on_progress` receives the running set of all completed queries
/// (previous and new) and the items first found since its last call. Items
/// from a finished query are always reported no later than the query itself.
pub async fn run_search_sweep<F>(
    client: &FetchClient,
    site: &SiteUrls,
    options: &SweepOptions,
    already_completed: &BTreeSet<String>,
    mut on_progress: F,
) -> SearchSweep
where
    F: FnMut(&BTreeSet<String>, &Frontier),
{
    let mut remaining: Vec<String> = generate_two_char_queries()
        .into_iter()
        .filter(|q| !already_completed.contains(q))
        .collect();
    if let Some(sample) = options.sample.filter(|s| *s > 0) {
        remaining.truncate(sample);
    }

    tracing::info!(
        "Search sweep: {} queries to run ({} already completed)",
        remaining.len(),
        already_completed.len()
    );

    let mut sweep = SearchSweep::default();
    let mut all_completed = already_completed.clone();
    let mut unreported = Frontier::new();
    let progress_every = options.progress_every.max(1);

    let mut results = stream::iter(remaining)
        .map(|query| async move {
            let (items, repos) =
                search_one_query(client, site, &query, options.query_limit, 1).await;
            (query, items, repos)
        })
        .buffer_unordered(options.concurrency.max(1));

    while let Some((query, items, repos)) = results.next().await {
        for (id, item) in items {
            if !sweep.items.contains_key(&id) {
                unreported.insert(id.clone(), item.clone());
                sweep.items.insert(id, item);
            }
        }
        sweep.repos.extend(repos);
        all_completed.insert(query.clone());
        sweep.completed.push(query);

        if sweep.completed.len() % progress_every == 0 {
            on_progress(&all_completed, &unreported);
            unreported.clear();
        }
    }

    tracing::info!(
        "Search sweep: {} queries, {} items, {} repos",
        sweep.completed.len(),
        sweep.items.len(),
        sweep.repos.len()
    );
    sweep
}

/// Runs the convergence fallback query set sequentially
///
/// Results are tagged with `pass_number`. Each query is isolated.
pub async fn run_fallback_queries(
    client: &FetchClient,
    site: &SiteUrls,
    queries: &[String],
    limit: u32,
    pass_number: u32,
) -> (Frontier, RepoSet) {
    let mut items = Frontier::new();
    let mut repos = RepoSet::new();

    for query in queries {
        let (found, found_repos) = search_one_query(client, site, query, limit, pass_number).await;
        for (id, item) in found {
            items.entry(id).or_insert(item);
        }
        repos.extend(found_repos);
        tokio::task::yield_now().await;
    }

    (items, repos)
}
