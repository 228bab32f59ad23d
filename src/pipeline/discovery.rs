//! Discovery phase
//!
//! Runs every enabled source concurrently, expands the repos they surfaced
//! through repo pages, merges everything into one frontier and persists it
//! together with the discovery summary and the final checkpoint.

use crate::config::Config;
use crate::discovery::{
    crawl_listing_once, expand_from_repo_pages, merge_frontiers, run_homepage_discovery,
    run_search_sweep, run_sitemap_discovery, ConvergenceController, SiteListing, SweepOptions,
};
use crate::fetch::FetchClient;
use crate::model::{
    ConvergenceReport, DiscoveredItem, DiscoveryMethod, DiscoverySummary, Frontier, RepoSet,
};
use crate::pipeline::load_resumable;
use crate::site::SiteUrls;
use crate::storage::{
    append_jsonl, load_frontier, persist_frontier, read_jsonl, save_checkpoint,
    write_json_atomic, DiscoveryCheckpoint, OutputLayout, StorageResult,
};
use crate::ScoutError;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Key used in per-source counts for the frontier carried over from an
/// interrupted run
pub const PREVIOUS_FRONTIER_SOURCE: &str = "previous_frontier";

/// Output of one discovery phase
#[derive(Debug)]
pub struct DiscoveryRun {
    pub frontier: Frontier,
    pub repos: RepoSet,
    pub summary: DiscoverySummary,
}

/// Runs the paginated listing, through the convergence controller when enabled
async fn discover_listing(
    config: &Config,
    client: &FetchClient,
    site: &SiteUrls,
    run_id: &str,
) -> (Frontier, RepoSet, Option<ConvergenceReport>) {
    let discovery = &config.discovery;

    if discovery.use_convergence {
        let listing = SiteListing {
            client: client.clone(),
            site: site.clone(),
            max_pages: discovery.max_listing_pages,
            search_query_limit: discovery.search_query_limit,
        };
        let mut controller = ConvergenceController::new(&listing, &config.convergence);
        let outcome = controller.run(run_id).await;
        return (outcome.items, outcome.repos, Some(outcome.report));
    }

    match crawl_listing_once(client, site, 1, discovery.max_listing_pages).await {
        Ok((items, repos)) => (items, repos, None),
        Err(e) => {
            tracing::warn!("Listing crawl failed, continuing without it: {}", e);
            (Frontier::new(), RepoSet::new(), None)
        }
    }
}

/// Persists sweep progress: first the newly found items, then the checkpoint
///
/// The checkpoint never names a completed query whose items are not on disk.
fn save_sweep_progress(
    checkpoint_path: &Path,
    items_path: &Path,
    checkpoint: &mut DiscoveryCheckpoint,
    completed: &BTreeSet<String>,
    found: &Frontier,
) -> StorageResult<()> {
    append_jsonl(items_path, found.values())?;

    checkpoint.search_queries_completed = completed.clone();
    checkpoint.last_updated = Utc::now();
    save_checkpoint(checkpoint_path, &*checkpoint)?;

    tracing::info!(
        "Discovery checkpoint saved: {} queries completed, {} new items",
        completed.len(),
        found.len()
    );
    Ok(())
}

/// Items the completed queries of an interrupted sweep had found
fn load_swept_items(path: &Path) -> Frontier {
    let rows: Vec<DiscoveredItem> = read_jsonl(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to read swept items {}: {}", path.display(), e);
        Vec::new()
    });

    let mut items = Frontier::new();
    for item in rows {
        items.entry(item.id.clone()).or_insert(item);
    }
    items
}

fn remove_swept_items(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove swept items {}: {}", path.display(), e),
    }
}

/// Runs the discovery phase
///
/// # Arguments
///
/// * `config` - Run configuration
/// * `client` - Shared fetch client
/// * `site` - Endpoint URLs
/// * `layout` - Output directory layout
/// * `run_id` - Identifier stamped on every artifact
/// * `sample` - Caps the query sweep to its first `n` remaining queries
/// * `resume` - Whether an unfinished discovery checkpoint may be continued
///
/// # Returns
///
/// * `Ok(DiscoveryRun)` - The merged frontier, its repos and the summary
/// * `Err(ScoutError)` - An unusable checkpoint in strict mode, or a write failure
pub async fn run_discovery(
    config: &Config,
    client: &FetchClient,
    site: &SiteUrls,
    layout: &OutputLayout,
    run_id: &str,
    sample: Option<usize>,
    resume: bool,
) -> Result<DiscoveryRun, ScoutError> {
    let started_at = Utc::now();
    let discovery = &config.discovery;
    let checkpoint_path = layout.discovery_checkpoint_path();
    let swept_path = layout.partial_discovery_path();

    let resumed: Option<DiscoveryCheckpoint> = if resume {
        load_resumable(&checkpoint_path, config.output.strict_checkpoints)?
    } else {
        None
    };

    let (previous_frontier, swept_before) = match &resumed {
        Some(checkpoint) => {
            let swept = load_swept_items(&swept_path);
            tracing::info!(
                "Resuming discovery of run {} ({} queries already completed, {} items found by them)",
                checkpoint.run_id,
                checkpoint.search_queries_completed.len(),
                swept.len()
            );
            (load_frontier(layout)?, swept)
        }
        None => {
            remove_swept_items(&swept_path);
            (Frontier::new(), Frontier::new())
        }
    };

    let mut checkpoint = resumed.unwrap_or_else(|| DiscoveryCheckpoint::new(run_id));
    checkpoint.run_id = run_id.to_string();
    checkpoint.finished = false;

    let sweep_options = SweepOptions {
        query_limit: discovery.search_query_limit,
        concurrency: discovery.search_batch_size,
        sample,
        progress_every: discovery.search_batch_size,
    };
    let already_completed = checkpoint.search_queries_completed.clone();
    let mut progress_checkpoint = checkpoint.clone();

    let listing_fut = discover_listing(config, client, site, run_id);
    let sitemap_fut = async {
        if discovery.use_sitemap {
            run_sitemap_discovery(client, site).await
        } else {
            Default::default()
        }
    };
    let homepage_fut = async {
        if discovery.use_homepage {
            run_homepage_discovery(client, site).await
        } else {
            Default::default()
        }
    };
    let search_fut = async {
        if !discovery.use_search {
            return Default::default();
        }
        run_search_sweep(
            client,
            site,
            &sweep_options,
            &already_completed,
            |done, found| {
                if let Err(e) = save_sweep_progress(
                    &checkpoint_path,
                    &swept_path,
                    &mut progress_checkpoint,
                    done,
                    found,
                ) {
                    tracing::error!("Failed to save discovery checkpoint: {}", e);
                }
            },
        )
        .await
    };

    let (listing, sitemap, homepage, sweep) =
        tokio::join!(listing_fut, sitemap_fut, homepage_fut, search_fut);
    let (listing_items, listing_repos, convergence) = listing;
    let (sitemap_items, sitemap_repos) = sitemap;
    let (homepage_items, homepage_repos) = homepage;

    // Queries completed before the interruption count as part of this sweep
    let mut search_items = sweep.items;
    for (id, item) in swept_before {
        search_items.entry(id).or_insert(item);
    }

    let mut repos = RepoSet::new();
    repos.extend(listing_repos);
    repos.extend(sitemap_repos);
    repos.extend(homepage_repos);
    repos.extend(sweep.repos);
    repos.extend(search_items.values().map(|item| item.repo_key()));

    let repo_page_items = if discovery.expand_repo_pages {
        expand_from_repo_pages(client, site, &repos, discovery.repo_page_concurrency).await
    } else {
        Frontier::new()
    };

    let mut by_source: BTreeMap<String, usize> = [
        (DiscoveryMethod::PaginatedApi, listing_items.len()),
        (DiscoveryMethod::QueryEnumeration, search_items.len()),
        (DiscoveryMethod::Sitemap, sitemap_items.len()),
        (DiscoveryMethod::HomepagePayload, homepage_items.len()),
        (DiscoveryMethod::RepoPage, repo_page_items.len()),
    ]
    .into_iter()
    .map(|(method, count)| (method.as_str().to_string(), count))
    .collect();
    if !previous_frontier.is_empty() {
        by_source.insert(PREVIOUS_FRONTIER_SOURCE.to_string(), previous_frontier.len());
    }

    // Earlier groups win on conflicting ids
    let frontier = merge_frontiers([
        listing_items,
        search_items,
        sitemap_items,
        homepage_items,
        repo_page_items,
        previous_frontier,
    ]);
    repos.extend(frontier.values().map(|item| item.repo_key()));

    let mut merged_by_method: BTreeMap<String, usize> = BTreeMap::new();
    for item in frontier.values() {
        *merged_by_method
            .entry(item.discovered_via.as_str().to_string())
            .or_default() += 1;
    }

    tracing::info!(
        "Discovery merged {} items across {} repos",
        frontier.len(),
        repos.len()
    );
    for (source, count) in &by_source {
        tracing::info!("  {}: {}", source, count);
    }

    persist_frontier(layout, &frontier, &repos, run_id)?;

    let summary = DiscoverySummary {
        run_id: run_id.to_string(),
        started_at,
        finished_at: Utc::now(),
        total_items: frontier.len(),
        total_repos: repos.len(),
        by_source,
        merged_by_method,
        convergence,
    };
    write_json_atomic(&layout.discovery_summary_path(), &summary)?;
    if let Some(report) = &summary.convergence {
        write_json_atomic(&layout.convergence_report_path(), report)?;
    }

    let mut completed: BTreeSet<String> = already_completed;
    completed.extend(sweep.completed);
    checkpoint.search_queries_completed = completed;
    checkpoint.repos_crawled = repos.clone();
    checkpoint.discovered_ids = frontier.keys().cloned().collect();
    checkpoint.pass_summaries = summary
        .convergence
        .as_ref()
        .map(|report| report.pass_summaries.clone())
        .unwrap_or_default();
    checkpoint.last_updated = Utc::now();
    checkpoint.finished = true;
    save_checkpoint(&checkpoint_path, &checkpoint)?;
    remove_swept_items(&swept_path);

    Ok(DiscoveryRun {
        frontier,
        repos,
        summary,
    })
}
