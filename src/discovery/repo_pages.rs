//! Repo page expansion
//!
//! Each `owner/repo` page links to every item published from that repo.
//! Fetching the pages for already-known repos recovers items that none of
//! the listing sources returned.

use crate::discovery::entries::match_strict_item_path;
use crate::fetch::FetchClient;
use crate::model::{split_source, DiscoveredItem, DiscoveryMethod, Frontier, RepoSet};
use crate::site::SiteUrls;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};

/// Extracts item links for one repo page
///
/// Only `href`s of the exact form `/<owner>/<repo>/<item>` under the same
/// owner and repo (compared case-insensitively) count. The display name is
/// the link text, falling back to the item id.
pub fn parse_repo_page(owner: &str, repo: &str, html: &str) -> Frontier {
    let document = Html::parse_document(html);
    let mut found = Frontier::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return found;
    };

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some((page_owner, page_repo, item_id)) = match_strict_item_path(href) else {
            continue;
        };
        if !page_owner.eq_ignore_ascii_case(owner) || !page_repo.eq_ignore_ascii_case(repo) {
            continue;
        }

        let text = anchor
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let item = DiscoveredItem::new(
            page_owner,
            page_repo,
            item_id,
            Some(text.as_str()),
            DiscoveryMethod::RepoPage,
        );
        found.entry(item.id.clone()).or_insert(item);
    }

    found
}

/// Fetches every repo page with bounded concurrency and unions the results
///
/// A repo whose page cannot be fetched is logged and skipped.
pub async fn expand_from_repo_pages(
    client: &FetchClient,
    site: &SiteUrls,
    repos: &RepoSet,
    concurrency: usize,
) -> Frontier {
    let targets: Vec<(String, String)> = repos.iter().filter_map(|r| split_source(r)).collect();
    tracing::info!("Expanding {} repos via repo pages", targets.len());

    let mut results = stream::iter(targets)
        .map(|(owner, repo)| async move {
            let url = site.repo_page(&owner, &repo);
            match client.fetch_text(&url).await {
                Ok(html) => parse_repo_page(&owner, &repo, &html),
                Err(e) => {
                    tracing::warn!("Failed to fetch repo page {}/{}: {}", owner, repo, e);
                    Frontier::new()
                }
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut discovered = Frontier::new();
    while let Some(found) = results.next().await {
        for (id, item) in found {
            discovered.entry(id).or_insert(item);
        }
    }

    discovered
}
