//! Paginated all-time listing crawl

use crate::discovery::entries::{parse_listing_entry, skills_array};
use crate::fetch::FetchClient;
use crate::model::{DiscoveryMethod, Frontier, RepoSet};
use crate::site::SiteUrls;
use crate::FetchResult;
use serde_json::Value;

/// Crawls listing pages `1..` until the server reports no more pages
///
/// Entries with an unparsable source or a missing id are skipped but still
/// advance the rank counter, so ranks stay aligned with server positions.
///
/// # Errors
///
/// Any page that cannot be fetched, or whose `skills` field is not an array,
/// aborts the whole pass.
pub async fn crawl_listing_once(
    client: &FetchClient,
    site: &SiteUrls,
    pass_number: u32,
    max_pages: u32,
) -> FetchResult<(Frontier, RepoSet)> {
    let mut items = Frontier::new();
    let mut repos = RepoSet::new();
    let mut rank: u32 = 1;
    let mut page: u32 = 1;

    loop {
        let url = site.listing_page(page);
        let payload = client.fetch_json(&url).await?;

        for raw in skills_array(&payload, &url)? {
            if let Some(item) =
                parse_listing_entry(raw, DiscoveryMethod::PaginatedApi, pass_number, Some(rank))
            {
                repos.insert(item.repo_key());
                items.entry(item.id.clone()).or_insert(item);
            }
            rank = rank.saturating_add(1);
        }

        let has_more = payload
            .get("hasMore")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !has_more {
            break;
        }
        if page >= max_pages {
            tracing::warn!(
                "Listing pass {} stopped at page limit {} with more pages reported",
                pass_number,
                max_pages
            );
            break;
        }
        page += 1;
    }

    tracing::debug!(
        "Listing pass {}: {} pages, {} items, {} repos",
        pass_number,
        page,
        items.len(),
        repos.len()
    );
    Ok((items, repos))
}
