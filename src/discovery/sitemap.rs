//! Sitemap discovery
//!
//! Reads `<loc>` elements in the sitemap namespace and keeps URLs on the
//! configured site whose path is exactly `/<owner>/<repo>/<item>`.

use crate::discovery::entries::match_item_path;
use crate::fetch::FetchClient;
use crate::model::{DiscoveredItem, DiscoveryMethod, Frontier, RepoSet};
use crate::site::SiteUrls;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::collections::BTreeSet;
use url::Url;

/// Namespace of sitemap protocol elements
pub const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Collects the text of every namespaced `<loc>` element
///
/// Returns `None` if the document is not well-formed XML.
fn extract_locations(xml: &str) -> Option<Vec<String>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locations = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ResolveResult::Bound(Namespace(ns)), Event::Start(e)))
                if ns == SITEMAP_NS && e.local_name().as_ref() == b"loc" =>
            {
                current = Some(String::new());
            }
            Ok((_, Event::Text(text))) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(text.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok((_, Event::CData(data))) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok((_, Event::End(e))) if e.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    locations.push(loc.trim().to_string());
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                tracing::error!(
                    "Failed to parse sitemap XML at position {}: {}",
                    reader.buffer_position(),
                    e
                );
                return None;
            }
            _ => {}
        }
    }

    Some(locations)
}

/// Parses a sitemap document into discovery records, one per unique item
///
/// The display name is the item id as it appears in the URL.
pub fn parse_sitemap_xml(xml: &str, site: &SiteUrls) -> Vec<DiscoveredItem> {
    let Some(locations) = extract_locations(xml) else {
        return Vec::new();
    };

    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for loc in locations {
        let Ok(url) = Url::parse(&loc) else {
            continue;
        };
        if url.query().is_some() || url.fragment().is_some() {
            continue;
        }
        let Some(path) = site.relative_path(&url) else {
            continue;
        };
        let Some((owner, repo, item_id)) = match_item_path(path) else {
            continue;
        };

        let item = DiscoveredItem::new(owner, repo, item_id, None, DiscoveryMethod::Sitemap);
        if seen.insert(item.id.clone()) {
            items.push(item);
        }
    }

    tracing::info!("Sitemap parsed: {} item URLs found", items.len());
    items
}

/// Fetches and parses the sitemap; any failure yields an empty result
pub async fn run_sitemap_discovery(client: &FetchClient, site: &SiteUrls) -> (Frontier, RepoSet) {
    let xml = match client.fetch_text(&site.sitemap()).await {
        Ok(xml) => xml,
        Err(e) => {
            tracing::warn!("Failed to fetch sitemap: {}", e);
            return Default::default();
        }
    };

    let mut items = Frontier::new();
    let mut repos = RepoSet::new();
    for item in parse_sitemap_xml(&xml, site) {
        repos.insert(item.repo_key());
        items.insert(item.id.clone(), item);
    }
    (items, repos)
}
