//! Detail page parser
//!
//! This module turns one detail page into a [`DetailRecord`]:
//! - Structured fields from tags (`h1`, meta description, canonical link,
//!   Open Graph image, GitHub link, install command, category tags)
//! - Popularity figures matched in the page's full text (weekly installs,
//!   per-channel installs, first-seen date)
//!
//! A page with neither a canonical link nor an `<h1>` is not a detail page
//! (an error shell, an interstitial) and is rejected as a soft error.

use crate::extraction::text::{parse_compact_number, parse_first_seen_date};
use crate::model::{ChannelInstalls, DetailRecord, DiscoveredItem};
use crate::site::SiteUrls;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Why a fetched page could not be turned into a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The page is not the expected kind of page
    #[error("soft error: {0}")]
    Soft(String),

    /// A required value is present but malformed
    #[error("invalid value: {0}")]
    Value(String),
}

static WEEKLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9][0-9,\.]*\s*[KMB]?)\s*/\s*week").expect("hardcoded regex pattern is valid")
});

static FIRST_SEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)First seen:\s*([A-Za-z]{3,9}\s+\d{1,2},\s+\d{4})")
        .expect("hardcoded regex pattern is valid")
});

/// Channel label as shown on the page, and the key it is stored under
const CHANNEL_LABELS: [(&str, &str); 6] = [
    ("opencode", "opencode"),
    ("codex", "codex"),
    ("gemini-cli", "gemini_cli"),
    ("github-copilot", "github_copilot"),
    ("amp", "amp"),
    ("kimi-cli", "kimi_cli"),
];

static CHANNEL_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CHANNEL_LABELS
        .iter()
        .map(|(label, key)| {
            let pattern = format!(r"(?i){}\s+([0-9][0-9,\.]*[KMB]?)\b", regex::escape(label));
            (
                *key,
                Regex::new(&pattern).expect("hardcoded regex pattern is valid"),
            )
        })
        .collect()
});

/// Fields parsed from a detail page, before provenance is attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDetail {
    pub name: Option<String>,
    pub description: Option<String>,
    pub canonical_url: Option<String>,
    pub og_image_url: Option<String>,
    pub github_url: Option<String>,
    pub weekly_installs_raw: Option<String>,
    pub weekly_installs: Option<u64>,
    pub channel_installs: ChannelInstalls,
    pub first_seen_date: Option<NaiveDate>,
    pub install_command: Option<String>,
    pub categories: Vec<String>,
    pub content: Option<String>,
}

/// Run-level values stamped onto every record
#[derive(Debug, Clone)]
pub struct RecordContext<'a> {
    pub site: &'a SiteUrls,
    pub run_id: &'a str,
    pub parser_version: &'a str,
}

/// Parses detail page HTML
///
/// # Arguments
///
/// * `html` - The page content
/// * `page_url` - The URL the page was fetched from, for resolving relative links
///
/// # Returns
///
/// * `Ok(ParsedDetail)` - The page looks like a detail page
/// * `Err(ExtractError::Soft)` - Neither a canonical link nor an `<h1>` is present
/// * `Err(ExtractError::Value)` - The canonical link is not an http(s) URL
pub fn parse_detail_page(html: &str, page_url: &Url) -> Result<ParsedDetail, ExtractError> {
    let document = Html::parse_document(html);

    let canonical_href = first_attr(&document, "link[rel='canonical'][href]", "href");
    let name = joined_text(&document, "h1");
    let has_h1 = has_match(&document, "h1");

    if canonical_href.is_none() && !has_h1 {
        return Err(ExtractError::Soft(
            "page has neither a canonical link nor a heading".to_string(),
        ));
    }

    let canonical_url = match canonical_href {
        Some(href) => Some(
            resolve_http_url(&href, page_url)
                .ok_or_else(|| ExtractError::Value(format!("canonical URL {:?}", href)))?,
        ),
        None => None,
    };

    let full_text = document.root_element().text().collect::<Vec<_>>().join(" ");

    let (weekly_installs_raw, weekly_installs) = match WEEKLY_RE.captures(&full_text) {
        Some(caps) => {
            let raw = caps[1].trim().to_string();
            let parsed = parse_compact_number(&raw);
            (Some(raw), parsed)
        }
        None => (None, None),
    };

    let first_seen_date = FIRST_SEEN_RE
        .captures(&full_text)
        .and_then(|caps| parse_first_seen_date(&caps[1]));

    Ok(ParsedDetail {
        name,
        description: first_attr(&document, "meta[name='description'][content]", "content"),
        canonical_url,
        og_image_url: first_attr(&document, "meta[property='og:image'][content]", "content")
            .and_then(|href| resolve_http_url(&href, page_url)),
        github_url: first_attr(&document, "a[href*='github.com']", "href")
            .and_then(|href| resolve_http_url(&href, page_url)),
        weekly_installs_raw,
        weekly_installs,
        channel_installs: parse_channel_installs(&full_text),
        first_seen_date,
        install_command: extract_install_command(&document),
        categories: extract_categories(&document),
        content: extract_content(&document),
    })
}

/// Per-channel counts from free text; channels without a parsable count are omitted
pub fn parse_channel_installs(text: &str) -> ChannelInstalls {
    let mut channels = ChannelInstalls::new();
    for (key, re) in CHANNEL_RES.iter() {
        if let Some(count) = re
            .captures(text)
            .and_then(|caps| parse_compact_number(&caps[1]))
        {
            channels.insert((*key).to_string(), count);
        }
    }
    channels
}

/// Parses one fetched page into a full record
///
/// Total installs always come from the discovery entry, never from the page.
/// The content hash is the SHA-256 of the raw response body.
pub fn extract_detail_record(
    item: &DiscoveredItem,
    body: &[u8],
    http_status: Option<u16>,
    fetched_at: DateTime<Utc>,
    context: &RecordContext<'_>,
) -> Result<DetailRecord, ExtractError> {
    let detail_url = context.site.detail_page(&item.owner, &item.repo, &item.item_id);
    let page_url = Url::parse(&detail_url)
        .map_err(|e| ExtractError::Value(format!("detail URL {}: {}", detail_url, e)))?;

    let html = String::from_utf8_lossy(body);
    let parsed = parse_detail_page(&html, &page_url)?;

    Ok(DetailRecord {
        id: item.id.clone(),
        item_id: item.item_id.clone(),
        owner: item.owner.clone(),
        repo: item.repo.clone(),
        canonical_url: parsed.canonical_url.unwrap_or(detail_url),
        total_installs: item.installs,
        weekly_installs: parsed.weekly_installs,
        weekly_installs_raw: parsed.weekly_installs_raw,
        channel_installs: parsed.channel_installs,
        name: parsed.name.unwrap_or_else(|| item.name.clone()),
        description: parsed.description,
        first_seen_date: parsed.first_seen_date,
        github_url: parsed.github_url,
        og_image_url: parsed.og_image_url,
        content: parsed.content,
        install_command: parsed.install_command,
        categories: parsed.categories,
        run_id: context.run_id.to_string(),
        fetched_at,
        discovery_source: item.discovered_via,
        source_endpoint: item.source_endpoint,
        discovery_pass: item.discovery_pass,
        rank_at_fetch: item.rank_at_fetch,
        http_status,
        parser_version: context.parser_version.to_string(),
        content_hash: Some(hex::encode(Sha256::digest(body))),
    })
}

fn has_match(document: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

/// First non-empty trimmed value of `attr` among elements matching `selector`
fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of every matching element, joined with spaces
fn joined_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = document
        .select(&selector)
        .map(|element| element_text(&element))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(text).filter(|t| !t.is_empty())
}

/// First `code`/`pre` block that starts with an install invocation
fn extract_install_command(document: &Html) -> Option<String> {
    let selector = Selector::parse("code, pre").ok()?;
    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .find(|text| text.starts_with("npx skills add") || text.starts_with("skills add"))
}

fn extract_categories(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[class*='tag'], a[class*='category']") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|element| element_text(&element))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Rendered markdown text; nested matches are only counted once
fn extract_content(document: &Html) -> Option<String> {
    let selector = Selector::parse("article, div[class*='markdown']").ok()?;
    let matched: Vec<ElementRef<'_>> = document.select(&selector).collect();
    let ids: HashSet<_> = matched.iter().map(|e| e.id()).collect();

    let text = matched
        .iter()
        .filter(|element| !element.ancestors().any(|a| ids.contains(&a.id())))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(text).filter(|t| !t.is_empty())
}

/// Resolves `href` against the page and keeps it only if it is http(s)
fn resolve_http_url(href: &str, page_url: &Url) -> Option<String> {
    let resolved = page_url.join(href.trim()).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiscoveryMethod;

    const DETAIL_HTML: &str = r#"<html><head>
<link rel="canonical" href="https://skills.sh/acme/tools/lint">
<meta name="description" content="Lints your code">
<meta property="og:image" content="/og/lint.png">
</head><body>
<h1>Lint <span>Helper</span></h1>
<a href="https://github.com/acme/tools">Repository</a>
<a class="tag-link" href="/t/quality">quality</a>
<a class="category" href="/c/dev">dev</a>
<p>1.2K / week</p>
<p>First seen: Jan 5, 2025</p>
<ul><li>opencode 340</li><li>codex 1,024</li><li>gemini-cli 2.5K</li><li>amp n/a</li></ul>
<pre><code>npx skills add acme/tools --skill lint</code></pre>
<article><h2>Usage</h2><div class="markdown-body"><p>Run it.</p></div></article>
</body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://skills.sh/acme/tools/lint").unwrap()
    }

    #[test]
    fn test_parse_full_page() {
        let parsed = parse_detail_page(DETAIL_HTML, &page_url()).unwrap();

        assert_eq!(parsed.name.as_deref(), Some("Lint Helper"));
        assert_eq!(parsed.description.as_deref(), Some("Lints your code"));
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://skills.sh/acme/tools/lint")
        );
        assert_eq!(
            parsed.og_image_url.as_deref(),
            Some("https://skills.sh/og/lint.png")
        );
        assert_eq!(
            parsed.github_url.as_deref(),
            Some("https://github.com/acme/tools")
        );
        assert_eq!(parsed.weekly_installs_raw.as_deref(), Some("1.2K"));
        assert_eq!(parsed.weekly_installs, Some(1_200));
        assert_eq!(parsed.first_seen_date, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert_eq!(
            parsed.install_command.as_deref(),
            Some("npx skills add acme/tools --skill lint")
        );
        assert_eq!(parsed.categories, vec!["quality", "dev"]);
        assert_eq!(parsed.content.as_deref(), Some("Usage Run it."));

        assert_eq!(parsed.channel_installs.get("opencode"), Some(&340));
        assert_eq!(parsed.channel_installs.get("codex"), Some(&1_024));
        assert_eq!(parsed.channel_installs.get("gemini_cli"), Some(&2_500));
        assert!(!parsed.channel_installs.contains_key("amp"));
    }

    #[test]
    fn test_page_without_canonical_or_heading_is_soft_error() {
        let html = "<html><body><p>Something went wrong</p></body></html>";
        let result = parse_detail_page(html, &page_url());
        assert!(matches!(result, Err(ExtractError::Soft(_))));
    }

    #[test]
    fn test_heading_alone_is_enough() {
        let html = "<html><body><h1>Only a heading</h1></body></html>";
        let parsed = parse_detail_page(html, &page_url()).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Only a heading"));
        assert_eq!(parsed.canonical_url, None);
    }

    #[test]
    fn test_non_http_canonical_is_value_error() {
        let html = r#"<html><head><link rel="canonical" href="javascript:void(0)"></head></html>"#;
        let result = parse_detail_page(html, &page_url());
        assert!(matches!(result, Err(ExtractError::Value(_))));
    }

    #[test]
    fn test_extract_record_uses_frontier_fields() {
        let site = SiteUrls::new("https://skills.sh").unwrap();
        let item = DiscoveredItem::new("acme", "tools", "lint", Some("Lint"), DiscoveryMethod::Sitemap)
            .with_installs(Some(9_000))
            .with_pass(2)
            .with_rank(Some(7));
        let context = RecordContext {
            site: &site,
            run_id: "20250101T000000Z",
            parser_version: "0.1.0",
        };

        let html = "<html><body><h1></h1><p>42 / week</p></body></html>";
        let record =
            extract_detail_record(&item, html.as_bytes(), Some(200), Utc::now(), &context).unwrap();

        assert_eq!(record.canonical_url, "https://skills.sh/acme/tools/lint");
        assert_eq!(record.name, "Lint");
        assert_eq!(record.total_installs, Some(9_000));
        assert_eq!(record.weekly_installs, Some(42));
        assert_eq!(record.discovery_source, DiscoveryMethod::Sitemap);
        assert_eq!(record.discovery_pass, 2);
        assert_eq!(record.rank_at_fetch, Some(7));
        assert_eq!(record.http_status, Some(200));
        assert_eq!(record.run_id, "20250101T000000Z");
        assert_eq!(
            record.content_hash.as_deref(),
            Some(hex::encode(Sha256::digest(html.as_bytes())).as_str())
        );
    }

    #[test]
    fn test_missing_popularity_is_none() {
        let html = "<html><body><h1>Quiet</h1><p>First seen: Smarch 1, 2025</p></body></html>";
        let parsed = parse_detail_page(html, &page_url()).unwrap();
        assert_eq!(parsed.weekly_installs, None);
        assert_eq!(parsed.first_seen_date, None);
        assert!(parsed.channel_installs.is_empty());
    }
}
