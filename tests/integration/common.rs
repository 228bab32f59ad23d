//! Shared fixtures for the integration tests

use serde_json::{json, Value};
use skillscout::config::{Config, HttpConfig};
use skillscout::fetch::FetchClient;
use skillscout::site::SiteUrls;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HTTP settings with no real waiting between attempts
pub fn fast_http() -> HttpConfig {
    HttpConfig {
        rate_limit_per_second: 1000.0,
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        jitter_max_ms: 0,
        ..HttpConfig::default()
    }
}

/// Creates a test configuration pointed at a mock server
pub fn create_test_config(base_url: &str, output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = base_url.to_string();
    config.http = fast_http();

    config.discovery.min_viable_frontier = 1;
    config.discovery.search_batch_size = 2;
    config.discovery.repo_page_concurrency = 4;
    config.discovery.max_listing_pages = 10;

    config.convergence.passes_max = 3;
    config.convergence.converge_repos = 2;
    config.convergence.fallback_queries = vec!["sk".to_string()];

    config.extraction.concurrency = 4;
    config.extraction.batch_size = 2;
    config.extraction.parser_version = "test".to_string();

    config.output.output_dir = output_dir.to_string_lossy().into_owned();
    config
}

pub fn client_for(config: &Config) -> FetchClient {
    FetchClient::from_config(config).expect("Failed to build fetch client")
}

pub fn site_for(server: &MockServer) -> SiteUrls {
    SiteUrls::new(&server.uri()).expect("Failed to parse mock server URI")
}

/// One listing entry as the site publishes it
pub fn entry(source: &str, skill_id: &str, installs: u64) -> Value {
    json!({
        "source": source,
        "skillId": skill_id,
        "name": skill_id,
        "installs": installs,
    })
}

/// A detail page the parser accepts
pub fn detail_html(owner: &str, repo: &str, id: &str) -> String {
    format!(
        "<html><head>\
         <link rel=\"canonical\" href=\"https://skills.sh/{0}/{1}/{2}\">\
         <meta name=\"description\" content=\"The {2} skill\">\
         </head><body><h1>{2}</h1><p>1.2K / week</p>\
         <code>npx skills add {0}/{1}</code>{3}</body></html>",
        owner,
        repo,
        id,
        "<p>padding</p>".repeat(10)
    )
}

/// A page long enough to pass the body check but with no detail markup
pub fn empty_page_html() -> String {
    format!(
        "<html><body>{}</body></html>",
        "<p>nothing to see here</p>".repeat(10)
    )
}

pub async fn mount_listing_page(server: &MockServer, page: u32, skills: Vec<Value>, has_more: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/api/skills/all-time/{}", page)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "skills": skills,
            "hasMore": has_more,
        })))
        .mount(server)
        .await;
}

pub async fn mount_search(server: &MockServer, query: &str, skills: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "skills": skills })))
        .mount(server)
        .await;
}

pub async fn mount_html(server: &MockServer, page_path: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

/// A sitemap listing the given paths on the mock server
pub fn sitemap_xml(base: &str, paths: &[&str]) -> String {
    let urls: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", base, p))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">{}</urlset>",
        urls
    )
}
