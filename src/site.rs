//! Endpoint construction for the target site
//!
//! Every URL the pipeline requests is derived from the configured base URL,
//! so a local mock server can stand in for the real site.

use crate::ConfigError;
use url::Url;

/// Builds URLs for the site's pages and JSON endpoints
#[derive(Debug, Clone)]
pub struct SiteUrls {
    base: Url,
}

impl SiteUrls {
    /// Creates a URL builder from a base URL such as `https://skills.sh`
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(base_url.to_string()));
        }
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    /// The base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn homepage(&self) -> String {
        format!("{}/", self.base())
    }

    pub fn sitemap(&self) -> String {
        format!("{}/sitemap.xml", self.base())
    }

    /// One page of the all-time listing API (pages are 1-based)
    pub fn listing_page(&self, page: u32) -> String {
        format!("{}/api/skills/all-time/{}", self.base(), page)
    }

    /// The keyword search endpoint with the query URL-encoded
    pub fn search(&self, query: &str, limit: u32) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("{}/api/search", self.base.path().trim_end_matches('/')));
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        url.to_string()
    }

    pub fn repo_page(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.base(), owner, repo)
    }

    pub fn detail_page(&self, owner: &str, repo: &str, item_id: &str) -> String {
        format!("{}/{}/{}/{}", self.base(), owner, repo, item_id)
    }

    /// Returns the path of `candidate` relative to the site when it points at
    /// the same host and port, ignoring the scheme
    pub fn relative_path<'a>(&self, candidate: &'a Url) -> Option<&'a str> {
        let same_host = candidate
            .host_str()
            .zip(self.base.host_str())
            .map(|(a, b)| a.eq_ignore_ascii_case(b))
            .unwrap_or(false);
        if !same_host || candidate.port() != self.base.port() {
            return None;
        }

        let prefix = self.base.path().trim_end_matches('/');
        candidate.path().strip_prefix(prefix)
    }
}
