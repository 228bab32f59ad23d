use serde::Deserialize;

/// Main configuration structure for Skillscout
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub http: HttpConfig,
    pub monitor: MonitorConfig,
    pub discovery: DiscoveryConfig,
    pub convergence: ConvergenceConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL every endpoint is derived from
    #[serde(rename = "base-url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://skills.sh".to_string(),
        }
    }
}

/// Identity sent in the `User-Agent` header of every request
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Product token, e.g. `skillscout`
    pub product: String,

    pub version: String,

    /// Where site operators can reach whoever runs the scout
    pub contact: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            product: "skillscout".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact: "https://github.com/skillscout/skillscout".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// `product/version (+contact)`
    pub fn header_value(&self) -> String {
        format!("{}/{} (+{})", self.product, self.version, self.contact)
    }
}

/// HTTP client and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Aggregate request rate across all workers
    #[serde(rename = "rate-limit-per-second")]
    pub rate_limit_per_second: f64,

    /// Total per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per logical fetch, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// First retry delay (milliseconds)
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the exponential delay (milliseconds)
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Upper bound on the random jitter added to each delay (milliseconds)
    #[serde(rename = "jitter-max-ms")]
    pub jitter_max_ms: u64,

    /// HTML bodies shorter than this are treated as soft errors
    #[serde(rename = "min-body-bytes")]
    pub min_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_second: 20.0,
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_attempts: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            jitter_max_ms: 2_000,
            min_body_bytes: 100,
        }
    }
}

/// Rolling block-rate monitor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Number of most recent status codes kept in the window
    #[serde(rename = "block-window")]
    pub block_window: usize,

    /// Blocked percentage at which escalation is recommended
    #[serde(rename = "block-threshold-percent")]
    pub block_threshold_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            block_window: 500,
            block_threshold_percent: 2.0,
        }
    }
}

/// Discovery source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Result cap passed to the search endpoint
    #[serde(rename = "search-query-limit")]
    pub search_query_limit: u32,

    /// Concurrent search queries during the enumeration sweep
    #[serde(rename = "search-batch-size")]
    pub search_batch_size: usize,

    /// Concurrent repo page fetches during expansion
    #[serde(rename = "repo-page-concurrency")]
    pub repo_page_concurrency: usize,

    /// Hard stop for the paginated listing crawl
    #[serde(rename = "max-listing-pages")]
    pub max_listing_pages: u32,

    /// Runs abort when discovery finds fewer items than this
    #[serde(rename = "min-viable-frontier")]
    pub min_viable_frontier: usize,

    #[serde(rename = "use-convergence")]
    pub use_convergence: bool,

    #[serde(rename = "use-sitemap")]
    pub use_sitemap: bool,

    #[serde(rename = "use-homepage")]
    pub use_homepage: bool,

    #[serde(rename = "use-search")]
    pub use_search: bool,

    #[serde(rename = "expand-repo-pages")]
    pub expand_repo_pages: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_query_limit: 1000,
            search_batch_size: 50,
            repo_page_concurrency: 20,
            max_listing_pages: 5000,
            min_viable_frontier: 10,
            use_convergence: true,
            use_sitemap: true,
            use_homepage: true,
            use_search: true,
            expand_repo_pages: true,
        }
    }
}

/// Convergence controller thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Primary passes before the fallback query set runs
    #[serde(rename = "passes-max")]
    pub passes_max: u32,

    /// Consecutive passes with a stable repo set required to converge
    #[serde(rename = "converge-repos")]
    pub converge_repos: u32,

    /// Maximum per-pass id growth (percent) that still counts as converged
    #[serde(rename = "converge-growth")]
    pub converge_growth: f64,

    /// Broad queries run once when the primary passes are exhausted
    #[serde(rename = "fallback-queries")]
    pub fallback_queries: Vec<String>,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            passes_max: 10,
            converge_repos: 2,
            converge_growth: 0.1,
            fallback_queries: ["sk", "er", "co", "in", "de", "th", "re", "-a", "a-", "__", "--"]
                .iter()
                .map(|q| q.to_string())
                .collect(),
        }
    }
}

/// Detail extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Concurrent detail page fetches
    pub concurrency: usize,

    /// Items per checkpointed batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Version tag stamped on every record
    #[serde(rename = "parser-version")]
    pub parser_version: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            batch_size: 1000,
            parser_version: "0.1.0".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for discovery files, snapshots, checkpoints and reports
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Resume from unfinished checkpoints
    pub resume: bool,

    /// Abort when a checkpoint exists but neither it nor its backup is readable
    #[serde(rename = "strict-checkpoints")]
    pub strict_checkpoints: bool,

    /// Age after which a leftover pipeline lock is taken over (seconds)
    #[serde(rename = "stale-lock-secs")]
    pub stale_lock_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "./data".to_string(),
            resume: true,
            strict_checkpoints: false,
            stale_lock_secs: 6 * 60 * 60,
        }
    }
}
