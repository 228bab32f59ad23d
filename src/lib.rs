//! Skillscout: discovery and extraction for a skills directory site
//!
//! This crate discovers every listed skill on a single directory site through
//! several overlapping strategies (sitemap, homepage payload, paginated API,
//! query enumeration, repo pages), merges them into one frontier keyed by a
//! canonical identity, and extracts a structured record per skill from its
//! detail page. Progress is checkpointed so interrupted runs resume.

pub mod config;
pub mod discovery;
pub mod extraction;
pub mod fetch;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod site;
pub mod storage;

use thiserror::Error;

/// Main error type for Skillscout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Frontier too small: found {found} items, need at least {minimum}")]
    FrontierTooSmall { found: usize, minimum: usize },

    #[error("Pipeline lock held: {0}")]
    LockHeld(String),

    #[error("Checkpoint unusable: {0}")]
    CheckpointCorrupt(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors produced by the resilient fetch client
///
/// The variants map onto the failure classes the pipeline distinguishes:
/// transport problems and retryable statuses are retried before surfacing,
/// soft errors and shape violations never are.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Retryable status {status} for {url} persisted after retries")]
    RetryableStatus { url: String, status: u16 },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Soft error for {url}: {reason}")]
    SoftError { url: String, reason: String },

    #[error("Unexpected payload shape for {url}: {message}")]
    ShapeViolation { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns true for failures caused by a valid response with unusable content
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            FetchError::SoftError { .. } | FetchError::ShapeViolation { .. }
        )
    }

    /// Returns true for failures that were retried before surfacing
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::RetryableStatus { .. }
        )
    }

    /// Returns the HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RetryableStatus { status, .. } | FetchError::Status { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type alias for Skillscout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CanonicalId, DetailRecord, DiscoveredItem, DiscoveryMethod, Frontier};
