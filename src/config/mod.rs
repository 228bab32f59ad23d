//! Configuration module for Skillscout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use skillscout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("skillscout.toml")).unwrap();
//! println!("Extraction concurrency: {}", config.extraction.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConvergenceConfig, DiscoveryConfig, ExtractionConfig, HttpConfig, MonitorConfig,
    OutputConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, config_digest, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
