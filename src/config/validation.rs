use crate::config::types::{
    Config, ConvergenceConfig, DiscoveryConfig, ExtractionConfig, HttpConfig, MonitorConfig,
    OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_http_config(&config.http)?;
    validate_monitor_config(&config.monitor)?;
    validate_discovery_config(&config.discovery)?;
    validate_convergence_config(&config.convergence)?;
    validate_extraction_config(&config.extraction)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Checks that `value` lies in `min..=max`
fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

/// The product token must be a valid header token; the contact must be a URL
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let token_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if config.product.is_empty() || !config.product.chars().all(token_char) {
        return Err(ConfigError::Validation(format!(
            "user-agent product must be a non-empty token of [A-Za-z0-9._-], got '{}'",
            config.product
        )));
    }

    if config.version.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "user-agent version cannot contain whitespace, got '{}'",
            config.version
        )));
    }

    Url::parse(&config.contact)
        .map_err(|e| ConfigError::InvalidUrl(format!("user-agent contact: {}", e)))?;

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.rate_limit_per_second <= 0.0 || !config.rate_limit_per_second.is_finite() {
        return Err(ConfigError::Validation(format!(
            "rate_limit_per_second must be positive, got {}",
            config.rate_limit_per_second
        )));
    }

    check_range("request_timeout_secs", config.request_timeout_secs, 1, 120)?;

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    check_range("max_attempts", config.max_attempts, 1, 10)?;

    if config.initial_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "initial_backoff_ms ({}) cannot exceed max_backoff_ms ({})",
            config.initial_backoff_ms, config.max_backoff_ms
        )));
    }

    Ok(())
}

fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    check_range("block_window", config.block_window, 1, 5000)?;
    check_range(
        "block_threshold_percent",
        config.block_threshold_percent,
        0.0,
        100.0,
    )?;
    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    check_range("search_query_limit", config.search_query_limit, 1, 10_000)?;
    check_range("search_batch_size", config.search_batch_size, 1, 500)?;
    check_range("repo_page_concurrency", config.repo_page_concurrency, 1, 200)?;

    if config.max_listing_pages < 1 {
        return Err(ConfigError::Validation(
            "max_listing_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_convergence_config(config: &ConvergenceConfig) -> Result<(), ConfigError> {
    check_range("passes_max", config.passes_max, 1, 50)?;
    check_range("converge_repos", config.converge_repos, 1, 10)?;
    check_range("converge_growth", config.converge_growth, 0.0, 100.0)?;

    if config.fallback_queries.iter().any(|q| q.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "fallback_queries cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    check_range("concurrency", config.concurrency, 1, 200)?;

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.parser_version.is_empty() {
        return Err(ConfigError::Validation(
            "parser_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.stale_lock_secs < 1 {
        return Err(ConfigError::Validation(
            "stale_lock_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
