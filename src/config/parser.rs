use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a TOML file and returns the validated configuration
///
/// Missing tables and keys fall back to their defaults, so an empty file is
/// a valid configuration for the public directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_config(&raw)
}

/// Deserializes `raw` and runs every validation rule over the result
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 digest of the configuration text
///
/// Stamped on quality reports so runs made with different settings can be
/// told apart.
pub fn config_digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// SHA-256 of the file at `path`
///
/// # Returns
///
/// * `Ok(String)` - 64 hex characters
/// * `Err(ConfigError::Io)` - The file could not be read
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(config_digest(&raw))
}

/// Loads a configuration together with the digest of the exact text parsed
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config = parse_config(&raw)?;
    Ok((config, config_digest(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(raw: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", raw).unwrap();
        file
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let file = write_toml(
            r#"
[site]
base-url = "https://skills.example.com"

[http]
rate-limit-per-second = 5.0
max-attempts = 3

[convergence]
passes-max = 4
fallback-queries = ["ab", "cd"]

[extraction]
concurrency = 8
"#,
        );

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.base_url, "https://skills.example.com");
        assert_eq!(config.http.rate_limit_per_second, 5.0);
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.convergence.passes_max, 4);
        assert_eq!(config.convergence.fallback_queries, vec!["ab", "cd"]);
        assert_eq!(config.extraction.concurrency, 8);
        assert_eq!(config.extraction.batch_size, 1000);
        assert_eq!(config.monitor.block_window, 500);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.site.base_url, "https://skills.sh");
        assert_eq!(config.convergence.fallback_queries.len(), 11);
        assert!(config.output.resume);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/skillscout.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_toml_and_invalid_values() {
        assert!(matches!(
            parse_config("[http\nmax-attempts = "),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_config("[extraction]\nconcurrency = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_hash_tracks_exact_text() {
        let a = config_digest("[http]\nmax-attempts = 3\n");
        let b = config_digest("[http]\nmax-attempts = 4\n");

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, config_digest("[http]\nmax-attempts = 3\n"));
    }

    #[test]
    fn test_load_with_hash_matches_file_hash() {
        let file = write_toml("[extraction]\nbatch-size = 50\n");
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.extraction.batch_size, 50);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
