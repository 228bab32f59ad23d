//! Resilient HTTP fetch client
//!
//! Every logical fetch goes through [`FetchClient::fetch`], which:
//! - Waits on the shared rate limiter before each attempt
//! - Feeds every observed status into the block monitor
//! - Retries transport failures and retryable statuses with backoff
//!
//! The typed helpers layer content checks on top:
//!
//! | Helper | Non-2xx | Body check |
//! |--------|---------|------------|
//! | `fetch_text` | `Status` error | none |
//! | `fetch_html` | `Status` error | shorter than `min-body-bytes` → `SoftError` |
//! | `fetch_json` | `Status` error | invalid JSON → `SoftError`, non-object root → `ShapeViolation` |

use crate::config::{Config, HttpConfig, MonitorConfig, UserAgentConfig};
use crate::fetch::limiter::{BlockMonitor, BlockSnapshot, RequestLimiter};
use crate::fetch::retry::RetryPolicy;
use crate::{FetchError, FetchResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fully read response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Rate-limited, retrying HTTP client shared by every pipeline stage
///
/// Cloning is cheap; clones share the connection pool, the limiter and the
/// block monitor.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    limiter: Arc<RequestLimiter>,
    monitor: Arc<Mutex<BlockMonitor>>,
    retry: RetryPolicy,
    min_body_bytes: usize,
}

/// Builds the underlying reqwest client
///
/// # Arguments
///
/// * `http` - Timeout settings
/// * `user_agent` - Identification sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    http: &HttpConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "application/json,text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(headers)
        .timeout(Duration::from_secs(http.request_timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(30))
        .gzip(true)
        .brotli(true)
        .build()
}

impl FetchClient {
    /// Creates a client from the HTTP, monitor and user agent settings
    pub fn new(
        http: &HttpConfig,
        monitor: &MonitorConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(http, user_agent)?,
            limiter: Arc::new(RequestLimiter::new(http.rate_limit_per_second)),
            monitor: Arc::new(Mutex::new(BlockMonitor::new(
                monitor.block_window,
                monitor.block_threshold_percent,
            ))),
            retry: RetryPolicy::from_config(http),
            min_body_bytes: http.min_body_bytes,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(&config.http, &config.monitor, &config.user_agent)
    }

    /// Current state of the block monitor
    pub fn block_snapshot(&self) -> BlockSnapshot {
        match self.monitor.lock() {
            Ok(monitor) => monitor.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    fn record_status(&self, status: u16) {
        match self.monitor.lock() {
            Ok(mut monitor) => monitor.push_status(status),
            Err(poisoned) => poisoned.into_inner().push_status(status),
        }
    }

    /// Performs one logical GET, retrying transport failures and retryable statuses
    ///
    /// Non-retryable statuses (including 4xx) are returned as pages, not
    /// errors; callers decide what they mean. After the last attempt the
    /// final error is returned.
    pub async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut attempt = 1;
        loop {
            self.limiter.acquire().await;

            let error = match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    self.record_status(status);

                    if self.retry.is_retryable_status(status) {
                        FetchError::RetryableStatus {
                            url: url.to_string(),
                            status,
                        }
                    } else {
                        let final_url = response.url().to_string();
                        match response.bytes().await {
                            Ok(body) => {
                                return Ok(FetchedPage {
                                    url: final_url,
                                    status,
                                    body: body.to_vec(),
                                })
                            }
                            Err(e) => FetchError::Transport {
                                url: url.to_string(),
                                message: e.to_string(),
                            },
                        }
                    }
                }
                Err(e) => FetchError::Transport {
                    url: url.to_string(),
                    message: if e.is_timeout() {
                        "request timeout".to_string()
                    } else {
                        e.to_string()
                    },
                },
            };

            if attempt >= self.retry.max_attempts {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempt, error);
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                "Retrying {} (attempt {}), sleeping {:.1}s: {}",
                url,
                attempt,
                delay.as_secs_f64(),
                error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Fetches a page that must return a 2xx status
    pub async fn fetch_success(&self, url: &str) -> FetchResult<FetchedPage> {
        let page = self.fetch(url).await?;
        if !page.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page)
    }

    /// Fetches a text payload that must return a 2xx status
    pub async fn fetch_text(&self, url: &str) -> FetchResult<String> {
        Ok(self.fetch_success(url).await?.text())
    }

    /// Fetches an HTML page, rejecting implausibly short bodies as soft errors
    pub async fn fetch_html(&self, url: &str) -> FetchResult<FetchedPage> {
        let page = self.fetch_success(url).await?;
        if page.body.len() < self.min_body_bytes {
            return Err(FetchError::SoftError {
                url: url.to_string(),
                reason: format!("HTML response too short ({} bytes)", page.body.len()),
            });
        }
        Ok(page)
    }

    /// Fetches a JSON payload whose root must be an object
    pub async fn fetch_json(&self, url: &str) -> FetchResult<Map<String, Value>> {
        let page = self.fetch_success(url).await?;
        let value: Value = serde_json::from_slice(&page.body).map_err(|e| FetchError::SoftError {
            url: url.to_string(),
            reason: format!("invalid JSON: {}", e),
        })?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(FetchError::ShapeViolation {
                url: url.to_string(),
                message: format!("expected JSON object, got {}", json_type_name(&other)),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default(), &UserAgentConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_fetched_page_success_range() {
        let page = FetchedPage {
            url: "https://skills.sh/".to_string(),
            status: 204,
            body: Vec::new(),
        };
        assert!(page.is_success());

        let page = FetchedPage { status: 404, ..page };
        assert!(!page.is_success());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_request() {
        let client = FetchClient::from_config(&Config::default()).unwrap();
        let result = client.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        assert_eq!(client.block_snapshot().observed, 0);
    }
}
