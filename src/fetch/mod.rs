//! HTTP fetching with rate limiting, retries and soft-error detection

mod client;
mod limiter;
mod retry;

pub use client::{build_http_client, FetchClient, FetchedPage};
pub use limiter::{BlockMonitor, BlockSnapshot, RequestLimiter};
pub use retry::{RetryPolicy, RETRYABLE_STATUSES};
