//! Fetch client behavior against a mock server

use crate::common::fast_http;
use skillscout::config::{HttpConfig, MonitorConfig, UserAgentConfig};
use skillscout::fetch::FetchClient;
use skillscout::FetchError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with(http: &HttpConfig, monitor: &MonitorConfig) -> FetchClient {
    FetchClient::new(http, monitor, &UserAgentConfig::default())
        .expect("Failed to build fetch client")
}

fn fast_client() -> FetchClient {
    client_with(&fast_http(), &MonitorConfig::default())
}

#[tokio::test]
async fn test_retryable_status_then_success() {
    let mock_server = MockServer::start().await;

    // Two 503s, then the page
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let text = client
        .fetch_text(&format!("{}/flaky", mock_server.uri()))
        .await
        .expect("third attempt should succeed");
    assert_eq!(text, "recovered");
}

#[tokio::test]
async fn test_retryable_status_exhausts_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let err = client
        .fetch(&format!("{}/down", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RetryableStatus { status: 503, .. }));
    assert!(err.is_retryable());
    assert!(!err.is_soft());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    // One request per call, no retries
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let url = format!("{}/missing", mock_server.uri());

    // A plain fetch returns the page; callers decide what 404 means
    let page = client.fetch(&url).await.unwrap();
    assert_eq!(page.status, 404);
    assert!(!page.is_success());

    let err = client.fetch_success(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_short_html_is_soft_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stub"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client();
    let err = client
        .fetch_html(&format!("{}/stub", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::SoftError { .. }));
    assert!(err.is_soft());
}

#[tokio::test]
async fn test_json_root_must_be_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/array"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = fast_client();

    let err = client
        .fetch_json(&format!("{}/array", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::ShapeViolation { .. }));

    let err = client
        .fetch_json(&format!("{}/garbage", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::SoftError { .. }));
}

#[tokio::test]
async fn test_block_monitor_sees_every_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let monitor = MonitorConfig {
        block_window: 4,
        block_threshold_percent: 2.0,
    };
    let client = client_with(&fast_http(), &monitor);
    let url = format!("{}/forbidden", mock_server.uri());

    for _ in 0..4 {
        let page = client.fetch(&url).await.unwrap();
        assert_eq!(page.status, 403);
    }

    let snapshot = client.block_snapshot();
    assert_eq!(snapshot.observed, 4);
    assert_eq!(snapshot.blocked_percent, 100.0);
    assert!(snapshot.should_escalate);
}
