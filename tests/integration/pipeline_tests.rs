//! Full pipeline runs against a mock site

use crate::common::{
    create_test_config, detail_html, empty_page_html, entry, mount_html, mount_listing_page,
    mount_search, sitemap_xml,
};
use skillscout::config::Config;
use skillscout::model::{CanonicalId, DetailRecord, DiscoveryMethod};
use skillscout::output::{CompletenessStatus, QualityReport};
use skillscout::pipeline::{Coordinator, RunMode, RunOptions, RunOutcome};
use skillscout::storage::{
    backup_path, load_checkpoint, read_jsonl, DiscoveryCheckpoint, ExtractionCheckpoint,
    OutputLayout, RecordStore, SqliteRecordStore,
};
use skillscout::ScoutError;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a small site: two listing items, a sitemap with one extra item,
/// one search hit and a repo page that links one item nothing else lists
async fn mount_site(mock_server: &MockServer) {
    let base = mock_server.uri();

    mount_listing_page(
        mock_server,
        1,
        vec![entry("acme/tools", "lint", 500), entry("acme/tools", "fmt", 300)],
        false,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sitemap_xml(&base, &["/acme/tools/lint", "/other/repo/deploy"])),
        )
        .mount(mock_server)
        .await;

    mount_search(mock_server, "aa", vec![entry("acme/tools", "search-hit", 42)]).await;

    mount_html(
        mock_server,
        "/acme/tools",
        "<html><body><a href=\"/acme/tools/lint\">Lint</a>\
         <a href=\"/acme/tools/hidden\">Hidden</a></body></html>"
            .to_string(),
    )
    .await;

    for (owner, repo, id) in [
        ("acme", "tools", "lint"),
        ("acme", "tools", "fmt"),
        ("acme", "tools", "search-hit"),
        ("other", "repo", "deploy"),
    ] {
        mount_html(
            mock_server,
            &format!("/{}/{}/{}", owner, repo, id),
            detail_html(owner, repo, id),
        )
        .await;
    }
    mount_html(mock_server, "/acme/tools/hidden", empty_page_html()).await;
}

fn sampled() -> RunOptions {
    RunOptions {
        sample: Some(2),
        ..RunOptions::default()
    }
}

async fn run(config: Config, options: RunOptions, mode: RunMode) -> skillscout::Result<RunOutcome> {
    let coordinator = Coordinator::new(config, "test-hash".to_string(), options)?;
    coordinator.run(mode).await
}

#[tokio::test]
async fn test_full_pipeline_run() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());
    let layout = OutputLayout::new(dir.path());

    let outcome = run(config, sampled(), RunMode::Full).await.unwrap();

    assert_eq!(outcome.frontier_size, 5);
    assert_eq!(outcome.records, 4);
    assert_eq!(outcome.failures, 1);
    assert_eq!(outcome.exit_code(), 0);

    // Quality report
    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.failure_ids, vec!["acme/tools/hidden".to_string()]);
    assert_eq!(report.total_discovered, Some(5));
    assert_eq!(report.discovery_by_source.get("paginated_api"), Some(&2));
    assert_eq!(report.discovery_by_source.get("sitemap"), Some(&2));
    assert_eq!(report.discovery_by_source.get("query_enumeration"), Some(&1));
    assert_eq!(report.discovery_by_source.get("repo_page"), Some(&2));
    assert_eq!(report.config_hash.as_deref(), Some("test-hash"));
    assert_eq!(report.browser_escalation_recommended, Some(false));
    assert_eq!(
        report.completeness.as_ref().map(|c| c.status),
        Some(CompletenessStatus::NoBaseline)
    );

    let on_disk: QualityReport =
        serde_json::from_str(&fs::read_to_string(layout.quality_report_path()).unwrap()).unwrap();
    assert_eq!(&on_disk, report);

    // Snapshot files
    let dates = layout.snapshot_dates().unwrap();
    assert_eq!(dates.len(), 1);
    let records: Vec<DetailRecord> = read_jsonl(&layout.records_path(dates[0])).unwrap();
    assert_eq!(records.len(), 4);

    let lint = records
        .iter()
        .find(|r| r.id == CanonicalId::new("acme", "tools", "lint"))
        .unwrap();
    assert_eq!(lint.discovery_source, DiscoveryMethod::PaginatedApi);
    assert_eq!(lint.total_installs, Some(500));
    assert_eq!(lint.weekly_installs, Some(1200));
    assert_eq!(lint.run_id, outcome.run_id);

    let metrics_rows = fs::read_to_string(layout.metrics_path(dates[0])).unwrap();
    assert_eq!(metrics_rows.lines().count(), 4);

    let store = SqliteRecordStore::new(&layout.database_path(dates[0])).unwrap();
    assert_eq!(store.count_records().unwrap(), 4);
    assert_eq!(store.count_metrics().unwrap(), 4);

    // Checkpoints are finished and partial records are cleaned up
    let discovery: DiscoveryCheckpoint =
        load_checkpoint(&layout.discovery_checkpoint_path()).unwrap();
    assert!(discovery.finished);
    let expected: BTreeSet<String> = ["aa".to_string(), "ab".to_string()].into_iter().collect();
    assert_eq!(discovery.search_queries_completed, expected);
    assert_eq!(discovery.discovered_ids.len(), 5);

    let extraction: ExtractionCheckpoint =
        load_checkpoint(&layout.extraction_checkpoint_path()).unwrap();
    assert!(extraction.finished);
    assert_eq!(extraction.completed.len(), 4);
    assert!(extraction
        .failed
        .contains_key(&CanonicalId::new("acme", "tools", "hidden")));
    assert!(!layout.partial_records_path().exists());

    // The lock is released
    assert!(!layout.lock_path().exists());
}

#[tokio::test]
async fn test_discover_then_extract() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());
    let layout = OutputLayout::new(dir.path());

    let discovered = run(config.clone(), sampled(), RunMode::DiscoverOnly)
        .await
        .unwrap();
    assert_eq!(discovered.frontier_size, 5);
    assert!(discovered.report.is_none());
    assert!(layout.discovered_items_path().exists());
    assert!(layout.repos_path().exists());
    assert!(layout.discovery_summary_path().exists());
    assert!(layout.convergence_report_path().exists());
    assert!(layout.snapshot_dates().unwrap().is_empty());

    let extracted = run(config, RunOptions::default(), RunMode::ExtractOnly)
        .await
        .unwrap();
    assert_eq!(extracted.frontier_size, 5);
    assert_eq!(extracted.records, 4);
    assert_eq!(extracted.failures, 1);

    let report = extracted.report.unwrap();
    assert_eq!(report.total_discovered, None);
    assert_eq!(report.total_records, 4);
}

#[tokio::test]
async fn test_below_baseline_exit_code() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    let options = RunOptions {
        baseline: Some(10),
        ..sampled()
    };
    let outcome = run(config, options, RunMode::Full).await.unwrap();

    let baseline = outcome.report.as_ref().and_then(|r| r.baseline.clone()).unwrap();
    assert_eq!(baseline.status, CompletenessStatus::Regression);
    assert_eq!(baseline.delta, -6);
    assert!(outcome.below_baseline());
    assert_eq!(outcome.exit_code(), 2);
}

#[tokio::test]
async fn test_frontier_below_minimum_aborts() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.discovery.min_viable_frontier = 50;
    let layout = OutputLayout::new(dir.path());

    let err = run(config, sampled(), RunMode::Full).await.unwrap_err();
    assert!(matches!(
        err,
        ScoutError::FrontierTooSmall {
            found: 5,
            minimum: 50
        }
    ));

    // Nothing was extracted
    assert!(layout.snapshot_dates().unwrap().is_empty());
    assert!(!layout.quality_report_path().exists());
}

#[tokio::test]
async fn test_strict_mode_rejects_unusable_checkpoint() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.output.strict_checkpoints = true;
    let layout = OutputLayout::new(dir.path());

    let checkpoint = layout.discovery_checkpoint_path();
    fs::create_dir_all(checkpoint.parent().unwrap()).unwrap();
    fs::write(&checkpoint, "{\"truncated").unwrap();
    fs::write(backup_path(&checkpoint), "also broken").unwrap();

    let err = run(config.clone(), sampled(), RunMode::Full)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::CheckpointCorrupt(_)));

    // A fresh run does not read checkpoints at all
    let options = RunOptions {
        fresh: true,
        ..sampled()
    };
    let outcome = run(config, options, RunMode::Full).await.unwrap();
    assert_eq!(outcome.records, 4);
}
