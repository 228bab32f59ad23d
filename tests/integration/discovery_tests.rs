//! Discovery sources against a mock site

use crate::common::{
    client_for, create_test_config, entry, mount_html, mount_listing_page, mount_search, site_for,
    sitemap_xml,
};
use serde_json::json;
use skillscout::discovery::{
    crawl_listing_once, expand_from_repo_pages, run_search_sweep, run_sitemap_discovery,
    search_one_query, ConvergenceController, SiteListing, SweepOptions,
};
use skillscout::model::{CanonicalId, ConvergenceReason, DiscoveryMethod, RepoSet};
use skillscout::pipeline::run_discovery;
use skillscout::storage::{load_checkpoint, DiscoveryCheckpoint, OutputLayout};
use skillscout::FetchError;
use std::collections::BTreeSet;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sitemap_discovery_end_to_end() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base, dir.path());

    let xml = sitemap_xml(
        &base,
        &["/", "/acme/tools/lint", "/acme/tools/fmt", "/Other/Repo/Deploy"],
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(&mock_server)
        .await;

    let (items, repos) = run_sitemap_discovery(&client_for(&config), &site_for(&mock_server)).await;

    assert_eq!(items.len(), 3);
    assert!(items
        .values()
        .all(|item| item.discovered_via == DiscoveryMethod::Sitemap));
    assert!(items.contains_key(&CanonicalId::new("other", "repo", "deploy")));
    assert_eq!(repos.len(), 2);
}

#[tokio::test]
async fn test_sitemap_failure_yields_nothing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    // No sitemap mounted: the server answers 404
    let (items, repos) = run_sitemap_discovery(&client_for(&config), &site_for(&mock_server)).await;
    assert!(items.is_empty());
    assert!(repos.is_empty());
}

#[tokio::test]
async fn test_listing_crawl_follows_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    mount_listing_page(
        &mock_server,
        1,
        vec![entry("acme/tools", "lint", 500), entry("acme/tools", "fmt", 300)],
        true,
    )
    .await;
    mount_listing_page(
        &mock_server,
        2,
        vec![json!({"source": "broken"}), entry("other/repo", "deploy", 100)],
        false,
    )
    .await;

    let (items, repos) = crawl_listing_once(&client_for(&config), &site_for(&mock_server), 1, 10)
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(repos.len(), 2);

    let deploy = &items[&CanonicalId::new("other", "repo", "deploy")];
    assert_eq!(deploy.discovered_via, DiscoveryMethod::PaginatedApi);
    assert_eq!(deploy.installs, Some(100));
    // Ranks continue across pages and count the skipped entry
    assert_eq!(deploy.rank_at_fetch, Some(4));
}

#[tokio::test]
async fn test_listing_shape_violation_aborts_pass() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/api/skills/all-time/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"skills": {"not": "a list"}})))
        .mount(&mock_server)
        .await;

    let err = crawl_listing_once(&client_for(&config), &site_for(&mock_server), 1, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::ShapeViolation { .. }));
}

#[tokio::test]
async fn test_rejected_search_query_is_empty() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", "--"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (items, repos) =
        search_one_query(&client_for(&config), &site_for(&mock_server), "--", 50, 1).await;
    assert!(items.is_empty());
    assert!(repos.is_empty());
}

#[tokio::test]
async fn test_search_sweep_resumes_and_samples() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    mount_search(&mock_server, "ab", vec![entry("acme/tools", "lint", 10)]).await;
    mount_search(&mock_server, "ac", vec![entry("other/repo", "deploy", 5)]).await;

    let already: BTreeSet<String> = ["aa".to_string()].into_iter().collect();
    let options = SweepOptions {
        query_limit: 50,
        concurrency: 2,
        sample: Some(2),
        progress_every: 1,
    };

    let mut progress_calls = Vec::new();
    let sweep = run_search_sweep(
        &client_for(&config),
        &site_for(&mock_server),
        &options,
        &already,
        |done, found| progress_calls.push((done.len(), found.len())),
    )
    .await;

    let mut completed = sweep.completed.clone();
    completed.sort();
    assert_eq!(completed, vec!["ab".to_string(), "ac".to_string()]);
    assert_eq!(sweep.items.len(), 2);
    assert!(sweep
        .items
        .values()
        .all(|item| item.discovered_via == DiscoveryMethod::QueryEnumeration));

    // The running set includes queries completed by the earlier run, and
    // each call carries only the items found since the previous one
    assert_eq!(progress_calls, vec![(2, 1), (3, 1)]);
}

#[tokio::test]
async fn test_repo_page_expansion() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    mount_html(
        &mock_server,
        "/acme/tools",
        "<html><body>\
         <a href=\"/acme/tools/lint\">Lint</a>\
         <a href=\"/acme/tools/hidden\">Hidden Gem</a>\
         <a href=\"/elsewhere/repo/item\">Other</a>\
         </body></html>"
            .to_string(),
    )
    .await;

    let repos: RepoSet = ["acme/tools".to_string(), "gone/repo".to_string()]
        .into_iter()
        .collect();
    let items =
        expand_from_repo_pages(&client_for(&config), &site_for(&mock_server), &repos, 2).await;

    assert_eq!(items.len(), 2);
    let hidden = &items[&CanonicalId::new("acme", "tools", "hidden")];
    assert_eq!(hidden.name, "Hidden Gem");
    assert_eq!(hidden.discovered_via, DiscoveryMethod::RepoPage);
}

#[tokio::test]
async fn test_convergence_over_live_listing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path());

    mount_listing_page(
        &mock_server,
        1,
        vec![entry("acme/tools", "lint", 500), entry("other/repo", "deploy", 100)],
        false,
    )
    .await;

    let listing = SiteListing {
        client: client_for(&config),
        site: site_for(&mock_server),
        max_pages: 10,
        search_query_limit: 50,
    };
    let mut controller = ConvergenceController::new(&listing, &config.convergence);
    let outcome = controller.run("20250301T060000Z").await;

    assert!(outcome.report.converged);
    assert_eq!(
        outcome.report.reason,
        ConvergenceReason::ReposStableAndGrowthThresholdMet
    );
    assert_eq!(outcome.report.passes_executed, 2);
    assert!(!outcome.report.fallback_used);
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.repos.len(), 2);
}

#[tokio::test]
async fn test_interrupted_sweep_resumes_with_found_items() {
    let first = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&first.uri(), dir.path());
    config.discovery.search_batch_size = 1;
    config.discovery.use_convergence = false;
    config.discovery.expand_repo_pages = false;
    let layout = OutputLayout::new(dir.path());

    // "aa" answers at once; "ab" hangs until the run is cut off
    mount_search(&first, "aa", vec![entry("acme/tools", "search-hit", 42)]).await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", "ab"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&first)
        .await;

    let client = client_for(&config);
    let site = site_for(&first);
    let interrupted = tokio::time::timeout(
        Duration::from_millis(1500),
        run_discovery(&config, &client, &site, &layout, "run-1", Some(2), true),
    )
    .await;
    assert!(interrupted.is_err());

    let checkpoint: DiscoveryCheckpoint =
        load_checkpoint(&layout.discovery_checkpoint_path()).unwrap();
    assert!(!checkpoint.finished);
    let expected: BTreeSet<String> = ["aa".to_string()].into_iter().collect();
    assert_eq!(checkpoint.search_queries_completed, expected);
    assert!(!layout.discovered_items_path().exists());

    // The resumed run does not query "aa" again, and the new site no longer
    // lists the item anywhere
    let second = MockServer::start().await;
    config.site.base_url = second.uri();
    let client = client_for(&config);
    let resumed = run_discovery(
        &config,
        &client,
        &site_for(&second),
        &layout,
        "run-2",
        Some(1),
        true,
    )
    .await
    .unwrap();

    let ids: Vec<&str> = resumed.frontier.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["acme/tools/search-hit"]);
    let item = &resumed.frontier[&CanonicalId::new("acme", "tools", "search-hit")];
    assert_eq!(item.discovered_via, DiscoveryMethod::QueryEnumeration);
    assert_eq!(resumed.summary.by_source.get("query_enumeration"), Some(&1));
    assert!(resumed.repos.contains("acme/tools"));

    let finished: DiscoveryCheckpoint =
        load_checkpoint(&layout.discovery_checkpoint_path()).unwrap();
    assert!(finished.finished);
    assert_eq!(finished.search_queries_completed.len(), 2);
    assert!(!layout.partial_discovery_path().exists());
}
