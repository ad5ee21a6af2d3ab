//! End-to-end pipeline tests against mock HTTP servers
//!
//! These drive the full discovery -> extraction -> reconciliation flow over
//! small fixed site graphs, including retry schedules, idempotent re-runs,
//! and crash/resume behavior.

use ccr_harvester::config::{
    Config, CoverageConfig, CrawlerConfig, RetryConfig, SiteConfig, StorageConfig, UserAgentConfig,
};
use ccr_harvester::crawler::{DiscoveryEngine, SectionExtractor};
use ccr_harvester::output::{reconcile_stores, render_report, CoverageStatus};
use ccr_harvester::storage::{
    Checkpoint, DiscoveredStore, ErrorKind, FailedStore, FailedTarget, SectionStore,
};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config(base_url: &str, data_dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            seeds: vec![format!("{}/calregs/Browse/Home", base_url)],
        },
        crawler: CrawlerConfig {
            max_concurrent_requests: 2,
            request_delay_ms: 1,
            checkpoint_every: 50,
            max_pages: None,
            max_leaf_urls: None,
            timeout_seconds: 5,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 5,
            max_delay_ms: 20,
        },
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
        },
        coverage: CoverageConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "test@example.com".to_string(),
        },
    }
}

fn stores(config: &Config) -> (DiscoveredStore, SectionStore, FailedStore) {
    (
        DiscoveredStore::new(config.storage.discovered_path()),
        SectionStore::new(config.storage.sections_path()),
        FailedStore::new(config.storage.failed_path()),
    )
}

fn browse_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">entry</a></li>"#, href))
        .collect();
    format!(
        r#"<html><body><ul class="toc">{}</ul></body></html>"#,
        anchors
    )
}

fn section_page(title_no: u32, section_no: &str, heading_text: &str) -> String {
    format!(
        r#"<html><body>
        <nav class="co_breadcrumb">
            <a href="/calregs">Title {title_no}. Public Health</a> &gt;
            <a href="/calregs">Chapter 1. General</a>
        </nav>
        <h2 class="co_sectionHeading">§ {section_no}. {heading}</h2>
        <div class="section-content"><p>Body of section {section_no}.</p></div>
        </body></html>"#,
        title_no = title_no,
        section_no = section_no,
        heading = heading_text
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts the small fixed graph from the end-to-end scenario: one seed browse
/// page linking to two sections and one deeper browse page, which links to a
/// third section.
async fn mount_small_site(server: &MockServer) {
    mount_page(
        server,
        "/calregs/Browse/Home",
        browse_page(&[
            "/calregs/Document/SEC100?viewType=FullText",
            "/calregs/Document/SEC200",
            "/calregs/Browse/Chapter2",
            "mailto:webmaster@example.com",
        ]),
    )
    .await;
    mount_page(
        server,
        "/calregs/Browse/Chapter2",
        browse_page(&["/calregs/Document/SEC300", "/calregs/Browse/Home"]),
    )
    .await;
    mount_page(
        server,
        "/calregs/Document/SEC100",
        section_page(17, "100", "Scope."),
    )
    .await;
    mount_page(
        server,
        "/calregs/Document/SEC200",
        section_page(17, "200", "Definitions."),
    )
    .await;
    // SEC300 is a dead link
    Mock::given(method("GET"))
        .and(path("/calregs/Document/SEC300"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovery_finds_all_leaves_once() {
    init_tracing();
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let mut engine = DiscoveryEngine::new(config.clone(), None).unwrap();
    let stats = engine.run().await.unwrap();

    assert_eq!(stats.pages_visited, 2);
    assert_eq!(stats.pages_failed, 0);
    assert_eq!(stats.newly_discovered, 3);
    assert_eq!(stats.total_discovered, 3);

    let (discovered, _, _) = stores(&config);
    let targets = discovered.load().unwrap();
    assert_eq!(targets.len(), 3);

    // No duplicates, and the session-free canonical form is stored
    let mut urls: Vec<String> = targets.into_iter().map(|t| t.canonical_url).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/calregs/Document/SEC100?viewType=FullText", server.uri()),
            format!("{}/calregs/Document/SEC200", server.uri()),
            format!("{}/calregs/Document/SEC300", server.uri()),
        ]
    );

    // The run left a checkpoint behind
    let checkpoint = Checkpoint::load(&config.storage.checkpoint_path())
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.visited.len(), 2);
    assert!(checkpoint.frontier.is_empty());
    assert_eq!(checkpoint.discovered_count, 3);
}

#[tokio::test]
async fn test_end_to_end_extraction_and_coverage() {
    init_tracing();
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    DiscoveryEngine::new(config.clone(), None)
        .unwrap()
        .run()
        .await
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    let stats = extractor.run().await.unwrap();

    assert_eq!(stats.extracted, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 0);

    let (discovered, sections, failed) = stores(&config);

    let records = sections.load().unwrap();
    assert_eq!(records.len(), 2);
    let mut citations: Vec<&str> = records.iter().map(|r| r.citation.as_str()).collect();
    citations.sort();
    assert_eq!(citations, vec!["17 CCR § 100", "17 CCR § 200"]);
    for record in &records {
        assert_eq!(record.title_number, Some(17));
        assert_eq!(record.chapter.as_deref(), Some("Chapter 1. General"));
        assert!(record.content.contains("Body of section"));
    }

    let failures = failed.load().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_kind, ErrorKind::NotFound);
    assert_eq!(failures[0].attempt_count, 1);
    assert!(failures[0].canonical_url.ends_with("/calregs/Document/SEC300"));

    // Reconciliation: everything accounted for, so the crawl is healthy
    let report =
        reconcile_stores(&discovered, &sections, &failed, &config.coverage).unwrap();
    assert_eq!(report.discovered_count, 3);
    assert_eq!(report.extracted_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.missing_count, 0);
    assert_eq!(report.status, CoverageStatus::Excellent);

    let rendered = render_report(&report);
    assert!(rendered.contains("**EXCELLENT**"));
    assert!(rendered.contains("### not_found (1 URLs)"));
}

#[tokio::test]
async fn test_extraction_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    DiscoveryEngine::new(config.clone(), None)
        .unwrap()
        .run()
        .await
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    extractor.run().await.unwrap();

    let requests_after_first = server.received_requests().await.unwrap().len();
    let (_, sections, _) = stores(&config);
    let records_after_first = sections.load().unwrap();

    // Second run: everything extractable is already present. The 404 target
    // has a failure record, not a section record, so it alone is re-fetched.
    let stats = extractor.run().await.unwrap();
    assert_eq!(stats.extracted, 0);
    assert_eq!(stats.skipped, 2);

    let requests_after_second = server.received_requests().await.unwrap().len();
    assert_eq!(requests_after_second - requests_after_first, 1);

    assert_eq!(sections.load().unwrap(), records_after_first);
}

#[tokio::test]
async fn test_rerun_with_everything_extracted_fetches_nothing() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/calregs/Document/ONLY",
        section_page(17, "100", "Scope."),
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let (discovered, sections, _) = stores(&config);
    config.storage.ensure_data_dir().unwrap();
    discovered
        .append(&ccr_harvester::storage::DiscoveredTarget::new(format!(
            "{}/calregs/Document/ONLY",
            server.uri()
        )))
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    extractor.run().await.unwrap();
    let records_after_first = sections.load().unwrap();
    let requests_after_first = server.received_requests().await.unwrap().len();

    let stats = extractor.run().await.unwrap();
    assert_eq!(stats.extracted, 0);
    assert_eq!(stats.skipped, 1);

    // Second run performed zero fetches and changed nothing
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
    assert_eq!(sections.load().unwrap(), records_after_first);
}

#[tokio::test]
async fn test_transient_failures_retry_to_success() {
    let server = MockServer::start().await;

    // Two 503s, then a good response
    Mock::given(method("GET"))
        .and(path("/calregs/Document/FLAKY"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/calregs/Document/FLAKY",
        section_page(17, "550", "Recovered."),
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let (discovered, sections, failed) = stores(&config);
    config.storage.ensure_data_dir().unwrap();
    discovered
        .append(&ccr_harvester::storage::DiscoveredTarget::new(format!(
            "{}/calregs/Document/FLAKY",
            server.uri()
        )))
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    let stats = extractor.run().await.unwrap();

    // Exactly one record, zero failure entries
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(sections.load().unwrap().len(), 1);
    assert_eq!(sections.load().unwrap()[0].section_number, "550");
    assert!(failed.load().unwrap().is_empty());

    // First attempt plus two retries
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_attempts_write_one_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calregs/Document/DOWN"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let (discovered, sections, failed) = stores(&config);
    config.storage.ensure_data_dir().unwrap();
    discovered
        .append(&ccr_harvester::storage::DiscoveredTarget::new(format!(
            "{}/calregs/Document/DOWN",
            server.uri()
        )))
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    let stats = extractor.run().await.unwrap();

    assert_eq!(stats.extracted, 0);
    assert_eq!(stats.failed, 1);
    assert!(sections.load().unwrap().is_empty());

    let failures = failed.load().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_kind, ErrorKind::ServerError);
    assert_eq!(failures[0].attempt_count, config.retry.max_attempts);

    assert_eq!(
        server.received_requests().await.unwrap().len(),
        config.retry.max_attempts as usize
    );
}

#[tokio::test]
async fn test_unparseable_page_is_terminal_parse_error() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/calregs/Document/JUNK",
        "<html><body><p>no heading anywhere</p></body></html>".to_string(),
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let (discovered, _, failed) = stores(&config);
    config.storage.ensure_data_dir().unwrap();
    discovered
        .append(&ccr_harvester::storage::DiscoveredTarget::new(format!(
            "{}/calregs/Document/JUNK",
            server.uri()
        )))
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    let stats = extractor.run().await.unwrap();

    assert_eq!(stats.failed, 1);
    let failures = failed.load().unwrap();
    assert_eq!(failures[0].error_kind, ErrorKind::ParseError);
    // No retries for parse failures
    assert_eq!(failures[0].attempt_count, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_browse_page_does_not_abort_crawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/calregs/Browse/Home",
        browse_page(&["/calregs/Browse/Broken", "/calregs/Browse/Good"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/calregs/Browse/Broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/calregs/Browse/Good",
        browse_page(&["/calregs/Document/SEC900"]),
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let mut engine = DiscoveryEngine::new(config.clone(), None).unwrap();
    let stats = engine.run().await.unwrap();

    // The broken branch is dropped; the rest of the crawl completes
    assert_eq!(stats.pages_visited, 3);
    assert_eq!(stats.pages_failed, 1);
    assert_eq!(stats.newly_discovered, 1);
}

#[tokio::test]
async fn test_interrupted_discovery_resumes_to_same_set() {
    // Fixed chain of browse pages: B1 -> B2 -> B3 -> B4 -> B5, each with one
    // section leaf
    async fn mount_chain(server: &MockServer) {
        for i in 1..=5u32 {
            let mut links = vec![format!("/calregs/Document/D{}", i)];
            if i < 5 {
                links.push(format!("/calregs/Browse/B{}", i + 1));
            }
            let refs: Vec<&str> = links.iter().map(|s| s.as_str()).collect();
            let page_path = if i == 1 {
                "/calregs/Browse/Home".to_string()
            } else {
                format!("/calregs/Browse/B{}", i)
            };
            mount_page(server, &page_path, browse_page(&refs)).await;
        }
    }

    let server = MockServer::start().await;
    mount_chain(&server).await;

    // Uninterrupted reference run
    let reference_dir = tempfile::TempDir::new().unwrap();
    let reference_config = test_config(&server.uri(), reference_dir.path());
    DiscoveryEngine::new(reference_config.clone(), None)
        .unwrap()
        .run()
        .await
        .unwrap();
    let mut reference_urls: Vec<String> = DiscoveredStore::new(
        reference_config.storage.discovered_path(),
    )
    .load()
    .unwrap()
    .into_iter()
    .map(|t| t.canonical_url)
    .collect();
    reference_urls.sort();
    assert_eq!(reference_urls.len(), 5);

    // Interrupted run: stop after 2 pages, then resume without the cap
    let dir = tempfile::TempDir::new().unwrap();
    let mut capped_config = test_config(&server.uri(), dir.path());
    capped_config.crawler.max_pages = Some(2);
    capped_config.crawler.max_concurrent_requests = 1;

    let mut first = DiscoveryEngine::new(capped_config.clone(), None).unwrap();
    let first_stats = first.run().await.unwrap();
    assert_eq!(first_stats.pages_visited, 2);
    drop(first);

    let checkpoint = Checkpoint::load(&capped_config.storage.checkpoint_path())
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.visited.len(), 2);
    assert!(!checkpoint.frontier.is_empty());

    let resumed_config = test_config(&server.uri(), dir.path());
    let requests_before_resume = server.received_requests().await.unwrap().len();
    let mut resumed = DiscoveryEngine::new(resumed_config.clone(), None).unwrap();
    resumed.run().await.unwrap();

    // Visited pages are not re-fetched on resume
    let resume_requests =
        server.received_requests().await.unwrap().len() - requests_before_resume;
    assert_eq!(resume_requests, 3);

    let mut resumed_urls: Vec<String> =
        DiscoveredStore::new(resumed_config.storage.discovered_path())
            .load()
            .unwrap()
            .into_iter()
            .map(|t| t.canonical_url)
            .collect();
    resumed_urls.sort();

    assert_eq!(resumed_urls, reference_urls);
}

#[tokio::test]
async fn test_retry_failed_recovery_pass_supersedes_failure() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/calregs/Document/BACKUP",
        section_page(3, "4500", "Back online."),
    )
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    let (discovered, sections, failed) = stores(&config);
    config.storage.ensure_data_dir().unwrap();

    let url = format!("{}/calregs/Document/BACKUP", server.uri());
    discovered
        .append(&ccr_harvester::storage::DiscoveredTarget::new(url.clone()))
        .unwrap();
    failed
        .append(&FailedTarget::new(
            url.clone(),
            ErrorKind::ServerError,
            3,
            "HTTP 503",
        ))
        .unwrap();

    let extractor = SectionExtractor::new(config.clone()).unwrap();
    let stats = extractor.retry_failed().await.unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.failed, 0);

    // The stale failure entry stays on disk; reconciliation counts the URL
    // as extracted
    assert_eq!(failed.load().unwrap().len(), 1);
    let report = reconcile_stores(&discovered, &sections, &failed, &config.coverage).unwrap();
    assert_eq!(report.extracted_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.missing_count, 0);
    assert_eq!(report.status, CoverageStatus::Excellent);
}

#[tokio::test]
async fn test_max_leaf_urls_cap_stops_discovery() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.crawler.max_leaf_urls = Some(2);
    config.crawler.max_concurrent_requests = 1;

    let mut engine = DiscoveryEngine::new(config.clone(), None).unwrap();
    let stats = engine.run().await.unwrap();

    // The seed page alone yields two leaves, hitting the cap before the
    // deeper browse page is fetched
    assert_eq!(stats.pages_visited, 1);
    assert_eq!(stats.newly_discovered, 2);
}
