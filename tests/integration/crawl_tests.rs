//! Integration tests for the sweep
//!
//! These tests use wiremock to create mock HTTP servers for the listing site
//! and the downstream service, and a temporary SQLite database for the store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use event_sweep::config::{
    load_config, Config, FetchConfig, NotifyConfig, SiteConfig, StorageConfig, UserAgentConfig,
};
use event_sweep::crawler::{
    Aggregator, DateWindow, FetchResult, HttpFetcher, PageFetcher, PolitenessDelay, RetryPolicy,
    SeedTemplate, SeedUrls,
};
use event_sweep::notify::Notifier;
use event_sweep::pipeline::{NotificationStatus, Pipeline};
use event_sweep::storage::{
    EventRecord, EventStore, RunRecord, RunStatus, RunSummary, SqliteEventStore, StorageResult,
    UpsertOutcome,
};
use event_sweep::{run_job_with_hash, EventId};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIRST_PAGE: &str = r#"<html><body>
    <a href="/e/jazz-night-1">Jazz</a>
    <a href="https://www.example.com/e/poetry-slam-2?aff=listing">Poetry</a>
    <a href="/e/jazz-night-1/">Jazz again</a>
    <div data-event-id="3"></div>
    <div data-event-id="not-a-number"></div>
    <a href="/d/online/">Browse</a>
</body></html>"#;

/// Creates a test configuration against the given servers
fn create_test_config(site_url: &str, notify_url: &str, db_path: &str, pages: u32) -> Config {
    Config {
        site: SiteConfig {
            base_url: site_url.to_string(),
            seed_paths: vec!["listing?page={page}".to_string()],
            max_pages_per_seed: pages,
            window_days: 14,
        },
        fetch: FetchConfig {
            timeout_secs: 5,
            retries: 3,
            backoff_base_ms: 1,
            backoff_jitter_ms: 0,
            politeness_min_ms: 0,
            politeness_max_ms: 0,
            max_concurrent_fetches: 1,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestSweep".to_string(),
            crawler_version: "1.0.0".to_string(),
            accept_language: Some("en-US,en;q=0.9".to_string()),
        },
        storage: StorageConfig {
            database_path: db_path.to_string(),
            table: "event_ids".to_string(),
        },
        notify: NotifyConfig {
            base_url: notify_url.to_string(),
            timeout_secs: 5,
        },
    }
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        base_delay: Duration::from_millis(1),
        max_jitter: Duration::ZERO,
    }
}

fn fast_fetcher(attempts: u32) -> HttpFetcher {
    HttpFetcher::with_client(reqwest::Client::new(), fast_policy(attempts))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Mounts page 1 with three ids and makes every other page fail with 503
async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/listing"))
        .and(query_param("page", "1"))
        .respond_with(html(FIRST_PAGE))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(2)
        .mount(server)
        .await;
}

async fn mount_notify(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/events/fetch-events"))
        .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn id_strings(ids: &[EventId]) -> Vec<&str> {
    ids.iter().map(|id| id.as_str()).collect()
}

// ===== Fetcher =====

#[tokio::test]
async fn test_transient_status_is_retried_up_to_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/busy", server.uri())).unwrap();
    let result = fast_fetcher(3).fetch(&url).await;

    match result {
        FetchResult::Failed {
            url: failed_url,
            attempts,
            reason,
        } => {
            assert_eq!(failed_url, url);
            assert_eq!(attempts, 3);
            assert!(reason.contains("503"), "unexpected reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
    let result = fast_fetcher(3).fetch(&url).await;

    assert!(matches!(result, FetchResult::Failed { attempts: 1, .. }));
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("<p>ok</p>"))
        .with_priority(2)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
    let result = fast_fetcher(3).fetch(&url).await;

    match result {
        FetchResult::Fetched {
            body, status_code, ..
        } => {
            assert_eq!(body, "<p>ok</p>");
            assert_eq!(status_code, 200);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sends_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(wiremock::matchers::header(
            "user-agent",
            "Mozilla/5.0 (compatible; TestSweep/1.0.0)",
        ))
        .and(wiremock::matchers::header_exists("accept-language"))
        .respond_with(html("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &server.uri(), "unused.db", 1);
    let fetcher = HttpFetcher::new(&config.fetch, &config.user_agent).unwrap();

    let url = Url::parse(&format!("{}/headers", server.uri())).unwrap();
    assert!(fetcher.fetch(&url).await.is_fetched());
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/moved/listing/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved/listing/"))
        .respond_with(html(r#"<a href="e/relative-event-42">x</a>"#))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
    let result = fast_fetcher(1).fetch(&url).await;

    let (body, final_url) = match result {
        FetchResult::Fetched {
            body, final_url, ..
        } => (body, final_url),
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(final_url.path(), "/moved/listing/");

    // Relative anchors resolve against the page that was actually served
    let ids = event_sweep::crawler::extract_event_ids(&body, &final_url);
    let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["42"]);
}

// ===== Full Runs =====

#[tokio::test]
async fn test_full_run_skips_failed_page() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    mount_listing(&site).await;
    mount_notify(&backend, 1).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ids.db");
    let config = create_test_config(&site.uri(), &backend.uri(), db_path.to_str().unwrap(), 2);

    let report = run_job_with_hash(config, "test_hash").await.unwrap();

    assert_eq!(report.stats.pages_crawled, 2);
    assert_eq!(report.stats.pages_failed, 1);
    assert_eq!(report.stats.unique_ids_found, 3);
    assert_eq!(id_strings(&report.ids), vec!["1", "2", "3"]);
    assert_eq!(report.upsert.inserted, 3);
    assert_eq!(report.upsert.modified, 0);

    match &report.notification {
        NotificationStatus::Delivered(response) => {
            assert_eq!(response.status, 200);
            assert_eq!(response.body, "queued");
        }
        other => panic!("expected delivery, got {:?}", other),
    }

    let store = SqliteEventStore::new(&db_path, "event_ids").unwrap();
    assert_eq!(store.count_event_ids().unwrap(), 3);
    for id in ["1", "2", "3"] {
        assert!(store.get_event(id).unwrap().is_some(), "{} missing", id);
    }

    let runs = store.latest_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(Some(runs[0].id), report.run_id);
    assert_eq!(runs[0].summary.status, RunStatus::Completed);
    assert_eq!(runs[0].summary.config_hash, "test_hash");
    assert_eq!(runs[0].summary.pages_failed, 1);
    assert_eq!(runs[0].summary.notify_status, Some(200));
}

#[tokio::test]
async fn test_second_run_only_refreshes() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    mount_listing(&site).await;
    mount_notify(&backend, 2).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ids.db");
    let config = create_test_config(&site.uri(), &backend.uri(), db_path.to_str().unwrap(), 1);

    run_job_with_hash(config.clone(), "h").await.unwrap();
    let store = SqliteEventStore::new(&db_path, "event_ids").unwrap();
    let before = store.get_event("1").unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = run_job_with_hash(config, "h").await.unwrap();
    let after = store.get_event("1").unwrap().unwrap();

    assert_eq!(second.upsert.inserted, 0);
    assert_eq!(second.upsert.modified, 3);
    assert_eq!(store.count_event_ids().unwrap(), 3);
    assert_eq!(after.first_seen_at, before.first_seen_at);
    assert!(after.last_seen_at > before.last_seen_at);
    assert_eq!(store.latest_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_notify_failure_keeps_identifiers() {
    let site = MockServer::start().await;
    mount_listing(&site).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ids.db");
    // Nothing listens on the discard port
    let config = create_test_config(
        &site.uri(),
        "http://127.0.0.1:9",
        db_path.to_str().unwrap(),
        1,
    );

    let report = run_job_with_hash(config, "h").await.unwrap();

    assert!(!report.notification.is_delivered());

    let store = SqliteEventStore::new(&db_path, "event_ids").unwrap();
    assert_eq!(store.count_event_ids().unwrap(), 3);

    let runs = store.latest_runs(1).unwrap();
    assert_eq!(runs[0].summary.status, RunStatus::NotifyFailed);
    assert_eq!(runs[0].summary.notify_status, None);
    assert!(runs[0].summary.error_message.is_some());
}

#[tokio::test]
async fn test_downstream_error_status_is_reported() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    mount_listing(&site).await;
    Mock::given(method("POST"))
        .and(path("/events/fetch-events"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .expect(1)
        .mount(&backend)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ids.db");
    let config = create_test_config(&site.uri(), &backend.uri(), db_path.to_str().unwrap(), 1);

    let report = run_job_with_hash(config, "h").await.unwrap();

    match report.notification {
        NotificationStatus::Delivered(response) => {
            assert_eq!(response.status, 500);
            assert_eq!(response.body, "backend down");
        }
        other => panic!("expected delivery, got {:?}", other),
    }
}

#[tokio::test]
async fn test_all_pages_failing_still_notifies() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&site)
        .await;
    mount_notify(&backend, 1).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ids.db");
    let config = create_test_config(&site.uri(), &backend.uri(), db_path.to_str().unwrap(), 3);

    let report = run_job_with_hash(config, "h").await.unwrap();

    assert_eq!(report.stats.pages_crawled, 3);
    assert_eq!(report.stats.pages_failed, 3);
    assert!(report.ids.is_empty());
    assert_eq!(report.upsert.changed(), 0);
    assert!(report.notification.is_delivered());
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    for page in 1..=6u32 {
        Mock::given(method("GET"))
            .and(path("/listing"))
            .and(query_param("page", page.to_string()))
            .respond_with(html(&format!(
                r#"<a href="/e/show-{}">a</a><a href="/e/show-{}">b</a>"#,
                page * 10,
                page * 10 + 1
            )))
            .mount(&site)
            .await;
    }
    mount_notify(&backend, 2).await;

    let dir = TempDir::new().unwrap();
    let mut sequential = create_test_config(
        &site.uri(),
        &backend.uri(),
        dir.path().join("seq.db").to_str().unwrap(),
        6,
    );
    sequential.fetch.max_concurrent_fetches = 1;
    let mut concurrent = sequential.clone();
    concurrent.fetch.max_concurrent_fetches = 4;
    concurrent.storage.database_path = dir.path().join("par.db").to_str().unwrap().to_string();

    let first = run_job_with_hash(sequential, "seq").await.unwrap();
    let second = run_job_with_hash(concurrent, "par").await.unwrap();

    assert_eq!(first.ids, second.ids);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.ids.len(), 12);
    assert_eq!(first.ids.first().map(|id| id.as_str()), Some("10"));
    assert_eq!(first.ids.last().map(|id| id.as_str()), Some("61"));
}

#[tokio::test]
async fn test_run_from_config_file() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    mount_listing(&site).await;
    mount_notify(&backend, 1).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("from_file.db");
    let config_path = dir.path().join("sweep.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[site]
base-url = "{site}"
seed-paths = ["listing?page={{page}}&start_date={{start_date}}&end_date={{end_date}}"]
max-pages-per-seed = 1

[fetch]
retries = 2
backoff-base-ms = 1
backoff-jitter-ms = 0
politeness-min-ms = 0
politeness-max-ms = 0

[user-agent]
crawler-name = "TestSweep"
crawler-version = "1.0.0"

[storage]
database-path = "{db}"
table = "file_ids"

[notify]
base-url = "{backend}/"
"#,
        site = site.uri(),
        db = db_path.display(),
        backend = backend.uri(),
    )
    .unwrap();
    drop(file);

    let config = load_config(&config_path).unwrap();
    let report = run_job_with_hash(config, "file").await.unwrap();

    assert_eq!(id_strings(&report.ids), vec!["1", "2", "3"]);

    let store = SqliteEventStore::new(&db_path, "file_ids").unwrap();
    assert_eq!(store.count_event_ids().unwrap(), 3);
}

// ===== Component Wiring =====

/// Store that records every upsert batch
#[derive(Default)]
struct RecordingStore {
    batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl EventStore for RecordingStore {
    fn upsert_event_ids(&self, ids: &[EventId]) -> StorageResult<UpsertOutcome> {
        self.batches
            .lock()
            .unwrap()
            .push(ids.iter().map(|id| id.to_string()).collect());
        Ok(UpsertOutcome {
            inserted: ids.len() as u64,
            modified: 0,
        })
    }

    fn get_event(&self, _id: &str) -> StorageResult<Option<EventRecord>> {
        Ok(None)
    }

    fn count_event_ids(&self) -> StorageResult<u64> {
        Ok(0)
    }

    fn count_first_seen_since(&self, _since: DateTime<Utc>) -> StorageResult<u64> {
        Ok(0)
    }

    fn count_last_seen_since(&self, _since: DateTime<Utc>) -> StorageResult<u64> {
        Ok(0)
    }

    fn record_run(&self, _run: &RunSummary) -> StorageResult<i64> {
        Ok(1)
    }

    fn latest_runs(&self, _limit: usize) -> StorageResult<Vec<RunRecord>> {
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Wraps a fetcher and counts calls
struct CountingFetcher {
    inner: HttpFetcher,
    calls: Mutex<u32>,
}

#[async_trait]
impl PageFetcher for CountingFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        *self.calls.lock().unwrap() += 1;
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn test_upsert_called_once_with_sorted_ids() {
    let site = MockServer::start().await;
    let backend = MockServer::start().await;
    mount_listing(&site).await;
    mount_notify(&backend, 1).await;

    let window = DateWindow::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 14).unwrap();
    let seeds = SeedUrls::new(
        Url::parse(&site.uri()).unwrap(),
        vec![SeedTemplate::parse("listing?page={page}").unwrap()],
        2,
        window,
    )
    .unwrap();

    let fetcher = Arc::new(CountingFetcher {
        inner: fast_fetcher(2),
        calls: Mutex::new(0),
    });
    let aggregator = Aggregator::new(fetcher.clone(), PolitenessDelay::none(), 1);
    let store = RecordingStore::default();
    let batches = Arc::clone(&store.batches);
    let notifier = Notifier::new(&backend.uri(), Duration::from_secs(5)).unwrap();

    let mut pipeline = Pipeline::with_components(seeds, aggregator, Box::new(store), notifier);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.upsert.inserted, 3);
    assert_eq!(
        *batches.lock().unwrap(),
        vec![vec!["1".to_string(), "2".to_string(), "3".to_string()]]
    );
    // One call per page; retries stay inside the fetcher
    assert_eq!(*fetcher.calls.lock().unwrap(), 2);
    assert_eq!(pipeline.phase(), event_sweep::JobPhase::Done);
}
