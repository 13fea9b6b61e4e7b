//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a fake postback grid and run the full
//! crawl cycle end-to-end: entry page, aggregate attempt, numbered fallback,
//! normalization and storage.

use chrono::Utc;
use propgrid::config::{parse_config, Config};
use propgrid::crawler::{crawl, crawl_with, Coordinator, FetchError};
use propgrid::output::{store_report, ArtifactDownloader, SnapshotSink};
use propgrid::storage::{RunStatus, SqliteStorage, Storage};
use propgrid::PropgridError;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GRID_PATH: &str = "/listings/Home.aspx";
const GRID_TARGET: &str = "ctl00$MainContent$gvPropertyList";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str, max_pages: u32) -> Config {
    parse_config(&format!(
        r#"
[crawler]
entry-url = "{base}{grid}"
request-delay-ms = 0
max-pages = {max_pages}
run-timeout-secs = 30

[retry]
max-attempts = 3
backoff-min-ms = 1
backoff-max-ms = 2

[endpoints]
origin = "{base}"
details = "{base}/listings/pspropertydetails.aspx"
image = "{base}/listings/imageview.aspx"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db}"
"#,
        base = base_url,
        grid = GRID_PATH,
        max_pages = max_pages,
        db = db_path,
    ))
    .expect("test config is valid")
}

/// Renders a grid page with hidden state, rows and pager controls
fn grid_page(viewstate: &str, ids: &[u32], pager: &[(&str, &str)]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr><td>{id}</td><td>{id} Bay St</td><td>Toronto</td><td>$1,{id:03},000</td>
                   <td>03/15/2024</td>
                   <td><a href="pspropertydetails.aspx?id={id}">Details</a></td>
                   <td><a href="imageview.aspx?id={id}">Map</a></td></tr>"#,
                id = id
            )
        })
        .collect();

    let controls: String = pager
        .iter()
        .map(|(label, argument)| {
            format!(
                r#"<a href="javascript:__doPostBack('{}','{}')">{}</a> "#,
                GRID_TARGET, argument, label
            )
        })
        .collect();

    format!(
        r#"<html><body><form method="post" action="./Home.aspx">
            <input type="hidden" name="__VIEWSTATE" value="{vs}" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="CA0B0334" />
            <input type="hidden" name="__EVENTVALIDATION" value="ev-{vs}" />
            <span>Total Records: 6</span>
            <table id="ctl00_MainContent_gvPropertyList">
              <tr><th>ID</th><th>Municipal Address</th><th>City</th><th>Price</th>
                  <th>Posted</th><th>Details</th><th>Image</th></tr>
              {rows}
              <tr><td colspan="7">{controls}</td></tr>
            </table>
        </form></body></html>"#,
        vs = viewstate,
        rows = rows,
        controls = controls,
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_entry(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path(GRID_PATH))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Bodies of every POST the server received, in arrival order
async fn post_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.to_string() == "POST")
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect()
}

#[tokio::test]
async fn test_aggregate_page_is_requested_first() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    mount_entry(
        &server,
        grid_page("vs-1", &[1, 2], &[("2", "Page$2"), ("All", "Page$All")]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(GRID_PATH))
        .and(body_string_contains("Page%24All"))
        .respond_with(html(grid_page("vs-all", &[1, 2, 3, 4, 5, 6], &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRID_PATH))
        .and(body_string_contains("Page%242"))
        .respond_with(html(grid_page("vs-2", &[3, 4], &[])))
        .expect(0)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert!(report.aggregate_used);
    assert!(!report.is_partial());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.raw_row_count, 6);
    assert_eq!(report.listings.len(), 6);
    assert_eq!(report.reported_total, Some(6));

    let bodies = post_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].starts_with("__EVENTTARGET=ctl00%24MainContent%24gvPropertyList"));
    assert!(bodies[0].contains("__VIEWSTATE=vs-1"));
}

#[tokio::test]
async fn test_fallback_pages_rotate_form_state() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    // Page 3 is only reachable from the pager on page 2
    mount_entry(
        &server,
        grid_page("vs-1", &[1, 2], &[("2", "Page$2"), ("All", "Page$All")]),
    )
    .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%24All"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%242"))
        .and(body_string_contains("__VIEWSTATE=vs-1"))
        .respond_with(html(grid_page(
            "vs-2",
            &[3, 4],
            &[("1", "Page$1"), ("3", "Page$3")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%243"))
        .and(body_string_contains("__VIEWSTATE=vs-2"))
        .respond_with(html(grid_page(
            "vs-3",
            &[5, 6],
            &[("1", "Page$1"), ("2", "Page$2")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert!(!report.aggregate_used);
    assert!(!report.is_partial());
    assert_eq!(report.pages_fetched, 3);
    let ids: Vec<&str> = report.listings.iter().map(|l| l.property_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);

    let bodies = post_bodies(&server).await;
    assert_eq!(bodies.len(), 5);
    assert!(bodies[..3].iter().all(|b| b.contains("Page%24All")));
    assert!(bodies[3].contains("Page%242"));
    assert!(bodies[4].contains("Page%243"));
}

#[tokio::test]
async fn test_partial_failure_keeps_gathered_rows() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    mount_entry(
        &server,
        grid_page("vs-1", &[1, 2], &[("2", "Page$2"), ("3", "Page$3")]),
    )
    .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%242"))
        .respond_with(html(grid_page("vs-2", &[3, 4], &[("3", "Page$3")])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%243"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("partial crawl still reports");

    assert!(report.is_partial());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.listings.len(), 4);
    match report.error {
        Some(FetchError::Exhausted {
            method, attempts, ..
        }) => {
            assert_eq!(method, "POST");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected exhausted fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_entry_page_failure_exhausts_retries() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    Mock::given(method("GET"))
        .and(path(GRID_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = crawl(config).await;

    match result {
        Err(PropgridError::Fetch(FetchError::Exhausted {
            url,
            attempts,
            last_error,
            ..
        })) => {
            assert!(url.ends_with(GRID_PATH));
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected fetch error, got {:?}", other.map(|r| r.listings.len())),
    }
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    Mock::given(method("GET"))
        .and(path(GRID_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    mount_entry(&server, grid_page("vs-1", &[7], &[])).await;

    let report = crawl(config).await.expect("second attempt succeeds");
    assert_eq!(report.listings.len(), 1);
    assert_eq!(report.listings[0].property_id, "7");
}

#[tokio::test]
async fn test_single_page_without_pager() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let config = create_test_config(&base_url, "unused.db", 10);

    mount_entry(&server, grid_page("vs-1", &[41, 42, 41], &[])).await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert_eq!(report.pages_fetched, 1);
    assert!(!report.aggregate_used);
    assert_eq!(report.raw_row_count, 3);
    assert_eq!(report.listings.len(), 2);

    let first = &report.listings[0];
    assert_eq!(first.address, "41 Bay St");
    assert_eq!(first.price, Some(1_041_000.0));
    assert_eq!(
        first.details_url.as_deref(),
        Some(format!("{}/listings/pspropertydetails.aspx?id=41", base_url).as_str())
    );
    assert!(post_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn test_max_pages_bounds_fallback() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 1);

    mount_entry(
        &server,
        grid_page("vs-1", &[1], &[("2", "Page$2"), ("3", "Page$3")]),
    )
    .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%242"))
        .respond_with(html(grid_page("vs-2", &[2], &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%243"))
        .respond_with(html(grid_page("vs-3", &[3], &[])))
        .expect(0)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert!(!report.is_partial());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.listings.len(), 2);
}

#[tokio::test]
async fn test_snapshot_storage_is_idempotent_per_day() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("listings.db");
    let config = create_test_config(&server.uri(), db_path.to_str().unwrap(), 10);

    mount_entry(&server, grid_page("vs-1", &[1, 2, 3], &[])).await;

    for expected_inserted in [3, 0] {
        let report = crawl(config.clone()).await.expect("crawl succeeds");
        let storage = SqliteStorage::new(&db_path).unwrap();
        let mut sink =
            SnapshotSink::begin(storage, "test_hash", report.ingested_at.date_naive()).unwrap();

        let inserted = store_report(&mut sink, &report).unwrap();
        assert_eq!(inserted, expected_inserted);
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_runs().unwrap(), 2);
    assert_eq!(storage.count_listings().unwrap(), 3);

    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.totals.listings, 3);

    let snapshot = storage.load_snapshot(Utc::now().date_naive()).unwrap();
    assert_eq!(snapshot.len(), 3);
}

#[tokio::test]
async fn test_artifacts_skip_existing_files() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), "unused.db", 10);

    mount_entry(&server, grid_page("vs-1", &[1, 2, 3], &[])).await;

    Mock::given(method("GET"))
        .and(path("/listings/imageview.aspx"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-2".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/listings/imageview.aspx"))
        .and(query_param("id", "3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    std::fs::write(dir.path().join("1.pdf"), b"cached").unwrap();

    let coordinator = Coordinator::new(config).unwrap();
    let report = crawl_with(&coordinator).await.expect("crawl succeeds");

    let downloader =
        ArtifactDownloader::new(coordinator.executor(), dir.path(), 10, Duration::ZERO);
    let summary = downloader.download_all(&report.listings).await.unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.considered, 2);
    assert_eq!(std::fs::read(dir.path().join("1.pdf")).unwrap(), b"cached");
    assert_eq!(std::fs::read(dir.path().join("2.pdf")).unwrap(), b"%PDF-2");
    assert!(!dir.path().join("3.pdf").exists());
}

#[tokio::test]
async fn test_empty_aggregate_page_still_rotates_form_state() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    mount_entry(
        &server,
        grid_page("vs-1", &[1, 2], &[("2", "Page$2"), ("All", "Page$All")]),
    )
    .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%24All"))
        .respond_with(html(grid_page("vs-all", &[], &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Page%242"))
        .and(body_string_contains("__VIEWSTATE=vs-all"))
        .and(body_string_contains("__EVENTVALIDATION=ev-vs-all"))
        .respond_with(html(grid_page("vs-2", &[3, 4], &[])))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert!(!report.aggregate_used);
    assert!(!report.is_partial());
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.raw_row_count, 4);

    let ids: Vec<&str> = report.listings.iter().map(|l| l.property_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_session_cookie_carried_across_postbacks() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), "unused.db", 10);

    Mock::given(method("GET"))
        .and(path(GRID_PATH))
        .respond_with(
            html(grid_page("vs-1", &[1], &[("2", "Page$2")]))
                .insert_header("set-cookie", "ASP.NET_SessionId=abc123; path=/; HttpOnly"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRID_PATH))
        .and(header("cookie", "ASP.NET_SessionId=abc123"))
        .respond_with(html(grid_page("vs-2", &[2], &[])))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawl(config).await.expect("crawl succeeds");

    assert!(!report.is_partial());
    assert_eq!(report.listings.len(), 2);
}
