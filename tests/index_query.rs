//! Integration tests for `run_crawl` against a mock CDX index server.
//!
//! The mock serves `/collinfo.json` and a single collection whose query
//! endpoint is `/CC-MAIN-TEST-index`.

use std::path::Path;
use std::time::Duration;

use shopscan::config::{IndexSettings, ProbeSettings};
use shopscan::error_handling::{ErrorType, InfoType, SkipReason};
use shopscan::{list_crawls, run_crawl, ConfigError, CrawlConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "CC-MAIN-TEST";
const CDX_PATH: &str = "/CC-MAIN-TEST-index";

/// One index line for a successful HTML capture of `url`.
fn cdx_line(url: &str) -> String {
    serde_json::json!({
        "urlkey": "ch,test)/",
        "timestamp": "20240301120000",
        "url": url,
        "mime": "text/html",
        "status": "200",
        "languages": "deu,eng",
    })
    .to_string()
}

fn page_body(urls: &[&str]) -> String {
    urls.iter().map(|u| cdx_line(u) + "\n").collect()
}

/// Starts a mock index listing one collection with `pages` pages for `tld`.
async fn start_index(tld: &str, pages: u64) -> MockServer {
    let server = MockServer::start().await;
    let collinfo = serde_json::json!([{
        "id": COLLECTION,
        "name": "Test crawl",
        "cdx-api": format!("{}{}", server.uri(), CDX_PATH),
    }]);
    Mock::given(method("GET"))
        .and(path("/collinfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collinfo))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CDX_PATH))
        .and(query_param("url", format!("*.{tld}")))
        .and(query_param("showNumPages", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "pages": pages })))
        .mount(&server)
        .await;
    server
}

async fn mount_page(server: &MockServer, page: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(CDX_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Helper to build a crawl config pointed at the mock server
fn create_test_config(server: &MockServer, tld: &str, output_dir: &Path) -> CrawlConfig {
    CrawlConfig {
        tlds: vec![tld.to_string()],
        output_dir: output_dir.to_path_buf(),
        workers: 1,
        index: IndexSettings {
            server: server.uri(),
            timeout: Duration::from_secs(5),
            retries: 1,
            retry_delay_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn discovered_domains(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open discovery file");
    reader
        .records()
        .map(|r| r.expect("Invalid CSV row")[0].to_string())
        .collect()
}

#[tokio::test]
async fn test_crawl_dedups_across_pages_in_order() {
    let server = start_index("ch", 2).await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string(page_body(&[
            "https://shop-a.ch/cart",
            "https://www.shop-b.ch/",
            "https://shop-a.ch/products/1",
        ])),
    )
    .await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_string(page_body(&[
            "https://shop-c.ch/",
            "http://SHOP-B.ch/about",
        ])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "ch", dir.path());
    let report = run_crawl(config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.index.shards, 1);
    assert_eq!(report.index.pages_fetched, 2);
    assert_eq!(report.index.records_parsed, 5);
    assert_eq!(report.index.domains_admitted, 3);
    assert!(report.live.is_none());

    assert_eq!(
        discovered_domains(&report.discovery_path),
        vec!["shop-a.ch", "shop-b.ch", "shop-c.ch"]
    );
    assert_eq!(report.stats.get_skip_count(SkipReason::DuplicateDomain), 2);

    // The first sighting is the one recorded
    let mut reader = csv::Reader::from_path(&report.discovery_path).unwrap();
    let first = reader.records().next().unwrap().unwrap();
    assert_eq!(&first[3], "https://shop-a.ch/cart");
    assert_eq!(&first[8], "true");

    let discovery = &report.index.discovery;
    assert_eq!(discovery.per_tld.get("ch"), Some(&3));
    assert_eq!(discovery.ecommerce, 3);
    assert!(discovery.cms_hints.is_empty());
}

#[tokio::test]
async fn test_failing_page_abandons_only_its_shard() {
    let server = start_index("ch", 3).await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string(page_body(&["https://shop-a.ch/"])),
    )
    .await;
    // One try plus one retry, then the shard is given up
    Mock::given(method("GET"))
        .and(path(CDX_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CDX_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body(&["https://shop-z.ch/"])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "ch", dir.path());
    let report = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.index.shards_abandoned, 1);
    assert_eq!(report.stats.get_error_count(ErrorType::IndexShardAbandoned), 1);
    assert_eq!(report.stats.get_error_count(ErrorType::IndexPageFetchError), 1);
    assert_eq!(report.stats.get_info_count(InfoType::IndexPageRetried), 1);
    assert_eq!(discovered_domains(&report.discovery_path), vec!["shop-a.ch"]);
}

#[tokio::test]
async fn test_malformed_lines_and_missing_pages_are_skipped() {
    let server = start_index("ch", 2).await;
    let body = format!(
        "{}\nnot json at all\n{{\"url\": \"https://shop-b.ch/\", \"timestamp\": \"bad\"}}\n\n{}\n",
        cdx_line("https://shop-a.ch/"),
        cdx_line("https://shop-c.ch/"),
    );
    mount_page(&server, 0, ResponseTemplate::new(200).set_body_string(body)).await;
    mount_page(&server, 1, ResponseTemplate::new(404)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "ch", dir.path());
    let report = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(
        discovered_domains(&report.discovery_path),
        vec!["shop-a.ch", "shop-c.ch"]
    );
    assert_eq!(report.stats.get_skip_count(SkipReason::MalformedRecord), 2);
    assert_eq!(report.stats.get_info_count(InfoType::IndexPageEmpty), 1);
    assert_eq!(report.index.shards_abandoned, 0);
}

#[tokio::test]
async fn test_filters_apply_before_admission() {
    let server = start_index("ch", 1).await;
    let mut body = page_body(&[
        "https://shop-a.ch/",
        "https://example.ch/",
        "https://shop-a.de/",
    ]);
    body.push_str(
        &serde_json::json!({
            "url": "https://shop-b.ch/image.png",
            "timestamp": "20240301120000",
            "mime": "image/png",
            "status": "200",
        })
        .to_string(),
    );
    body.push('\n');
    body.push_str(
        &serde_json::json!({
            "url": "https://shop-c.ch/",
            "timestamp": "20240301120000",
            "mime": "text/html",
            "status": "301",
        })
        .to_string(),
    );
    mount_page(&server, 0, ResponseTemplate::new(200).set_body_string(body)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "ch", dir.path());
    let report = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(discovered_domains(&report.discovery_path), vec!["shop-a.ch"]);
    assert_eq!(report.stats.get_skip_count(SkipReason::BadDomainPattern), 1);
    assert_eq!(report.stats.get_skip_count(SkipReason::OutsideTld), 1);
    assert_eq!(report.stats.get_skip_count(SkipReason::MimeFiltered), 1);
    assert_eq!(report.stats.get_skip_count(SkipReason::StatusFiltered), 1);
}

#[tokio::test]
async fn test_limit_caps_domains_per_tld() {
    let server = start_index("ch", 1).await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string(page_body(&[
            "https://shop-a.ch/",
            "https://shop-b.ch/",
            "https://shop-c.ch/",
            "https://shop-d.ch/",
        ])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "ch", dir.path());
    config.limit = 2;
    let report = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.index.domains_admitted, 2);
    assert_eq!(
        discovered_domains(&report.discovery_path),
        vec!["shop-a.ch", "shop-b.ch"]
    );
    assert_eq!(report.stats.get_skip_count(SkipReason::TldLimitReached), 2);
}

#[tokio::test]
async fn test_min_occurrences_admits_repeated_domains() {
    let server = start_index("ch", 1).await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string(page_body(&[
            "https://shop-a.ch/first",
            "https://shop-b.ch/",
            "https://shop-a.ch/second?id_product=3",
        ])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "ch", dir.path());
    config.filters.min_occurrences = 2;
    let report = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(discovered_domains(&report.discovery_path), vec!["shop-a.ch"]);
    assert_eq!(report.stats.get_info_count(InfoType::BelowMinOccurrences), 1);
    let mut reader = csv::Reader::from_path(&report.discovery_path).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[3], "https://shop-a.ch/first");
    // Platform hint comes from the later sighting that carried one
    assert_eq!(&row[9], "PrestaShop");
    assert_eq!(report.index.discovery.cms_hints.get("PrestaShop"), Some(&1));
}

#[tokio::test]
async fn test_no_pages_is_no_index_found() {
    let server = start_index("ch", 0).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "ch", dir.path());

    let err = run_crawl(config, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NoIndexFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_crawl_id_is_config_error() {
    let server = start_index("ch", 1).await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "ch", dir.path());
    config.index.crawls = vec!["CC-MAIN-1999-01".to_string()];

    let err = run_crawl(config, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::UnknownCrawl(_))
    ));
}

#[tokio::test]
async fn test_invalid_tld_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, "not a tld", dir.path());

    let err = run_crawl(config, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidTld(_))
    ));
}

#[tokio::test]
async fn test_list_crawls() {
    let server = start_index("ch", 1).await;
    let settings = IndexSettings {
        server: server.uri(),
        ..Default::default()
    };
    let collections = list_crawls(&settings).await.unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].id, COLLECTION);
    assert!(collections[0].cdx_api.ends_with(CDX_PATH));
}

#[tokio::test]
async fn test_crawl_with_live_check_writes_one_verdict_per_domain() {
    // `.invalid` never resolves, so every probe ends unreachable
    let server = start_index("invalid", 1).await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string(page_body(&[
            "https://shop-a.invalid/",
            "https://shop-b.invalid/",
            "https://shop-a.invalid/again",
        ])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, "invalid", dir.path());
    config.live_check = true;
    config.live_threads = 4;
    config.probe = ProbeSettings {
        timeout: Duration::from_secs(2),
        retries: 0,
        ..Default::default()
    };

    let report = run_crawl(config, CancellationToken::new()).await.unwrap();
    let live = report.live.expect("live detection should have run");
    assert_eq!(live.probed, 2);
    assert_eq!(live.unreachable, 2);

    let detection_path = report.detection_path.expect("detection file path");
    let mut domains = discovered_domains(&detection_path);
    domains.sort();
    assert_eq!(domains, vec!["shop-a.invalid", "shop-b.invalid"]);
}
