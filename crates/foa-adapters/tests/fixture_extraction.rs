use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use foa_adapters::{ingest, ExtractError, GrantsGovAdapter, NsfAdapter, SourceAdapter, SourceRegistry};
use foa_fetch::{BackoffPolicy, HttpClientConfig, HttpFetcher, NoopRenderer, PageLoader};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

fn fixture(rel: &str) -> String {
    let path = workspace_root().join("fixtures").join(rel);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

fn static_loader() -> PageLoader {
    let http = HttpFetcher::new(HttpClientConfig {
        timeout: Duration::from_secs(5),
        user_agent: None,
        backoff: BackoffPolicy {
            base_delay: Duration::from_millis(5),
            ..BackoffPolicy::default()
        },
    })
    .expect("client");
    PageLoader::new(Arc::new(NoopRenderer), http, Duration::from_millis(10))
}

#[test]
fn grants_gov_detail_matches_snapshot() {
    let html = fixture("grants-gov/detail.html");
    let url = "https://www.grants.gov/search-results-detail/350000";
    let opp = GrantsGovAdapter.parse_html(&html, url, "350000");

    let actual = serde_json::to_value(&opp).expect("serialize");
    let expected: serde_json::Value =
        serde_json::from_str(&fixture("grants-gov/snapshot.json")).expect("parse snapshot");
    assert_eq!(actual, expected);
}

#[test]
fn nsf_award_page_fields() {
    let html = fixture("nsf/award.html");
    let url = "https://www.nsf.gov/awardsearch/showAward?AWD_ID=2112345";
    let id = NsfAdapter.resolve_identifier(url).unwrap();
    let opp = NsfAdapter.parse_html(&html, url, &id);

    assert_eq!(opp.foa_id, "NSF-2112345");
    assert_eq!(
        opp.title,
        "Collaborative Research: Soil Carbon Dynamics under Changing Climate"
    );
    assert_eq!(opp.agency, "National Science Foundation");
    assert_eq!(opp.open_date.as_deref(), Some("2021-09-01"));
    assert_eq!(opp.close_date.as_deref(), Some("2024-08-31"));
    assert_eq!(opp.eligibility, "");
    assert_eq!(opp.award_ceiling.as_deref(), Some("$349,998.00"));
    assert_eq!(
        opp.description,
        "This project studies soil carbon, crop rotation and climate resilience in agricultural landscapes."
    );
}

#[tokio::test]
async fn grants_gov_extract_falls_back_to_static_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-results-detail/350000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("grants-gov/detail.html")))
        .mount(&server)
        .await;

    let url = format!("{}/search-results-detail/350000", server.uri());
    let opp = GrantsGovAdapter
        .extract(&static_loader(), &url)
        .await
        .expect("extract via fallback");

    assert_eq!(opp.foa_id, "PD-24-127Y");
    assert_eq!(opp.title, "Artificial Intelligence Research Institutes");
    assert_eq!(opp.source_url, url);
}

#[tokio::test]
async fn nsf_extract_falls_back_to_static_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/awardsearch/showAward"))
        .and(query_param("AWD_ID", "2112345"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("nsf/award.html")))
        .mount(&server)
        .await;

    let url = format!("{}/awardsearch/showAward?AWD_ID=2112345", server.uri());
    let opp = NsfAdapter
        .extract(&static_loader(), &url)
        .await
        .expect("extract via fallback");
    assert_eq!(opp.foa_id, "NSF-2112345");
    assert_eq!(opp.close_date.as_deref(), Some("2024-08-31"));
}

#[tokio::test]
async fn identifier_is_checked_before_any_fetch() {
    let server = MockServer::start().await;
    let url = format!("{}/search-grants", server.uri());
    let err = GrantsGovAdapter
        .extract(&static_loader(), &url)
        .await
        .expect_err("no identifier");
    assert!(matches!(err, ExtractError::IdentifierNotFound { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_fallback_surfaces_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = format!("{}/search-results-detail/350000", server.uri());
    let err = GrantsGovAdapter
        .extract(&static_loader(), &url)
        .await
        .expect_err("server keeps failing");
    assert!(matches!(err, ExtractError::Fetch(_)));
    assert!(!err.is_input_error());
    assert!(err.to_string().contains("after 3 attempts"));
}

#[tokio::test]
async fn ingest_rejects_unsupported_hosts_without_fetching() {
    let err = ingest(
        &SourceRegistry::default(),
        &static_loader(),
        "https://www.example.com/opportunity/123",
    )
    .await
    .expect_err("unsupported");
    assert!(matches!(err, ExtractError::UnsupportedSource { .. }));
}
