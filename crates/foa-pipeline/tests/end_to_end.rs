use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use foa_adapters::{ExtractError, SourceKind, SourceRegistry};
use foa_export::{ExportFormat, CSV_FILE_NAME, JSON_FILE_NAME};
use foa_fetch::{BackoffPolicy, FetchError, NoopRenderer};
use foa_pipeline::{Pipeline, PipelineConfig};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

fn local_pipeline(out_dir: PathBuf, format: ExportFormat, nlp_enabled: bool) -> Pipeline {
    let config = PipelineConfig {
        out_dir,
        format,
        nlp_enabled,
        render_enabled: false,
        backoff: BackoffPolicy {
            base_delay: Duration::from_millis(5),
            ..BackoffPolicy::default()
        },
        ..PipelineConfig::default()
    };
    let mut registry = SourceRegistry::empty();
    registry
        .register("127.0.0.1", SourceKind::GrantsGov)
        .expect("register mock host");
    Pipeline::with_renderer(config, Arc::new(NoopRenderer))
        .expect("pipeline")
        .with_registry(registry)
}

async fn serve_detail() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-results-detail/350000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("grants-gov/detail.html")))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn run_once_extracts_tags_and_exports_both_formats() {
    let server = serve_detail().await;
    let out = tempdir().expect("tempdir");
    let pipeline = local_pipeline(out.path().join("out"), ExportFormat::All, true);

    let url = format!("{}/search-results-detail/350000", server.uri());
    let summary = pipeline.run_once(&url).await.expect("run");

    let opp = &summary.opportunity;
    assert_eq!(opp.foa_id, "PD-24-127Y");
    assert_eq!(opp.close_date.as_deref(), Some("2024-04-30"));
    assert_eq!(opp.tags.first().map(String::as_str), Some("Artificial Intelligence"));
    assert_eq!(
        summary.exported,
        vec![
            out.path().join("out").join(JSON_FILE_NAME),
            out.path().join("out").join(CSV_FILE_NAME)
        ]
    );

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&summary.exported[0]).expect("read json"),
    )
    .expect("parse json");
    assert_eq!(json["foa_id"], "PD-24-127Y");
    assert_eq!(json["source_url"], url.as_str());
    assert!(json["tags"].is_array());
}

#[tokio::test]
async fn keyword_only_run_writes_json() {
    let server = serve_detail().await;
    let out = tempdir().expect("tempdir");
    let pipeline = local_pipeline(out.path().to_path_buf(), ExportFormat::Json, false);

    let url = format!("{}/search-results-detail/350000", server.uri());
    let summary = pipeline.run_once(&url).await.expect("run");

    // Title and description hit only the AI keyword list.
    assert_eq!(summary.opportunity.tags, vec!["Artificial Intelligence"]);
    assert_eq!(summary.exported, vec![out.path().join(JSON_FILE_NAME)]);
    assert!(!out.path().join(CSV_FILE_NAME).exists());
}

#[tokio::test]
async fn unsupported_host_keeps_its_error_kind() {
    let out = tempdir().expect("tempdir");
    let pipeline = local_pipeline(out.path().to_path_buf(), ExportFormat::All, true);

    let err = pipeline
        .run_once("https://www.example.com/opportunity/1")
        .await
        .expect_err("unsupported");
    let extract = err.downcast_ref::<ExtractError>().expect("extract error");
    assert!(extract.is_input_error());
    assert!(!out.path().join(JSON_FILE_NAME).exists());
}

#[tokio::test]
async fn exhausted_retries_surface_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let out = tempdir().expect("tempdir");
    let pipeline = local_pipeline(out.path().to_path_buf(), ExportFormat::All, true);

    let url = format!("{}/search-results-detail/350000", server.uri());
    let err = pipeline.run_once(&url).await.expect_err("server down");
    match err.downcast_ref::<ExtractError>() {
        Some(ExtractError::Fetch(FetchError::ConnectionFailure { attempts, .. })) => {
            assert_eq!(*attempts, 3)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.received_requests().await.expect("requests").len(), 3);
}
