//! Integration tests for the generic and Dropbox fetchers.
//!
//! These tests verify the full download flow with mock HTTP servers.

use assetgrab::download::{DownloadError, DropboxFetcher, GenericFetcher};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_generic_download_mirrors_host_and_path() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let content = b"%PDF-1.4 fake report";

    Mock::given(method("GET"))
        .and(path("/docs/annual/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    let fetcher = GenericFetcher::new();
    let url = format!("{}/docs/annual/report.pdf", mock_server.uri());
    let result = fetcher.fetch(&url, temp_dir.path()).await;

    let file_path = result.expect("download should succeed");

    // The mirror directory is host_port (colon is not a path separator).
    let addr = mock_server.address();
    let expected = temp_dir
        .path()
        .join(format!("{}_{}", addr.ip(), addr.port()))
        .join("docs/annual/report.pdf");
    assert_eq!(file_path, expected);

    let downloaded = std::fs::read(&file_path).expect("should read file");
    assert_eq!(downloaded, content);
}

#[tokio::test]
async fn test_generic_download_overwrites_existing_file() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new content".to_vec()))
        .mount(&mock_server)
        .await;

    let fetcher = GenericFetcher::new();
    let url = format!("{}/report.pdf", mock_server.uri());

    // Pre-create the target with stale content.
    let addr = mock_server.address();
    let target_dir = temp_dir.path().join(format!("{}_{}", addr.ip(), addr.port()));
    std::fs::create_dir_all(&target_dir).expect("create target dir");
    std::fs::write(target_dir.join("report.pdf"), b"stale").expect("write stale file");

    let file_path = fetcher
        .fetch(&url, temp_dir.path())
        .await
        .expect("download should succeed");

    let downloaded = std::fs::read(&file_path).expect("should read file");
    assert_eq!(downloaded, b"new content");
}

#[tokio::test]
async fn test_generic_download_404_is_terminal() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = GenericFetcher::new();
    let url = format!("{}/missing.pdf", mock_server.uri());
    let result = fetcher.fetch(&url, temp_dir.path()).await;

    match result {
        Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus(404), got: {other:?}"),
    }
}

#[tokio::test]
async fn test_dropbox_download_forces_dl_1_and_uses_header_filename() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // Only the rewritten dl=1 variant is mounted: a request with the
    // original dl=0 would not match and the test would fail.
    Mock::given(method("GET"))
        .and(path("/s/xyz/report.pdf"))
        .and(query_param("dl", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="report.pdf""#)
                .set_body_bytes(b"PDF bytes".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let fetcher = DropboxFetcher::new();
    let url = format!("{}/s/xyz/report.pdf?dl=0", mock_server.uri());
    let file_path = fetcher
        .fetch(&url, temp_dir.path())
        .await
        .expect("download should succeed");

    assert_eq!(file_path, temp_dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&file_path).expect("read"), b"PDF bytes");
}

#[tokio::test]
async fn test_dropbox_download_preserves_other_query_params() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/scl/fi/abc/report.pdf"))
        .and(query_param("rlkey", "k123"))
        .and(query_param("dl", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let fetcher = DropboxFetcher::new();
    let url = format!("{}/scl/fi/abc/report.pdf?rlkey=k123&dl=0", mock_server.uri());
    let result = fetcher.fetch(&url, temp_dir.path()).await;

    assert!(result.is_ok(), "rlkey must survive the rewrite: {result:?}");
}

#[tokio::test]
async fn test_dropbox_download_falls_back_to_url_filename() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/s/xyz/minutes.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let fetcher = DropboxFetcher::new();
    let url = format!("{}/s/xyz/minutes.pdf?dl=0", mock_server.uri());
    let file_path = fetcher
        .fetch(&url, temp_dir.path())
        .await
        .expect("download should succeed");

    assert_eq!(file_path, temp_dir.path().join("minutes.pdf"));
}

#[tokio::test]
async fn test_dropbox_download_default_filename_when_nothing_resolves() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let fetcher = DropboxFetcher::new();
    let url = format!("{}/?dl=0", mock_server.uri());
    let file_path = fetcher
        .fetch(&url, temp_dir.path())
        .await
        .expect("download should succeed");

    assert_eq!(file_path, temp_dir.path().join("dropbox_download"));
}

#[tokio::test]
async fn test_dropbox_download_non_2xx_is_terminal() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/s/gone/file.pdf"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let fetcher = DropboxFetcher::new();
    let url = format!("{}/s/gone/file.pdf?dl=0", mock_server.uri());
    let result = fetcher.fetch(&url, temp_dir.path()).await;

    match result {
        Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 410),
        other => panic!("expected HttpStatus(410), got: {other:?}"),
    }
}
