//! End-to-end flow: fetch an archive from a mock HTTP source, verify and
//! extract it, activate it, and load it back through the local file server.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use webview_devserver::{Config, DevServer, Error, MemoryTargetStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build an in-memory zip archive from (name, content) pairs
fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn test_devserver(temp: &TempDir) -> DevServer {
    let config = Config {
        assets_dir: temp.path().join("assets"),
        temp_dir: temp.path().join("tmp"),
        port: 0,
        download_timeout_secs: 10,
    };
    DevServer::with_target_store(config, Arc::new(MemoryTargetStore::default())).unwrap()
}

/// Mount a GET mock serving `body` at `archive_path` and return the full URL
async fn mount_archive(mock_server: &MockServer, archive_path: &str, body: Vec<u8>) -> String {
    Mock::given(method("GET"))
        .and(path(archive_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(mock_server)
        .await;
    format!("{}{}", mock_server.uri(), archive_path)
}

#[tokio::test]
async fn download_apply_and_serve_round_trip() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    let archive = zip_bytes(&[
        ("index.html", b"<h1>v7</h1>".as_slice()),
        ("js/app.js", b"boot()".as_slice()),
    ]);
    let checksum = sha256_hex(&archive);
    let url = mount_archive(&mock_server, "/builds/web-v7.zip", archive).await;

    devserver
        .download_asset(&url, false, Some(&checksum))
        .await
        .unwrap();
    assert_eq!(devserver.list_assets().unwrap(), vec!["web-v7"]);

    let serve_url = devserver.apply_asset("web-v7", false).await.unwrap();

    let body = reqwest::get(format!("{}/", serve_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "<h1>v7</h1>");

    let response = reqwest::get(format!("{}/js/app.js", serve_url)).await.unwrap();
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/javascript"
    );
    assert_eq!(response.text().await.unwrap(), "boot()");

    devserver.clear_server().await;
}

#[tokio::test]
async fn uppercase_checksum_is_accepted() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    let archive = zip_bytes(&[("index.html", b"<html>".as_slice())]);
    let checksum = sha256_hex(&archive).to_uppercase();
    let url = mount_archive(&mock_server, "/bundle.zip", archive).await;

    devserver
        .download_asset(&url, false, Some(&checksum))
        .await
        .unwrap();
    assert_eq!(devserver.list_assets().unwrap(), vec!["bundle"]);
}

#[tokio::test]
async fn checksum_mismatch_leaves_no_trace() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    let archive = zip_bytes(&[("index.html", b"<html>".as_slice())]);
    let mut checksum = sha256_hex(&archive);
    // Flip one hex digit.
    let flipped = if checksum.ends_with('0') { '1' } else { '0' };
    checksum.pop();
    checksum.push(flipped);
    let url = mount_archive(&mock_server, "/bundle.zip", archive).await;

    let err = devserver
        .download_asset(&url, false, Some(&checksum))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));

    // No asset installed, no temporary file left behind.
    assert!(devserver.list_assets().unwrap().is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("tmp"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn source_error_status_fails_download() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = devserver
        .download_asset(&format!("{}/gone.zip", mock_server.uri()), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    assert!(devserver.list_assets().unwrap().is_empty());
}

#[tokio::test]
async fn existing_asset_without_overwrite_is_untouched() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    let archive = zip_bytes(&[("fresh.txt", b"fresh".as_slice())]);
    let url = mount_archive(&mock_server, "/bundle.zip", archive).await;

    // Pre-existing asset under the same derived name.
    let existing = temp.path().join("assets/bundle");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("marker.txt"), b"original").unwrap();

    devserver.download_asset(&url, false, None).await.unwrap();

    assert_eq!(
        std::fs::read(existing.join("marker.txt")).unwrap(),
        b"original"
    );
    assert!(!existing.join("fresh.txt").exists());
}

#[tokio::test]
async fn overwrite_fully_replaces_prior_contents() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);
    let mock_server = MockServer::start().await;

    let archive = zip_bytes(&[("index.html", b"<new>".as_slice())]);
    let url = mount_archive(&mock_server, "/bundle.zip", archive).await;

    let existing = temp.path().join("assets/bundle");
    std::fs::create_dir_all(existing.join("old")).unwrap();
    std::fs::write(existing.join("old/stale.js"), b"stale").unwrap();

    devserver.download_asset(&url, true, None).await.unwrap();

    assert!(!existing.join("old").exists());
    assert_eq!(std::fs::read(existing.join("index.html")).unwrap(), b"<new>");
}

#[tokio::test]
async fn traversal_requests_are_forbidden_over_tcp() {
    let temp = TempDir::new().unwrap();
    let devserver = test_devserver(&temp);

    let asset_dir = temp.path().join("assets/site");
    std::fs::create_dir_all(&asset_dir).unwrap();
    std::fs::write(asset_dir.join("index.html"), b"<html>").unwrap();
    // Bait outside the served root.
    std::fs::write(temp.path().join("assets/secret.txt"), b"secret").unwrap();

    let serve_url = devserver.apply_asset("site", false).await.unwrap();

    // reqwest normalizes dot-segments, so drive the raw request ourselves.
    let addr = devserver.server_addr().await.unwrap();
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(
        &mut stream,
        b"GET /../secret.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await
    .unwrap();
    let mut response = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 403"), "got: {}", response);
    assert!(!response.contains("secret"));

    // Normal requests still work on the same listener.
    let body = reqwest::get(format!("{}/index.html", serve_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "<html>");

    devserver.clear_server().await;
}
