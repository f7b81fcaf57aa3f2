use packfetch::{
    ChunkVerifier, DownloadConfig, DownloadError, DownloaderState, RemoteResource,
    ResourceDownloader,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTENT: &[u8] = b"0123456789";
const CHUNK_SIZE: u64 = 4;

fn chunked_resource(url: String) -> RemoteResource {
    let hashes = CONTENT
        .chunks(CHUNK_SIZE as usize)
        .map(ChunkVerifier::hash_chunk)
        .collect();
    RemoteResource::new(url, CONTENT.len() as u64).with_chunks(CHUNK_SIZE, hashes)
}

async fn mount_range(server: &MockServer, range: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path("/pack"))
        .and(header("Range", range))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn plain_http_download_writes_whole_file() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CONTENT))
        .mount(&server)
        .await;

    let destination = dir.path().join("pack");
    let resource = RemoteResource::new(format!("{}/pack", server.uri()), CONTENT.len() as u64);

    let (downloader, mut progress) =
        ResourceDownloader::new(&destination, resource, false).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();
    assert_eq!(downloader.state(), DownloaderState::Completed);

    assert_eq!(std::fs::read(&destination).unwrap(), CONTENT);

    drop(downloader);
    let mut last = None;
    while let Some(update) = progress.recv().await {
        last = Some(update);
    }
    assert_eq!(last.unwrap().downloaded_bytes, CONTENT.len() as u64);
}

#[tokio::test]
async fn chunked_download_fetches_and_verifies_every_chunk() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_range(&server, "bytes=0-3", &CONTENT[0..4]).await;
    mount_range(&server, "bytes=4-7", &CONTENT[4..8]).await;
    mount_range(&server, "bytes=8-9", &CONTENT[8..10]).await;

    let destination = dir.path().join("pack");
    let resource = chunked_resource(format!("{}/pack", server.uri()));

    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), CONTENT);
}

#[tokio::test]
async fn resume_skips_already_verified_chunks() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    // Only the tail ranges are mounted; a request for chunk 0 would 404 and
    // fail the download.
    mount_range(&server, "bytes=4-7", &CONTENT[4..8]).await;
    mount_range(&server, "bytes=8-9", &CONTENT[8..10]).await;

    let destination = dir.path().join("pack");
    std::fs::write(&destination, &CONTENT[0..4]).unwrap();

    let resource = chunked_resource(format!("{}/pack", server.uri()));
    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), CONTENT);
}

#[tokio::test]
async fn checksum_mismatch_aborts_and_keeps_verified_prefix() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_range(&server, "bytes=0-3", &CONTENT[0..4]).await;
    mount_range(&server, "bytes=4-7", b"XXXX").await;

    let destination = dir.path().join("pack");
    let resource = chunked_resource(format!("{}/pack", server.uri()));

    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    let result = downloader.download(&CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(DownloadError::ChecksumMismatch { chunk: 1 })
    ));
    assert_eq!(downloader.state(), DownloaderState::Failed);
    // the file stays valid up to the last verified chunk boundary
    assert_eq!(std::fs::read(&destination).unwrap(), &CONTENT[0..4]);
}

#[tokio::test]
async fn chunked_progress_is_monotonic() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_range(&server, "bytes=0-3", &CONTENT[0..4]).await;
    mount_range(&server, "bytes=4-7", &CONTENT[4..8]).await;
    mount_range(&server, "bytes=8-9", &CONTENT[8..10]).await;

    let destination = dir.path().join("pack");
    let resource = chunked_resource(format!("{}/pack", server.uri()));

    let (downloader, mut progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();
    drop(downloader);

    let mut previous = 0;
    let mut updates = 0;
    while let Some(update) = progress.recv().await {
        assert!(update.downloaded_bytes >= previous);
        assert_eq!(update.total_bytes, CONTENT.len() as u64);
        previous = update.downloaded_bytes;
        updates += 1;
    }
    assert_eq!(updates, 3);
    assert_eq!(previous, CONTENT.len() as u64);
}

#[tokio::test]
async fn second_download_call_fails_with_reuse_violation() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CONTENT))
        .mount(&server)
        .await;

    let destination = dir.path().join("pack");
    let resource = RemoteResource::new(format!("{}/pack", server.uri()), CONTENT.len() as u64);

    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();

    let second = downloader.download(&CancellationToken::new()).await;
    assert!(matches!(second, Err(DownloadError::ReuseViolation)));
}

#[tokio::test]
async fn reuse_violation_also_follows_a_failed_first_call() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pack");
    let resource = RemoteResource::new("http://localhost/pack".to_string(), 10);

    let token = CancellationToken::new();
    token.cancel();

    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    let first = downloader.download(&token).await;
    assert!(matches!(first, Err(DownloadError::Cancelled)));

    let second = downloader.download(&CancellationToken::new()).await;
    assert!(matches!(second, Err(DownloadError::ReuseViolation)));
}

#[tokio::test]
async fn cancelled_token_prevents_any_file_creation() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pack");
    let resource = RemoteResource::new("http://localhost/pack".to_string(), 10);

    let token = CancellationToken::new();
    token.cancel();

    let (downloader, _progress) = ResourceDownloader::new(&destination, resource, false).unwrap();
    let result = downloader.download(&token).await;

    assert!(matches!(result, Err(DownloadError::Cancelled)));
    assert!(!destination.exists());
}

#[tokio::test]
async fn torrent_failure_falls_back_to_http() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CONTENT))
        .mount(&server)
        .await;

    let destination = dir.path().join("pack");
    let resource = RemoteResource::new(format!("{}/pack", server.uri()), CONTENT.len() as u64)
        .with_torrent_url("http://localhost/pack.torrent");

    // no helper binary under this assets dir, so the torrent attempt fails
    let config = DownloadConfig {
        assets_dir: dir.path().join("no-assets"),
        ..DownloadConfig::default()
    };

    let (downloader, _progress) =
        ResourceDownloader::with_config(&destination, resource, true, config).unwrap();
    downloader.download(&CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), CONTENT);
}

#[tokio::test]
async fn missing_parent_directory_fails_construction() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("no-such-dir").join("pack");
    let resource = RemoteResource::new("http://localhost/pack".to_string(), 10);

    let result = ResourceDownloader::new(&destination, resource, false);
    assert!(matches!(result, Err(DownloadError::ArgumentInvalid(_))));
}

#[tokio::test]
async fn inconsistent_chunk_metadata_fails_construction() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pack");
    let resource = RemoteResource::new("http://localhost/pack".to_string(), 10)
        .with_chunks(4, vec!["only-one-hash".to_string()]);

    let result = ResourceDownloader::new(&destination, resource, false);
    assert!(matches!(result, Err(DownloadError::ArgumentInvalid(_))));
}
