pub mod checksum;
pub mod chunked;
pub mod downloader;
pub mod http;
pub mod progress;

pub use checksum::ChunkVerifier;
pub use chunked::ChunkedHttpTransport;
pub use downloader::{DownloaderState, ResourceDownloader};
pub use http::HttpTransport;
pub use progress::{DownloadProgress, ProgressReceiver, ProgressSender};

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;
use crate::resource::RemoteResource;

/// One strategy for acquiring a resource's bytes. Implementations own the
/// destination file exclusively for the duration of one call and release it on
/// every exit path; they observe the token at each blocking boundary and never
/// retry internally.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn download(
        &self,
        destination: &Path,
        resource: &RemoteResource,
        token: &CancellationToken,
    ) -> Result<(), DownloadError>;
}
