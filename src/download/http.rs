use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::progress::{DownloadProgress, ProgressSender};
use super::Transport;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::resource::RemoteResource;

const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Whole-file streaming transport, the fallback of last resort for resources
/// without chunk metadata. Verifies nothing beyond the total byte count; a
/// partial file left behind by cancellation or failure is never valid and is
/// overwritten by the next attempt.
pub struct HttpTransport {
    client: Client,
    progress: ProgressSender,
}

impl HttpTransport {
    pub fn new(config: &DownloadConfig, progress: ProgressSender) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, progress })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(
        &self,
        destination: &Path,
        resource: &RemoteResource,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        debug!(url = %resource.url, "downloading with plain http");

        let response = self.client.get(&resource.url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Transport(format!(
                "http request failed with status {}",
                response.status()
            )));
        }

        let total_bytes = if resource.size > 0 {
            resource.size
        } else {
            response.content_length().unwrap_or(0)
        };

        let mut file = File::create(destination)?;
        let mut downloaded: u64 = 0;
        let mut last_progress_update = Instant::now();

        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => match next {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;

            if last_progress_update.elapsed() >= PROGRESS_UPDATE_INTERVAL {
                let _ = self
                    .progress
                    .send(DownloadProgress::new(downloaded, total_bytes));
                last_progress_update = Instant::now();
            }
        }

        file.flush()?;

        if resource.size > 0 && downloaded != resource.size {
            return Err(DownloadError::Transport(format!(
                "transfer ended after {} of {} bytes",
                downloaded, resource.size
            )));
        }

        let _ = self
            .progress
            .send(DownloadProgress::new(downloaded, total_bytes));
        Ok(())
    }
}
