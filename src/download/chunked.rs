use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::checksum::ChunkVerifier;
use super::progress::{DownloadProgress, ProgressSender};
use super::Transport;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::resource::RemoteResource;

/// Ranged, per-chunk-verified transport for resources that carry chunk
/// metadata. Chunks are fetched sequentially; an interrupted download resumes
/// from the last verified chunk of the existing destination file, so the file
/// on disk is always valid up to a chunk boundary.
pub struct ChunkedHttpTransport {
    client: Client,
    progress: ProgressSender,
}

impl ChunkedHttpTransport {
    pub fn new(config: &DownloadConfig, progress: ProgressSender) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, progress })
    }

    /// Fetches one `[start, end)` byte range, observing the token inside the
    /// body stream.
    async fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .header("Range", format!("bytes={}-{}", start, end - 1))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::Transport(format!(
                "range request failed with status {}",
                response.status()
            )));
        }

        let mut body = Vec::with_capacity((end - start) as usize);
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => match next {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };
            body.extend_from_slice(&chunk);
        }

        let expected = (end - start) as usize;
        if body.len() != expected {
            return Err(DownloadError::Transport(format!(
                "range [{}, {}) returned {} bytes, expected {}",
                start,
                end,
                body.len(),
                expected
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for ChunkedHttpTransport {
    async fn download(
        &self,
        destination: &Path,
        resource: &RemoteResource,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        if !resource.has_chunks() {
            return Err(DownloadError::ArgumentInvalid(
                "resource has no chunk metadata".to_string(),
            ));
        }

        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let verified = ChunkVerifier::verified_chunk_count(destination, resource).await?;
        if verified > 0 {
            info!(
                verified,
                total = resource.chunk_count(),
                "resuming from last verified chunk"
            );
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(destination)?;

        // Anything past the verified prefix is untrusted; drop it so the file
        // is valid up to a chunk boundary at all times.
        let resume_offset = verified as u64 * resource.chunks.chunk_size;
        file.set_len(resume_offset)?;
        file.seek(SeekFrom::Start(resume_offset))?;

        for index in verified..resource.chunk_count() {
            if token.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let (start, end) = resource.chunk_range(index);
            debug!(chunk = index, start, end, "fetching chunk");

            let body = self.fetch_range(&resource.url, start, end, token).await?;

            if !ChunkVerifier::chunk_matches(&body, &resource.chunks.hashes[index]) {
                // Abort the whole attempt rather than persist corrupt data;
                // the file keeps its verified prefix for a later resume.
                file.set_len(start)?;
                return Err(DownloadError::ChecksumMismatch { chunk: index });
            }

            file.write_all(&body)?;
            file.flush()?;

            let _ = self
                .progress
                .send(DownloadProgress::new(end, resource.size));
        }

        Ok(())
    }
}
