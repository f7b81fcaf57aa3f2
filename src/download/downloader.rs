use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Transport;
use super::chunked::ChunkedHttpTransport;
use super::http::HttpTransport;
use super::progress::{ProgressReceiver, ProgressSender};
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::resource::RemoteResource;
use crate::torrent::TorrentTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DownloaderState {
    Idle = 0,
    Started = 1,
    Completed = 2,
    Failed = 3,
}

/// Orchestrates one download of one resource: tries the torrent transport if
/// enabled (its failures are swallowed since HTTP remains), then exactly one
/// of the HTTP transports depending on chunk metadata, with no further
/// fallback. Single-use: `download` may be called once per instance.
pub struct ResourceDownloader {
    destination: PathBuf,
    resource: RemoteResource,
    use_torrents: bool,
    config: DownloadConfig,
    state: AtomicU8,
    progress: ProgressSender,
}

impl ResourceDownloader {
    /// Validates the destination and resource eagerly, before any I/O. The
    /// receiver yields the progress of whichever transport is active.
    pub fn new(
        destination: impl Into<PathBuf>,
        resource: RemoteResource,
        use_torrents: bool,
    ) -> Result<(Self, ProgressReceiver), DownloadError> {
        Self::with_config(destination, resource, use_torrents, DownloadConfig::default())
    }

    pub fn with_config(
        destination: impl Into<PathBuf>,
        resource: RemoteResource,
        use_torrents: bool,
        config: DownloadConfig,
    ) -> Result<(Self, ProgressReceiver), DownloadError> {
        let destination = destination.into();

        if !destination.parent().is_some_and(|p| p.is_dir()) {
            return Err(DownloadError::ArgumentInvalid(format!(
                "parent directory of {} does not exist",
                destination.display()
            )));
        }
        resource.validate()?;

        let (progress, receiver) = mpsc::unbounded_channel();
        Ok((
            Self {
                destination,
                resource,
                use_torrents,
                config,
                state: AtomicU8::new(DownloaderState::Idle as u8),
                progress,
            },
            receiver,
        ))
    }

    pub fn state(&self) -> DownloaderState {
        match self.state.load(Ordering::SeqCst) {
            0 => DownloaderState::Idle,
            1 => DownloaderState::Started,
            2 => DownloaderState::Completed,
            _ => DownloaderState::Failed,
        }
    }

    /// Runs the fallback policy to a single terminal outcome. A second call
    /// on the same instance fails with `ReuseViolation` no matter how the
    /// first one ended.
    pub async fn download(&self, token: &CancellationToken) -> Result<(), DownloadError> {
        if self
            .state
            .compare_exchange(
                DownloaderState::Idle as u8,
                DownloaderState::Started as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(DownloadError::ReuseViolation);
        }

        let result = self.run(token).await;

        let terminal = if result.is_ok() {
            DownloaderState::Completed
        } else {
            DownloaderState::Failed
        };
        self.state.store(terminal as u8, Ordering::SeqCst);

        result
    }

    async fn run(&self, token: &CancellationToken) -> Result<(), DownloadError> {
        info!(
            url = %self.resource.url,
            destination = %self.destination.display(),
            "starting download"
        );

        if self.use_torrents {
            let transport = TorrentTransport::new(self.config.clone(), self.progress.clone());
            match transport
                .download(&self.destination, &self.resource, token)
                .await
            {
                Ok(()) => return Ok(()),
                // Cancellation means the caller no longer wants the resource,
                // not that another transport should be tried.
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!("torrent download failed, falling back to http: {e}"),
            }
        }

        let transport: Box<dyn Transport> = if self.resource.has_chunks() {
            Box::new(ChunkedHttpTransport::new(
                &self.config,
                self.progress.clone(),
            )?)
        } else {
            Box::new(HttpTransport::new(&self.config, self.progress.clone())?)
        };

        transport
            .download(&self.destination, &self.resource, token)
            .await
    }
}
