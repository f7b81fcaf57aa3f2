use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DownloadConfig;
use crate::download::ResourceDownloader;
use crate::resource::RemoteResource;

/// Boundary consumer of the download subsystem. An update strategy decides
/// which resources it needs; this fetches them one after another, passing a
/// single cancellation token through the whole operation.
pub struct AppUpdater {
    config: DownloadConfig,
    use_torrents: bool,
}

impl AppUpdater {
    pub fn new(config: DownloadConfig, use_torrents: bool) -> Self {
        Self {
            config,
            use_torrents,
        }
    }

    pub async fn fetch(
        &self,
        resources: Vec<(RemoteResource, PathBuf)>,
        token: &CancellationToken,
    ) -> Result<()> {
        for (resource, destination) in resources {
            let (downloader, mut progress) = ResourceDownloader::with_config(
                destination.clone(),
                resource,
                self.use_torrents,
                self.config.clone(),
            )
            .context("invalid download request")?;

            let reporter = tokio::spawn(async move {
                while let Some(update) = progress.recv().await {
                    info!(%update, "download progress");
                }
            });

            let result = downloader.download(token).await;
            drop(downloader);
            let _ = reporter.await;

            result.with_context(|| {
                format!("failed to download to {}", destination.display())
            })?;
        }

        Ok(())
    }
}
