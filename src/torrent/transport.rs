use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::TorrentClientProcess;
use crate::config::DownloadConfig;
use crate::download::Transport;
use crate::download::progress::{DownloadProgress, ProgressSender};
use crate::error::DownloadError;
use crate::resource::RemoteResource;

/// Peer-to-peer transport driving the external torrent client. Either the
/// helper reports completion or the attempt failed; a partial torrent download
/// is never reported as success. Retrying is the orchestrator's job.
pub struct TorrentTransport {
    config: DownloadConfig,
    progress: ProgressSender,
}

impl TorrentTransport {
    pub fn new(config: DownloadConfig, progress: ProgressSender) -> Self {
        Self { config, progress }
    }

    async fn run(
        &self,
        client: &mut TorrentClientProcess,
        destination: &Path,
        resource: &RemoteResource,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let torrent_url = resource.torrent_url.as_deref().ok_or_else(|| {
            DownloadError::ArgumentInvalid("resource has no torrent url".to_string())
        })?;

        let command = format!(
            "add-torrent {}",
            json!({ "url": torrent_url, "destination": destination })
        );
        let reply = client
            .execute_command(&command, token, self.config.torrent_timeout())
            .await?;
        ensure_ok(&reply)?;

        loop {
            tokio::select! {
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
                _ = tokio::time::sleep(self.config.torrent_poll_interval()) => {}
            }

            let reply = client
                .execute_command("status", token, self.config.torrent_timeout())
                .await?;
            ensure_ok(&reply)?;
            let status = TorrentStatus::from_reply(&reply)?;

            if let Some(error) = status.error {
                return Err(DownloadError::Transport(format!(
                    "torrent client reported: {error}"
                )));
            }

            let _ = self
                .progress
                .send(DownloadProgress::new(status.downloaded, status.total));

            if status.is_finished {
                debug!("torrent client reported completion");
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Transport for TorrentTransport {
    async fn download(
        &self,
        destination: &Path,
        resource: &RemoteResource,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let mut client = TorrentClientProcess::launch(&self.config.assets_dir)?;
        let result = self.run(&mut client, destination, resource, token).await;

        if matches!(result, Err(DownloadError::Cancelled)) {
            // Ask the helper to stop before tearing it down. The caller's
            // token is already cancelled, so drive the command with a fresh
            // one and a short deadline.
            let stop_token = CancellationToken::new();
            if let Err(e) = client
                .execute_command("stop", &stop_token, Duration::from_secs(1))
                .await
            {
                debug!("stop command after cancellation failed: {e}");
            }
        }

        client.dispose().await;
        result
    }
}

struct TorrentStatus {
    downloaded: u64,
    total: u64,
    is_finished: bool,
    error: Option<String>,
}

impl TorrentStatus {
    fn from_reply(reply: &Value) -> Result<Self, DownloadError> {
        let data = reply
            .get("data")
            .ok_or_else(|| DownloadError::Protocol("status reply has no data field".to_string()))?;

        Ok(Self {
            downloaded: data.get("downloaded").and_then(Value::as_u64).unwrap_or(0),
            total: data.get("total").and_then(Value::as_u64).unwrap_or(0),
            is_finished: data
                .get("is-finished")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            error: data.get("error").and_then(Value::as_str).map(str::to_string),
        })
    }
}

fn ensure_ok(reply: &Value) -> Result<(), DownloadError> {
    match reply.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(()),
        Some(other) => Err(DownloadError::Protocol(format!(
            "client returned status {other:?}"
        ))),
        None => Err(DownloadError::Protocol(
            "client reply has no status field".to_string(),
        )),
    }
}
