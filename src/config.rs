use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the download subsystem. Loading this from a file is the host
/// application's concern; the defaults match the constants the transports were
/// written against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Connect/read timeout applied to both HTTP transports.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long the torrent transport waits for the client to acknowledge a
    /// single command.
    #[serde(default = "default_torrent_timeout_secs")]
    pub torrent_timeout_secs: u64,
    /// Interval between `status` polls while a torrent download is running.
    #[serde(default = "default_torrent_poll_interval_ms")]
    pub torrent_poll_interval_ms: u64,
    /// Root directory containing the `torrent-client/<platform>/` helper binaries.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_torrent_timeout_secs() -> u64 {
    10
}
fn default_torrent_poll_interval_ms() -> u64 {
    1000
}
fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}
fn default_user_agent() -> String {
    format!("packfetch/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            torrent_timeout_secs: default_torrent_timeout_secs(),
            torrent_poll_interval_ms: default_torrent_poll_interval_ms(),
            assets_dir: default_assets_dir(),
            user_agent: default_user_agent(),
        }
    }
}

impl DownloadConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn torrent_timeout(&self) -> Duration {
        Duration::from_secs(self.torrent_timeout_secs)
    }

    pub fn torrent_poll_interval(&self) -> Duration {
        Duration::from_millis(self.torrent_poll_interval_ms)
    }
}
