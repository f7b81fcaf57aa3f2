pub mod config;
pub mod download;
pub mod error;
pub mod resource;
pub mod torrent;
pub mod updater;

// Re-export commonly used types for easier access in tests and hosts
pub use config::DownloadConfig;
pub use download::{
    ChunkVerifier, ChunkedHttpTransport, DownloadProgress, DownloaderState, HttpTransport,
    ProgressReceiver, ProgressSender, ResourceDownloader, Transport,
};
pub use error::DownloadError;
pub use resource::{ChunksData, RemoteResource};
pub use torrent::{RESULT_SENTINEL, TorrentClientProcess, TorrentTransport};
pub use updater::AppUpdater;
