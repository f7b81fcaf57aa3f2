use thiserror::Error;

/// Terminal failure of a download attempt or of the orchestrator itself.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    #[error("download() called more than once on the same downloader")]
    ReuseViolation,

    #[error("platform is not supported by the torrent client")]
    UnsupportedPlatform,

    #[error("torrent client process has exited")]
    ProcessExited,

    #[error("malformed torrent client response: {0}")]
    Protocol(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("checksum mismatch in chunk {chunk}")]
    ChecksumMismatch { chunk: usize },

    #[error("download was cancelled")]
    Cancelled,

    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl DownloadError {
    /// Cancellation is never a fallback trigger; callers use this to tell it
    /// apart from failures that may be retried or swallowed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}
