use tokio::sync::mpsc;

/// Progress of one download attempt. Values are monotonically non-decreasing
/// within a single attempt; `total_bytes` is zero when the server did not
/// declare a length and the resource size is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<DownloadProgress>;

impl DownloadProgress {
    pub fn new(downloaded_bytes: u64, total_bytes: u64) -> Self {
        Self {
            downloaded_bytes,
            total_bytes,
        }
    }

    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }
}

impl std::fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {}",
            Self::format_bytes(self.downloaded_bytes),
            Self::format_bytes(self.total_bytes)
        )
    }
}
