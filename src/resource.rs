use serde::{Deserialize, Serialize};

use crate::error::DownloadError;

/// Chunk metadata of a remote resource: fixed chunk size plus one lowercase
/// hex SHA-256 digest per chunk. An empty instance means the resource can only
/// be fetched whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunksData {
    #[serde(default)]
    pub chunk_size: u64,
    #[serde(default)]
    pub hashes: Vec<String>,
}

/// A remote file to download, immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResource {
    pub url: String,
    #[serde(default)]
    pub torrent_url: Option<String>,
    pub size: u64,
    #[serde(default)]
    pub chunks: ChunksData,
}

impl RemoteResource {
    pub fn new(url: impl Into<String>, size: u64) -> Self {
        Self {
            url: url.into(),
            torrent_url: None,
            size,
            chunks: ChunksData::default(),
        }
    }

    pub fn with_torrent_url(mut self, torrent_url: impl Into<String>) -> Self {
        self.torrent_url = Some(torrent_url.into());
        self
    }

    pub fn with_chunks(mut self, chunk_size: u64, hashes: Vec<String>) -> Self {
        self.chunks = ChunksData { chunk_size, hashes };
        self
    }

    /// Whether the resource carries usable chunk metadata.
    pub fn has_chunks(&self) -> bool {
        self.chunks.chunk_size > 0 && !self.chunks.hashes.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.hashes.len()
    }

    /// Byte range `[start, end)` of chunk `index`, clamped to the total size.
    pub fn chunk_range(&self, index: usize) -> (u64, u64) {
        let start = index as u64 * self.chunks.chunk_size;
        let end = (start + self.chunks.chunk_size).min(self.size);
        (start, end)
    }

    /// Structural validation, performed eagerly before any I/O.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.url.is_empty() {
            return Err(DownloadError::ArgumentInvalid(
                "resource url is empty".to_string(),
            ));
        }

        if self.has_chunks() {
            let expected = self.size.div_ceil(self.chunks.chunk_size) as usize;
            if self.chunks.hashes.len() != expected {
                return Err(DownloadError::ArgumentInvalid(format!(
                    "resource declares {} chunk hashes but size {} with chunk size {} needs {}",
                    self.chunks.hashes.len(),
                    self.size,
                    self.chunks.chunk_size,
                    expected
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_without_chunk_metadata_has_no_chunks() {
        let resource = RemoteResource::new("http://example.com/pack", 100);
        assert!(!resource.has_chunks());
        assert!(resource.validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_means_no_chunk_metadata() {
        let resource =
            RemoteResource::new("http://example.com/pack", 100).with_chunks(0, vec!["a".into()]);
        assert!(!resource.has_chunks());
    }

    #[test]
    fn chunk_ranges_clamp_to_total_size() {
        let resource = RemoteResource::new("http://example.com/pack", 10)
            .with_chunks(4, vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(resource.chunk_range(0), (0, 4));
        assert_eq!(resource.chunk_range(1), (4, 8));
        assert_eq!(resource.chunk_range(2), (8, 10));
    }

    #[test]
    fn builder_carries_the_torrent_url() {
        let resource = RemoteResource::new("http://example.com/pack", 10)
            .with_torrent_url("http://example.com/pack.torrent");
        assert_eq!(
            resource.torrent_url.as_deref(),
            Some("http://example.com/pack.torrent")
        );
    }

    #[test]
    fn validation_rejects_wrong_hash_count() {
        let resource = RemoteResource::new("http://example.com/pack", 10)
            .with_chunks(4, vec!["a".into(), "b".into()]);
        assert!(matches!(
            resource.validate(),
            Err(DownloadError::ArgumentInvalid(_))
        ));
    }

    #[test]
    fn validation_rejects_empty_url() {
        let resource = RemoteResource::new("", 10);
        assert!(matches!(
            resource.validate(),
            Err(DownloadError::ArgumentInvalid(_))
        ));
    }
}
