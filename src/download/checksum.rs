use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::DownloadError;
use crate::resource::RemoteResource;

pub struct ChunkVerifier;

impl ChunkVerifier {
    /// Lowercase hex SHA-256 of one chunk's bytes.
    pub fn hash_chunk(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    pub fn chunk_matches(data: &[u8], expected: &str) -> bool {
        Self::hash_chunk(data).eq_ignore_ascii_case(expected)
    }

    /// Scans an existing destination file and returns how many leading chunks
    /// are present and match their expected hashes. Stops at the first short
    /// or mismatching chunk; a missing file verifies zero chunks.
    pub async fn verified_chunk_count(
        path: &Path,
        resource: &RemoteResource,
    ) -> Result<usize, DownloadError> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut verified = 0;

        for (index, expected) in resource.chunks.hashes.iter().enumerate() {
            let (start, end) = resource.chunk_range(index);
            let mut buffer = vec![0u8; (end - start) as usize];

            match reader.read_exact(&mut buffer).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            if !Self::chunk_matches(&buffer, expected) {
                break;
            }

            verified += 1;
        }

        Ok(verified)
    }
}
