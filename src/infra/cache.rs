use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::domain::models::{ContentFingerprint, StreamKey};

/// On-disk store of extracted subtitle streams, keyed by content
/// fingerprint and sharded two levels deep (`ab/cd/abcd...`).
///
/// Entries are never evicted here. Writers stage files in a scratch folder
/// inside the shard and rename them into place, so a present entry is always
/// complete.
#[derive(Debug, Clone)]
pub struct ExtractionCache {
    root: PathBuf,
}

impl ExtractionCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn shard_dir(&self, fingerprint: &ContentFingerprint) -> PathBuf {
        let hash = fingerprint.as_str();
        self.root.join(&hash[..2]).join(&hash[2..4])
    }

    /// `<root>/<ab>/<cd>/<fingerprint>-<stream>.<extension>`
    pub fn artifact_path(
        &self,
        fingerprint: &ContentFingerprint,
        stream: StreamKey,
        extension: &str,
    ) -> PathBuf {
        self.shard_dir(fingerprint)
            .join(format!("{fingerprint}-{stream}.{extension}"))
    }

    /// Creates a scratch folder next to the final entries so that committing
    /// is a same-filesystem rename. It is removed when dropped.
    pub async fn staging_dir(&self, fingerprint: &ContentFingerprint) -> io::Result<TempDir> {
        let shard = self.shard_dir(fingerprint);
        tokio::fs::create_dir_all(&shard).await?;
        tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&shard)
    }
}

/// Moves a fully written file into its cache location.
pub async fn commit(staged: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(staged, destination).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> ContentFingerprint {
        ContentFingerprint::from_accumulator(0x8e24_5d96_79d3_1e12)
    }

    #[test]
    fn test_artifact_path_is_sharded() {
        let cache = ExtractionCache::new("/cache/extracted");
        let fp = fingerprint();
        assert_eq!(
            cache.artifact_path(&fp, StreamKey::Index(3), "sup"),
            PathBuf::from("/cache/extracted/8e/24/8e245d9679d31e12-3.sup")
        );
        assert_eq!(
            cache.artifact_path(&fp, StreamKey::Generated, "srt"),
            PathBuf::from("/cache/extracted/8e/24/8e245d9679d31e12-generated.srt")
        );
    }

    #[tokio::test]
    async fn test_staged_file_commits_into_shard() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ExtractionCache::new(temp_dir.path());
        let fp = ContentFingerprint::from_accumulator(0xabcd_0000_0000_0001);
        let destination = cache.artifact_path(&fp, StreamKey::Index(2), "srt");

        let staging = cache.staging_dir(&fp).await.unwrap();
        let staged = staging.path().join("out.srt");
        tokio::fs::write(&staged, "1\n").await.unwrap();
        commit(&staged, &destination).await.unwrap();
        let staging_path = staging.path().to_path_buf();
        drop(staging);

        assert!(destination.exists());
        assert!(destination.starts_with(temp_dir.path().join("ab").join("cd")));
        assert!(!staging_path.exists());
    }
}
