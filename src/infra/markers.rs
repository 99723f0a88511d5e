use std::io;
use std::path::{Path, PathBuf};

use crate::infra::cache;

pub const VERIFIED_MARKER: &str = ".tvrename-verified";
pub const EPISODE_COUNT_MARKER: &str = ".episode-count";

/// `<folder>/.tvrename/reference`
pub fn reference_dir(folder: &Path) -> PathBuf {
    folder.join(".tvrename").join("reference")
}

pub async fn is_verified(folder: &Path) -> io::Result<bool> {
    tokio::fs::try_exists(folder.join(VERIFIED_MARKER)).await
}

/// Written through a staged file so the marker never exists half-written.
pub async fn mark_verified(folder: &Path) -> io::Result<()> {
    write_atomically(folder, VERIFIED_MARKER, "OK").await
}

/// Expected number of episodes recorded by a previous acquisition. A missing
/// or unreadable marker is `None`.
pub async fn read_episode_count(reference_dir: &Path) -> Option<usize> {
    let content = tokio::fs::read_to_string(reference_dir.join(EPISODE_COUNT_MARKER))
        .await
        .ok()?;
    content.trim().parse().ok()
}

pub async fn write_episode_count(reference_dir: &Path, count: usize) -> io::Result<()> {
    write_atomically(reference_dir, EPISODE_COUNT_MARKER, &count.to_string()).await
}

async fn write_atomically(folder: &Path, name: &str, content: &str) -> io::Result<()> {
    tokio::fs::create_dir_all(folder).await?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(folder)?;
    let staged = staging.path().join(name);
    tokio::fs::write(&staged, content).await?;
    cache::commit(&staged, &folder.join(name)).await
}
