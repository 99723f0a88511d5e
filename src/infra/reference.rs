use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

use crate::domain::models::{EpisodeId, ShowIdentity};
use crate::error::{Error, Result};
use crate::infra::markers;

static REFERENCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)s(\d+)[ex](\d+)(?:-?e(\d+))?").expect("valid reference name pattern")
});

/// Widest multi-episode file accepted from a reference name.
const MAX_EPISODE_SPAN: u32 = 10;

/// Somewhere reference subtitles come from.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Makes sure reference subtitles for `show` are present in
    /// `reference_dir` and returns the expected episode count when known.
    async fn acquire(
        &self,
        show: &ShowIdentity,
        reference_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>>;
}

/// Uses whatever the reference folder already holds.
pub struct LocalReferenceSource;

#[async_trait]
impl ReferenceSource for LocalReferenceSource {
    async fn acquire(
        &self,
        _show: &ShowIdentity,
        reference_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(markers::read_episode_count(reference_dir).await)
    }
}

/// Reads `s01e02`, `S01x02` or `s01e02-e03` out of a reference file name.
pub fn episode_from_name(file_name: &str) -> Option<EpisodeId> {
    let captures = REFERENCE_NAME.captures(file_name)?;
    let season = captures[1].parse().ok()?;
    let first = captures[2].parse().ok()?;
    let Some(last) = captures.get(3) else {
        return Some(EpisodeId::single(season, first));
    };
    let last: u32 = last.as_str().parse().ok()?;
    if last.abs_diff(first) > MAX_EPISODE_SPAN {
        tracing::debug!(file_name, first, last, "Ignoring implausible episode range");
        return None;
    }
    Some(EpisodeId::range(season, first, last))
}

/// Top-level reference files with a recognisable episode name, sorted.
pub async fn reference_files(reference_dir: &Path) -> io::Result<Vec<(PathBuf, EpisodeId)>> {
    let mut entries = match tokio::fs::read_dir(reference_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("srt") || e.eq_ignore_ascii_case("txt"));
        if !supported {
            continue;
        }
        let name = entry.file_name();
        if let Some(episode) = episode_from_name(&name.to_string_lossy()) {
            files.push((path, episode));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Episode numbers already covered by reference `.srt` files.
pub async fn present_episodes(reference_dir: &Path) -> io::Result<BTreeSet<u32>> {
    Ok(reference_files(reference_dir)
        .await?
        .into_iter()
        .filter(|(path, _)| path.extension().is_some_and(|e| e.eq_ignore_ascii_case("srt")))
        .flat_map(|(_, episode)| episode.episode_numbers)
        .collect())
}
