use std::io;
use std::path::{Path, PathBuf};

use crate::domain::models::EpisodeId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    /// Dry run: the rename that would have happened.
    Simulated(PathBuf),
    AlreadyNamed,
    /// The source disappeared before it could be renamed.
    Vanished,
}

pub fn generate_filename(show_title: &str, episode: &EpisodeId, extension: &str) -> String {
    format!(
        "{} - {}.{}",
        sanitize_filename(show_title),
        episode.name_segment(),
        extension
    )
}

fn sanitize_filename(name: &str) -> String {
    // Remove or replace invalid filename characters
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Path the file would have once renamed, in the same folder, keeping its
/// extension.
pub fn target_path(source: &Path, show_title: &str, episode: &EpisodeId) -> PathBuf {
    let extension = source
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("mkv");
    let directory = source.parent().unwrap_or(Path::new("."));
    directory.join(generate_filename(show_title, episode, extension))
}

/// Never overwrites: an occupied destination is a collision.
pub async fn rename_episode(source: &Path, destination: &Path, dry_run: bool) -> Result<RenameOutcome> {
    if source == destination {
        return Ok(RenameOutcome::AlreadyNamed);
    }
    if !tokio::fs::try_exists(source).await? {
        return Ok(RenameOutcome::Vanished);
    }
    if tokio::fs::try_exists(destination).await? {
        return Err(Error::Collision(destination.to_path_buf()));
    }
    if dry_run {
        return Ok(RenameOutcome::Simulated(destination.to_path_buf()));
    }

    move_without_overwrite(source, destination).await
}

/// Links the destination first so the filesystem refuses an occupied name,
/// closing the gap between the existence check and the move.
async fn move_without_overwrite(source: &Path, destination: &Path) -> Result<RenameOutcome> {
    match tokio::fs::hard_link(source, destination).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::Collision(destination.to_path_buf()));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RenameOutcome::Vanished),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => {
            tracing::warn!(
                path = %destination.display(),
                "Hard links unsupported here; falling back to a plain rename"
            );
            return match tokio::fs::rename(source, destination).await {
                Ok(()) => Ok(RenameOutcome::Renamed(destination.to_path_buf())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RenameOutcome::Vanished),
                Err(e) => Err(e.into()),
            };
        }
        Err(e) => return Err(e.into()),
    }

    if let Err(e) = tokio::fs::remove_file(source).await {
        if e.kind() != io::ErrorKind::NotFound {
            // Leave the original name in place rather than two copies.
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e.into());
        }
    }
    Ok(RenameOutcome::Renamed(destination.to_path_buf()))
}
