use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const VIDEO_EXTENSIONS: &[&str] = &["mkv"];

// Names as the renamer writes them, so the match is case-sensitive.
static KNOWN_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"s\d{2}e\d{2}(-e\d{2})?\.").expect("valid episode pattern"));

/// Video files of one folder split by whether their names already carry an
/// episode number.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub known: Vec<PathBuf>,
    pub unknown: Vec<PathBuf>,
}

impl Classification {
    pub fn total(&self) -> usize {
        self.known.len() + self.unknown.len()
    }
}

pub fn is_known_episode(file_name: &str) -> bool {
    KNOWN_EPISODE.is_match(file_name)
}

/// Top-level supported video files only; both lists are sorted by name.
pub async fn classify(folder: &Path) -> io::Result<Classification> {
    let mut video_files = collect_video_files(folder).await?;
    video_files.sort();

    let (known, unknown) = video_files.into_iter().partition(|path| {
        path.file_name()
            .is_some_and(|name| is_known_episode(&name.to_string_lossy()))
    });
    Ok(Classification { known, unknown })
}

async fn collect_video_files(folder: &Path) -> io::Result<Vec<PathBuf>> {
    let mut video_files = Vec::new();
    let mut entries = tokio::fs::read_dir(folder).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext))
        {
            video_files.push(path);
        }
    }

    Ok(video_files)
}
