use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::domain::models::ReferenceEntry;
use crate::error::{Error, Result};
use crate::infra::reference;
use crate::media::srt;
use crate::workflows::normalizer::normalize_lines;

/// Loads every recognisable reference file. `.srt` files are parsed as
/// subtitles, `.txt` files are taken one line per line. Both go through the
/// same normalization as extracted subtitles.
pub async fn load_corpus(
    reference_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<ReferenceEntry>> {
    let mut corpus = Vec::new();

    for (path, episode) in reference::reference_files(reference_dir).await? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let is_srt = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("srt"));
        let lines = if is_srt {
            match srt::parse_file(&path).await {
                Ok(cues) => normalize_lines(srt::plaintext_lines(&cues)),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable reference subtitles");
                    continue;
                }
            }
        } else {
            let bytes = tokio::fs::read(&path).await?;
            normalize_lines(String::from_utf8_lossy(&bytes).lines())
        };

        tracing::debug!(
            file = %path.display(),
            episode = %episode,
            lines = lines.len(),
            "Loaded reference subtitles"
        );
        corpus.push(ReferenceEntry::from_lines(episode, &lines));
    }

    Ok(corpus)
}

/// Sum of episode numbers across entries; a double episode counts twice.
pub fn episode_total(corpus: &[ReferenceEntry]) -> usize {
    corpus.iter().map(|e| e.episode.episode_numbers.len()).sum()
}
