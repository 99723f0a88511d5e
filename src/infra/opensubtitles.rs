use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::OpenSubtitlesConfig;
use crate::domain::models::ShowIdentity;
use crate::error::{Error, Result};
use crate::infra::reference::{self, ReferenceSource};
use crate::infra::{cache, markers};

/// One subtitle file as listed by the OpenSubtitles REST search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResult {
    pub sub_file_name: Option<String>,
    pub info_format: Option<String>,
    pub sub_format: Option<String>,
    pub series_episode: Option<String>,
    pub sub_download_link: Option<String>,
    #[serde(default, deserialize_with = "score_from_any")]
    pub score: f64,
}

impl SearchResult {
    pub fn is_web_dl(&self) -> bool {
        self.info_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("web-dl"))
    }
}

// The API is inconsistent about quoting numbers.
fn score_from_any<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
        serde_json::Value::String(s) => s.parse().unwrap_or_default(),
        _ => 0.0,
    })
}

#[derive(Debug, Clone)]
pub struct EpisodeSearchResults {
    pub episode_number: u32,
    pub results: Vec<SearchResult>,
}

impl EpisodeSearchResults {
    /// Web releases first, then by score.
    pub fn best(&self) -> Option<&SearchResult> {
        self.results
            .iter()
            .filter(|r| r.sub_download_link.is_some())
            .max_by(|a, b| {
                a.is_web_dl()
                    .cmp(&b.is_web_dl())
                    .then(a.score.total_cmp(&b.score))
            })
    }
}

/// Keeps English SRT results that name a file and an episode, grouped by
/// episode in ascending order.
pub fn group_by_episode(results: Vec<SearchResult>) -> Vec<EpisodeSearchResults> {
    let mut grouped: BTreeMap<u32, Vec<SearchResult>> = BTreeMap::new();
    for result in results {
        let Some(file_name) = result.sub_file_name.as_deref() else {
            continue;
        };
        if file_name.to_ascii_lowercase().contains(".ita.") {
            continue;
        }
        if !result
            .sub_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("srt"))
        {
            continue;
        }
        let Some(episode) = result
            .series_episode
            .as_deref()
            .and_then(|e| e.trim().parse::<u32>().ok())
        else {
            continue;
        };
        grouped.entry(episode).or_default().push(result);
    }

    grouped
        .into_iter()
        .map(|(episode_number, results)| EpisodeSearchResults {
            episode_number,
            results,
        })
        .collect()
}

pub struct OpenSubtitlesClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenSubtitlesClient {
    pub fn new(config: &OpenSubtitlesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn search(&self, imdb: &str, season_number: u32) -> Result<Vec<EpisodeSearchResults>> {
        let imdb = imdb.trim_start_matches("tt");
        let url = format!(
            "{}/search/imdbid-{imdb}/season-{season_number}/sublanguageid-eng",
            self.base_url
        );
        tracing::debug!(%url, "Searching OpenSubtitles");

        let results: Vec<SearchResult> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(group_by_episode(results))
    }

    /// Downloads and decompresses one gzipped subtitle file.
    pub async fn download(&self, link: &str) -> Result<Vec<u8>> {
        let compressed = self
            .http
            .get(link)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_ref()).read_to_end(&mut decoded)?;
        Ok(decoded)
    }
}

/// Fills the reference folder from OpenSubtitles. Network trouble is logged
/// and the run continues with whatever is already on disk.
pub struct OpenSubtitlesSource {
    client: OpenSubtitlesClient,
}

impl OpenSubtitlesSource {
    pub fn new(client: OpenSubtitlesClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReferenceSource for OpenSubtitlesSource {
    async fn acquire(
        &self,
        show: &ShowIdentity,
        reference_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>> {
        tokio::fs::create_dir_all(reference_dir).await?;

        let expected = markers::read_episode_count(reference_dir).await;
        let present = reference::present_episodes(reference_dir).await?;
        if expected.is_some_and(|count| count == present.len()) {
            tracing::debug!(episodes = present.len(), "Reference subtitles already present");
            return Ok(expected);
        }

        let Some(imdb) = show.imdb.as_deref() else {
            tracing::warn!("No IMDb id given; using local reference subtitles only");
            return Ok(expected);
        };

        let episodes = match cancellable(cancel, self.client.search(imdb, show.season_number)).await {
            Ok(episodes) => episodes,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::error!(error = %e, imdb, "Error searching OpenSubtitles");
                return Ok(expected);
            }
        };

        let Some(last_episode) = episodes.iter().map(|e| e.episode_number).max() else {
            tracing::error!(
                imdb,
                season = show.season_number,
                "OpenSubtitles returned no results"
            );
            return Ok(expected);
        };
        tracing::info!(count = last_episode, "Found episodes to download");
        let last_episode = last_episode as usize;
        markers::write_episode_count(reference_dir, last_episode).await?;

        for episode in &episodes {
            if present.contains(&episode.episode_number) {
                continue;
            }
            let Some(link) = episode.best().and_then(|r| r.sub_download_link.as_deref()) else {
                continue;
            };

            let content = match cancellable(cancel, self.client.download(link)).await {
                Ok(content) => content,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        episode = episode.episode_number,
                        "Failed to download reference subtitles"
                    );
                    continue;
                }
            };

            let name = format!(
                "s{:02}e{:02}.srt",
                show.season_number, episode.episode_number
            );
            let staging = tempfile::Builder::new()
                .prefix(".staging-")
                .tempdir_in(reference_dir)?;
            let staged = staging.path().join(&name);
            tokio::fs::write(&staged, content).await?;
            cache::commit(&staged, &reference_dir.join(&name)).await?;
            tracing::info!(file = %name, "Downloaded reference subtitles");
        }

        Ok(Some(last_episode))
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = operation => result,
    }
}
