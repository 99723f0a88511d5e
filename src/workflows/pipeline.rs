use anyhow::{bail, Context};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::domain::models::{MatchResult, ReferenceEntry, ShowIdentity};
use crate::error::{Error, Result};
use crate::infra::markers;
use crate::infra::reference::ReferenceSource;
use crate::media::subtitles::{display_name, SubtitleExtractor};
use crate::workflows::classifier::{self, Classification};
use crate::workflows::normalizer::Normalizer;
use crate::workflows::renamer::{self, RenameOutcome};
use crate::workflows::{corpus, identity, matcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rename { dry_run: bool },
    Verify,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: Mode,
    pub folder: PathBuf,
    pub imdb: Option<String>,
    pub title: Option<String>,
    pub season_number: Option<u32>,
    /// Minimum confidence, in percent.
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failed => 1,
            RunOutcome::Cancelled => 2,
        }
    }
}

pub struct Pipeline {
    extractor: SubtitleExtractor,
    normalizer: Normalizer,
    reference: Arc<dyn ReferenceSource>,
}

impl Pipeline {
    pub fn new(
        extractor: SubtitleExtractor,
        normalizer: Normalizer,
        reference: Arc<dyn ReferenceSource>,
    ) -> Self {
        Self {
            extractor,
            normalizer,
            reference,
        }
    }

    /// Runs one rename or verify pass over a season folder. Fatal problems
    /// (bad folder, unknown show, no reference subtitles) are errors; a
    /// verify pass that does not check out is `Failed`.
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunOutcome> {
        match self.run_checked(request, cancel).await {
            Err(e) if cancel.is_cancelled() || is_cancellation(&e) => Ok(RunOutcome::Cancelled),
            other => other,
        }
    }

    async fn run_checked(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunOutcome> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let folder = match tokio::fs::canonicalize(&request.folder).await {
            Ok(folder) if folder.is_dir() => folder,
            _ => bail!("Folder {} must be a directory", request.folder.display()),
        };

        if markers::is_verified(&folder).await? {
            tracing::info!(folder = %folder.display(), "Folder is already verified");
            return Ok(RunOutcome::Success);
        }

        let Some(show) = identity::resolve(
            request.imdb.clone(),
            request.title.clone(),
            request.season_number,
            &folder,
        ) else {
            bail!("Unable to detect show title or season number for {}", folder.display());
        };
        tracing::info!(title = %show.title, "Detected show title");
        tracing::info!(season = show.season_number, "Detected season number");

        let reference_dir = markers::reference_dir(&folder);
        let expected_count = self
            .reference
            .acquire(&show, &reference_dir, cancel)
            .await
            .context("Failed to acquire reference subtitles")?;

        let corpus = corpus::load_corpus(&reference_dir, cancel).await?;
        if corpus.is_empty() {
            bail!("No reference subtitles found in {}", reference_dir.display());
        }
        tracing::info!(entries = corpus.len(), "Loaded reference subtitles");

        let classification = classifier::classify(&folder)
            .await
            .with_context(|| format!("Failed to list {}", folder.display()))?;
        tracing::info!(
            known = classification.known.len(),
            unknown = classification.unknown.len(),
            total = classification.total(),
            "Classified episodes"
        );

        let outcome = match request.mode {
            Mode::Rename { dry_run } => {
                self.rename_unknown(&show, &corpus, &classification, request.confidence, dry_run, cancel)
                    .await?
            }
            Mode::Verify => {
                self.verify_known(&folder, &corpus, expected_count, &classification, request.confidence, cancel)
                    .await?
            }
        };
        Ok(outcome)
    }

    async fn rename_unknown(
        &self,
        show: &ShowIdentity,
        corpus: &[ReferenceEntry],
        classification: &Classification,
        confidence: u8,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        tracing::info!(count = classification.unknown.len(), "Found unknown episodes");

        for file in &classification.unknown {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let span = tracing::info_span!("episode", file = %display_name(file));
            self.rename_one(show, corpus, file, confidence, dry_run, cancel)
                .instrument(span)
                .await?;
        }

        Ok(RunOutcome::Success)
    }

    /// Only cancellation escapes; everything else is logged and skipped.
    async fn rename_one(
        &self,
        show: &ShowIdentity,
        corpus: &[ReferenceEntry],
        file: &Path,
        confidence: u8,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(result) = self.identify_or_log(corpus, file, cancel).await? else {
            return Ok(());
        };

        if !result.meets_threshold(confidence) {
            tracing::warn!(
                episode = %result.episode,
                confidence = result.confidence_percent(),
                "Match failed; confidence is too low"
            );
            return Ok(());
        }
        tracing::info!(
            episode = %result.episode,
            confidence = result.confidence_percent(),
            "Matched episode"
        );

        let destination = renamer::target_path(file, &show.title, &result.episode);
        match renamer::rename_episode(file, &destination, dry_run).await {
            Ok(RenameOutcome::Renamed(path)) => {
                tracing::info!(dest = %path.display(), "Renamed episode");
            }
            Ok(RenameOutcome::Simulated(path)) => {
                tracing::info!(dest = %path.display(), "Would rename episode (dry run)");
            }
            Ok(RenameOutcome::AlreadyNamed) => {
                tracing::info!("Episode is already named correctly");
            }
            Ok(RenameOutcome::Vanished) => {
                tracing::warn!("Episode disappeared before it could be renamed");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to rename episode");
            }
        }
        Ok(())
    }

    async fn verify_known(
        &self,
        folder: &Path,
        corpus: &[ReferenceEntry],
        expected_count: Option<usize>,
        classification: &Classification,
        confidence: u8,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let reference_count = corpus::episode_total(corpus);
        if expected_count != Some(reference_count) {
            tracing::error!(
                expected = ?expected_count,
                reference = reference_count,
                "Available subtitles count doesn't match reference subtitles count"
            );
            return Ok(RunOutcome::Failed);
        }
        if classification.known.len() != corpus.len() {
            tracing::error!(
                known = classification.known.len(),
                reference = corpus.len(),
                "Known episodes count doesn't match reference subtitles count"
            );
            return Ok(RunOutcome::Failed);
        }

        let mut verified = 0;
        for file in &classification.known {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let span = tracing::info_span!("episode", file = %display_name(file));
            if self
                .verify_one(corpus, file, confidence, cancel)
                .instrument(span)
                .await?
            {
                verified += 1;
            }
        }

        if verified != classification.known.len() {
            tracing::error!(
                verified,
                known = classification.known.len(),
                "Some episodes failed to verify"
            );
            return Ok(RunOutcome::Failed);
        }

        tracing::info!("All episodes successfully verified");
        markers::mark_verified(folder).await?;
        Ok(RunOutcome::Success)
    }

    async fn verify_one(
        &self,
        corpus: &[ReferenceEntry],
        file: &Path,
        confidence: u8,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(result) = self.identify_or_log(corpus, file, cancel).await? else {
            return Ok(false);
        };

        if !result.meets_threshold(confidence) {
            tracing::warn!(
                confidence = result.confidence_percent(),
                "Verify failed; confidence is too low"
            );
            return Ok(false);
        }

        let segment = result.episode.name_segment();
        if display_name(file).contains(&segment) {
            tracing::info!(confidence = result.confidence_percent(), "Verified OK");
            Ok(true)
        } else {
            tracing::warn!(
                episode = %segment,
                confidence = result.confidence_percent(),
                "Verify failed; matched a different episode"
            );
            Ok(false)
        }
    }

    async fn identify_or_log(
        &self,
        corpus: &[ReferenceEntry],
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<MatchResult>> {
        match self.identify(corpus, file, cancel).await {
            Ok(Some(result)) => Ok(Some(result)),
            Ok(None) => {
                tracing::warn!("No match found");
                Ok(None)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::error!(error = %e, "Failed to identify episode");
                Ok(None)
            }
        }
    }

    /// Extracts every usable subtitle stream of `file`, then normalizes and
    /// matches them concurrently. The most confident match wins.
    pub async fn identify(
        &self,
        corpus: &[ReferenceEntry],
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<MatchResult>> {
        let subtitles = self.extractor.extract(file, cancel).await?;

        let file_cancel = cancel.child_token();
        let chains = subtitles.iter().map(|subtitle| {
            let file_cancel = &file_cancel;
            async move {
                let lines = self
                    .normalizer
                    .normalize(subtitle, file_cancel)
                    .await
                    .inspect_err(|e| {
                        if e.is_cancelled() {
                            file_cancel.cancel();
                        }
                    })?;
                Ok::<_, Error>(matcher::best_match(corpus, &lines))
            }
        });
        let results = join_all(chains).await;

        let mut best: Option<MatchResult> = None;
        let mut last_error = None;
        for (subtitle, result) in subtitles.iter().zip(results) {
            match result {
                Ok(Some(candidate)) => {
                    tracing::debug!(
                        stream = %subtitle.stream(),
                        format = ?subtitle.format(),
                        episode = %candidate.episode,
                        confidence = candidate.confidence_percent(),
                        "Scored subtitles"
                    );
                    if best
                        .as_ref()
                        .is_none_or(|current| candidate.confidence > current.confidence)
                    {
                        best = Some(candidate);
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        stream = %subtitle.stream(),
                        error = %e,
                        "Failed to process subtitles"
                    );
                    last_error = Some(e);
                }
            }
        }

        match (best, last_error) {
            (Some(best), _) => Ok(Some(best)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }
}

fn is_cancellation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_cancelled))
}
