mod cli;
mod config;
mod domain;
mod error;
mod infra;
mod media;
mod workflows;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, TargetArgs};
use config::Config;
use infra::cache::ExtractionCache;
use infra::opensubtitles::{OpenSubtitlesClient, OpenSubtitlesSource};
use infra::reference::{LocalReferenceSource, ReferenceSource};
use media::subtitles::SubtitleExtractor;
use media::tools::{ProcessRunner, ToolRunner};
use workflows::normalizer::Normalizer;
use workflows::pipeline::{Mode, Pipeline, RunOutcome, RunRequest};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tvrename=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping");
            on_interrupt.cancel();
        }
    });

    let code = match run(cli, &cancel).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            tracing::error!("{e:#}");
            RunOutcome::Failed.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<RunOutcome> {
    let config = config::load()?;

    let (target, mode) = match cli.command {
        Command::Rename { target, dry_run } => (target, Mode::Rename { dry_run }),
        Command::Verify { target } => (target, Mode::Verify),
    };

    let pipeline = build_pipeline(&config, &target)?;
    let request = RunRequest {
        mode,
        folder: target.folder,
        imdb: target.imdb,
        title: target.title,
        season_number: target.season,
        confidence: target.confidence.unwrap_or(config.confidence),
    };

    pipeline.run(&request, cancel).await
}

fn build_pipeline(config: &Config, target: &TargetArgs) -> Result<Pipeline> {
    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);
    let extractor = SubtitleExtractor::new(
        runner.clone(),
        ExtractionCache::new(config.extracted_folder()),
        config.tools.clone(),
        config.speech_to_text.clone(),
    );
    let normalizer = Normalizer::new(runner, config.tools.clone());

    let reference: Arc<dyn ReferenceSource> = if target.offline {
        Arc::new(LocalReferenceSource)
    } else {
        Arc::new(OpenSubtitlesSource::new(OpenSubtitlesClient::new(
            &config.opensubtitles,
        )?))
    };

    Ok(Pipeline::new(extractor, normalizer, reference))
}
