use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{SpeechToTextConfig, ToolPaths};
use crate::domain::models::{ContentFingerprint, StreamKey};
use crate::error::{Error, Result};
use crate::infra::cache::{self, ExtractionCache};
use crate::media::probe::{self, ProbedStream};
use crate::media::tools::{ToolInvocation, ToolRunner};
use crate::media::{ffmpeg, hasher, speech};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Text,        // subrip, mov_text
    DvdBitmap,   // dvd_subtitle (VobSub idx/sub pair)
    ImageBitmap, // hdmv_pgs_subtitle
}

impl SubtitleFormat {
    pub fn from_codec(codec_name: &str) -> Option<Self> {
        match codec_name {
            "subrip" | "mov_text" | "text" => Some(Self::Text),
            "dvd_subtitle" => Some(Self::DvdBitmap),
            "hdmv_pgs_subtitle" => Some(Self::ImageBitmap),
            _ => None,
        }
    }

    /// Lower is better: text, then DVD bitmaps, then everything else.
    pub fn priority_for_codec(codec_name: &str) -> u8 {
        match Self::from_codec(codec_name) {
            Some(Self::Text) => 0,
            Some(Self::DvdBitmap) => 1,
            _ => 2,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "srt",
            Self::DvdBitmap => "sub",
            Self::ImageBitmap => "sup",
        }
    }
}

/// A subtitle stream stored in the extraction cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedSubtitle {
    Text { path: PathBuf, stream: StreamKey },
    DvdBitmap { path: PathBuf, stream: StreamKey },
    ImageBitmap { path: PathBuf, stream: StreamKey },
}

impl ExtractedSubtitle {
    pub fn new(format: SubtitleFormat, path: PathBuf, stream: StreamKey) -> Self {
        match format {
            SubtitleFormat::Text => Self::Text { path, stream },
            SubtitleFormat::DvdBitmap => Self::DvdBitmap { path, stream },
            SubtitleFormat::ImageBitmap => Self::ImageBitmap { path, stream },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Text { path, .. } | Self::DvdBitmap { path, .. } | Self::ImageBitmap { path, .. } => {
                path
            }
        }
    }

    pub fn stream(&self) -> StreamKey {
        match self {
            Self::Text { stream, .. }
            | Self::DvdBitmap { stream, .. }
            | Self::ImageBitmap { stream, .. } => *stream,
        }
    }

    pub fn format(&self) -> SubtitleFormat {
        match self {
            Self::Text { .. } => SubtitleFormat::Text,
            Self::DvdBitmap { .. } => SubtitleFormat::DvdBitmap,
            Self::ImageBitmap { .. } => SubtitleFormat::ImageBitmap,
        }
    }

    /// Where the text version of this stream lives once OCR has run.
    pub fn text_path(&self) -> PathBuf {
        self.path().with_extension(SubtitleFormat::Text.extension())
    }
}

/// Pulls subtitle streams out of video files into the extraction cache,
/// generating them from speech when a file has none.
pub struct SubtitleExtractor {
    runner: Arc<dyn ToolRunner>,
    cache: ExtractionCache,
    tools: ToolPaths,
    speech: SpeechToTextConfig,
}

impl SubtitleExtractor {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        cache: ExtractionCache,
        tools: ToolPaths,
        speech: SpeechToTextConfig,
    ) -> Self {
        Self {
            runner,
            cache,
            tools,
            speech,
        }
    }

    pub async fn extract(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExtractedSubtitle>> {
        let fingerprint = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            fingerprint = hasher::fingerprint(path) => fingerprint?,
        };
        tracing::info!(
            file = %display_name(path),
            hash = %fingerprint,
            "Fingerprinted episode"
        );

        let generated = self
            .cache
            .artifact_path(&fingerprint, StreamKey::Generated, "srt");
        if tokio::fs::try_exists(&generated).await? {
            tracing::debug!(path = %generated.display(), "Reusing generated subtitles");
            return Ok(vec![ExtractedSubtitle::Text {
                path: generated,
                stream: StreamKey::Generated,
            }]);
        }

        let streams = probe::probe_streams(self.runner.as_ref(), &self.tools.ffprobe, path, cancel)
            .await?;
        let subtitle_streams = probe::subtitle_streams(&streams);

        if subtitle_streams.is_empty() {
            tracing::info!(file = %display_name(path), "No subtitle streams found");
            let subtitle = self.generate(path, &fingerprint, &streams, cancel).await?;
            return Ok(vec![subtitle]);
        }

        let mut extracted = Vec::new();
        let mut last_error = None;
        for stream in &subtitle_streams {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.extract_stream(path, &fingerprint, stream, cancel).await {
                Ok(Some(subtitle)) => extracted.push(subtitle),
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        file = %display_name(path),
                        stream = stream.index,
                        codec = %stream.codec_name,
                        "Failed to extract subtitles: {e}"
                    );
                    last_error = Some(e);
                }
            }
        }

        if extracted.is_empty() {
            return Err(last_error.unwrap_or(Error::NoSubtitles));
        }
        Ok(extracted)
    }

    async fn extract_stream(
        &self,
        path: &Path,
        fingerprint: &ContentFingerprint,
        stream: &ProbedStream,
        cancel: &CancellationToken,
    ) -> Result<Option<ExtractedSubtitle>> {
        let Some(format) = SubtitleFormat::from_codec(&stream.codec_name) else {
            tracing::warn!(
                stream = stream.index,
                codec = %stream.codec_name,
                "Skipping unsupported subtitle codec"
            );
            return Ok(None);
        };
        let key = StreamKey::Index(stream.index);
        tracing::info!(
            stream = stream.index,
            codec = %stream.codec_name,
            "Probed subtitles stream"
        );

        let text_path = self.cache.artifact_path(fingerprint, key, "srt");
        if format != SubtitleFormat::Text && tokio::fs::try_exists(&text_path).await? {
            tracing::debug!(path = %text_path.display(), "Reusing converted subtitles");
            return Ok(Some(ExtractedSubtitle::Text {
                path: text_path,
                stream: key,
            }));
        }

        let target = self
            .cache
            .artifact_path(fingerprint, key, format.extension());
        if tokio::fs::try_exists(&target).await? {
            tracing::debug!(path = %target.display(), "Reusing extracted subtitles");
            return Ok(Some(ExtractedSubtitle::new(format, target, key)));
        }

        tracing::info!(path = %target.display(), "Extracting subtitles");
        let staging = self.cache.staging_dir(fingerprint).await?;
        let file_name = target
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("track.{}", format.extension())));
        let staged = staging.path().join(file_name);

        extract_track(
            self.runner.as_ref(),
            &self.tools.mkvextract,
            path,
            stream.index,
            &staged,
            cancel,
        )
        .await?;

        if format == SubtitleFormat::DvdBitmap {
            // mkvextract writes the .idx index next to the .sub data; the
            // .sub is committed last so its presence implies both exist.
            cache::commit(&staged.with_extension("idx"), &target.with_extension("idx")).await?;
        }
        cache::commit(&staged, &target).await?;

        Ok(Some(ExtractedSubtitle::new(format, target, key)))
    }

    async fn generate(
        &self,
        path: &Path,
        fingerprint: &ContentFingerprint,
        streams: &[ProbedStream],
        cancel: &CancellationToken,
    ) -> Result<ExtractedSubtitle> {
        if !self.speech.is_enabled() {
            return Err(Error::NotSupported(
                "no subtitle streams found and no speech-to-text backend is configured"
                    .to_string(),
            ));
        }
        let Some(audio) = probe::preferred_audio_stream(streams) else {
            return Err(Error::NotSupported(
                "no subtitle or audio streams found".to_string(),
            ));
        };

        tracing::info!(
            file = %display_name(path),
            stream = audio.index,
            codec = %audio.codec_name,
            channels = ?audio.channels,
            "Generating subtitles with speech-to-text"
        );

        match self.transcribe(path, fingerprint, audio, cancel).await {
            Ok(subtitle) => Ok(subtitle),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Err(Error::NotSupported(format!(
                "speech-to-text generation failed: {e}"
            ))),
        }
    }

    async fn transcribe(
        &self,
        path: &Path,
        fingerprint: &ContentFingerprint,
        audio: &ProbedStream,
        cancel: &CancellationToken,
    ) -> Result<ExtractedSubtitle> {
        let staging = self.cache.staging_dir(fingerprint).await?;
        let wav = staging.path().join("audio.wav");
        ffmpeg::extract_speech_audio(
            self.runner.as_ref(),
            &self.tools.ffmpeg,
            path,
            audio,
            &wav,
            cancel,
        )
        .await?;

        let staged = speech::transcribe(
            self.runner.as_ref(),
            &self.speech,
            &wav,
            &staging.path().join("generated"),
            cancel,
        )
        .await?;

        let target = self
            .cache
            .artifact_path(fingerprint, StreamKey::Generated, "srt");
        cache::commit(&staged, &target).await?;
        Ok(ExtractedSubtitle::Text {
            path: target,
            stream: StreamKey::Generated,
        })
    }
}

/// Runs `mkvextract <input> tracks <index>:<output>`.
pub async fn extract_track(
    runner: &dyn ToolRunner,
    mkvextract: &str,
    input_path: &Path,
    track_index: u32,
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut track = OsString::from(format!("{track_index}:"));
    track.push(output_path.as_os_str());

    let invocation = ToolInvocation::new(mkvextract)
        .arg(input_path)
        .arg("tracks")
        .arg(track);

    runner.run(&invocation, cancel).await?.check(mkvextract)?;
    Ok(())
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
