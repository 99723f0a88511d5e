use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::media::subtitles::SubtitleFormat;
use crate::media::tools::{ToolInvocation, ToolRunner};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    index: u32,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    channels: Option<u32>,
    #[serde(default)]
    disposition: Option<Disposition>,
}

#[derive(Debug, Deserialize)]
struct Disposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Subtitle,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedStream {
    pub index: u32,
    pub codec_name: String,
    pub media_type: MediaType,
    pub is_default: bool,
    /// Audio only.
    pub channels: Option<u32>,
}

/// Lists the subtitle and audio streams of a container.
///
/// A failed or unparsable probe yields an empty list: callers cannot tell it
/// apart from a file without subtitles, and fall back the same way.
pub async fn probe_streams(
    runner: &dyn ToolRunner,
    ffprobe: &str,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<ProbedStream>> {
    let invocation = ToolInvocation::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-i"])
        .arg(path);

    let output = match runner.run(&invocation, cancel).await {
        Ok(output) => output,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            tracing::warn!(file = %path.display(), "Failed to run ffprobe: {e}");
            return Ok(Vec::new());
        }
    };

    if !output.success() {
        tracing::warn!(
            file = %path.display(),
            code = ?output.code,
            "ffprobe exited unsuccessfully"
        );
        return Ok(Vec::new());
    }

    Ok(parse_streams(&output.stdout))
}

pub fn parse_streams(json: &[u8]) -> Vec<ProbedStream> {
    let probe: FfprobeOutput = match serde_json::from_slice(json) {
        Ok(probe) => probe,
        Err(e) => {
            tracing::warn!("Failed to parse ffprobe output: {e}");
            return Vec::new();
        }
    };

    probe
        .streams
        .into_iter()
        .filter_map(|s| {
            let media_type = match s.codec_type.as_deref() {
                Some("subtitle") => MediaType::Subtitle,
                Some("audio") => MediaType::Audio,
                _ => return None,
            };
            Some(ProbedStream {
                index: s.index,
                codec_name: s.codec_name.unwrap_or_default(),
                media_type,
                is_default: s.disposition.map(|d| d.default == 1).unwrap_or(false),
                channels: match media_type {
                    MediaType::Audio => s.channels,
                    MediaType::Subtitle => None,
                },
            })
        })
        .collect()
}

/// Subtitle streams, default first, then text before DVD before image codecs.
pub fn subtitle_streams(streams: &[ProbedStream]) -> Vec<ProbedStream> {
    let mut subtitles: Vec<ProbedStream> = streams
        .iter()
        .filter(|s| s.media_type == MediaType::Subtitle)
        .cloned()
        .collect();
    subtitles.sort_by_key(|s| {
        (
            !s.is_default,
            SubtitleFormat::priority_for_codec(&s.codec_name),
        )
    });
    subtitles
}

/// The audio stream used for speech-to-text: the default one if any.
pub fn preferred_audio_stream(streams: &[ProbedStream]) -> Option<&ProbedStream> {
    let is_audio = |s: &&ProbedStream| s.media_type == MediaType::Audio;
    streams
        .iter()
        .filter(is_audio)
        .find(|s| s.is_default)
        .or_else(|| streams.iter().find(is_audio))
}
