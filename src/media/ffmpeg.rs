use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::media::probe::ProbedStream;
use crate::media::tools::{ToolInvocation, ToolRunner};

pub const SPEECH_SAMPLE_RATE: u32 = 16000;

/// Codecs whose multichannel mixes put dialogue in the centre channel.
const SURROUND_CODECS: &[&str] = &["ac3", "eac3", "dts", "truehd", "aac", "flac", "opus"];

/// Filter arguments that reduce an audio stream to a single channel suited
/// for speech recognition.
pub fn downmix_args(stream: &ProbedStream) -> Vec<String> {
    match stream.channels.unwrap_or(2) {
        0 | 1 => Vec::new(),
        // 5.1 and wider: the centre channel carries the dialogue
        channels if channels >= 6 && SURROUND_CODECS.contains(&stream.codec_name.as_str()) => {
            vec!["-af".to_string(), "pan=mono|c0=FC".to_string()]
        }
        _ => vec!["-ac".to_string(), "1".to_string()],
    }
}

/// Writes the given audio stream as 16 kHz mono PCM WAV.
pub async fn extract_speech_audio(
    runner: &dyn ToolRunner,
    ffmpeg: &str,
    input_path: &Path,
    stream: &ProbedStream,
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let invocation = ToolInvocation::new(ffmpeg)
        .args(["-hide_banner", "-nostdin", "-y", "-i"])
        .arg(input_path)
        .args(["-map".to_string(), format!("0:{}", stream.index), "-vn".to_string()])
        .args(downmix_args(stream))
        .args([
            "-ar".to_string(),
            SPEECH_SAMPLE_RATE.to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
        ])
        .arg(output_path);

    runner.run(&invocation, cancel).await?.check(ffmpeg)?;
    Ok(())
}
