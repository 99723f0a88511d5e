//! Subtitle generation for files that carry no subtitle streams, using a
//! whisper.cpp compatible command line tool.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::config::SpeechToTextConfig;
use crate::error::{Error, Result};
use crate::media::tools::{ToolInvocation, ToolRunner};

/// Transcribes a 16 kHz WAV file into `<output_base>.srt` and returns that
/// path.
pub async fn transcribe(
    runner: &dyn ToolRunner,
    config: &SpeechToTextConfig,
    audio_path: &Path,
    output_base: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let Some(model) = &config.model else {
        return Err(Error::NotSupported(
            "no speech-to-text model is configured".to_string(),
        ));
    };

    let invocation = ToolInvocation::new(&config.program)
        .arg("-m")
        .arg(model)
        .args(["-l", config.language.as_str(), "-osrt", "-f"])
        .arg(audio_path)
        .arg("-of")
        .arg(output_base);

    runner.run(&invocation, cancel).await?.check(&config.program)?;

    let srt_path = output_base.with_extension("srt");
    if !tokio::fs::try_exists(&srt_path).await? {
        return Err(Error::ToolFailed {
            tool: config.program.clone(),
            code: Some(0),
            stderr: format!("expected output {} was not written", srt_path.display()),
        });
    }
    Ok(srt_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tools::testing::{arg_after, ok, RecordingRunner};
    use tempfile::TempDir;

    fn config() -> SpeechToTextConfig {
        SpeechToTextConfig {
            model: Some(PathBuf::from("/models/ggml-base.en.bin")),
            ..SpeechToTextConfig::default()
        }
    }

    #[tokio::test]
    async fn test_transcribe_returns_srt_next_to_base() {
        let temp_dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new(|call| {
            let base = arg_after(call, "-of").unwrap();
            std::fs::write(base.with_extension("srt"), "1\n00:00:01,000 --> 00:00:02,000\nhello\n")
                .unwrap();
            ok("")
        });

        let srt = transcribe(
            &runner,
            &config(),
            &temp_dir.path().join("audio.wav"),
            &temp_dir.path().join("generated"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(srt, temp_dir.path().join("generated.srt"));
        assert_eq!(runner.calls_to("whisper-cli"), 1);
    }

    #[tokio::test]
    async fn test_missing_output_is_failure() {
        let temp_dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new(|_| ok(""));

        let result = transcribe(
            &runner,
            &config(),
            &temp_dir.path().join("audio.wav"),
            &temp_dir.path().join("generated"),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::ToolFailed { .. })));
    }

    #[tokio::test]
    async fn test_disabled_backend_is_not_supported() {
        let runner = RecordingRunner::new(|_| ok(""));
        let result = transcribe(
            &runner,
            &SpeechToTextConfig::default(),
            Path::new("audio.wav"),
            Path::new("generated"),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::NotSupported(_))));
        assert!(runner.calls().is_empty());
    }
}
