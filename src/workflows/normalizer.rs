use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;

use crate::config::ToolPaths;
use crate::domain::models::NormalizedLines;
use crate::error::Result;
use crate::media::subtitles::ExtractedSubtitle;
use crate::media::tools::ToolRunner;
use crate::media::{ocr, srt};

static APOSTROPHE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)[’‘`´](\w)").expect("valid apostrophe pattern"));
// Sound descriptions and music cues (SDH)
static SOUND_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|[♪♫]").expect("valid sound cue pattern"));
static LEADING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-‐–—]+").expect("valid dash pattern"));
// SDH speaker names are written in capitals; mixed-case text before a colon
// is dialogue.
static SPEAKER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\p{Lu}[\p{Lu}\d .'’&]{0,29}:(\s+|$)").expect("valid speaker pattern")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Turns extracted subtitles into matchable lines, running OCR first when
/// the stream is a bitmap format.
pub struct Normalizer {
    runner: Arc<dyn ToolRunner>,
    tools: ToolPaths,
}

impl Normalizer {
    pub fn new(runner: Arc<dyn ToolRunner>, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    pub async fn normalize(
        &self,
        subtitle: &ExtractedSubtitle,
        cancel: &CancellationToken,
    ) -> Result<NormalizedLines> {
        let text_path = ocr::to_text(subtitle, &self.tools, self.runner.as_ref(), cancel).await?;
        let cues = srt::parse_file(&text_path).await?;
        let lines = normalize_lines(srt::plaintext_lines(&cues));
        tracing::debug!(
            path = %text_path.display(),
            cues = cues.len(),
            lines = lines.len(),
            "Normalized subtitles"
        );
        Ok(lines)
    }
}

pub fn normalize_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> NormalizedLines {
    lines.into_iter().filter_map(normalize_line).collect()
}

/// Cleans one raw subtitle line. Returns `None` when nothing but labels,
/// punctuation dashes or sound descriptions remain.
pub fn normalize_line(raw: &str) -> Option<String> {
    let line = SOUND_CUE.replace_all(raw, " ");
    let line = LEADING_DASH.replace(&line, "");
    // Labels are recognised by case, so this runs before lowercasing.
    let line = SPEAKER_LABEL.replace(&line, "");
    let line = line.to_lowercase().replace("||", "ll");
    let line = APOSTROPHE.replace_all(&line, "${1}'${2}");
    let line = LEADING_DASH.replace(&line, "");
    let line = WHITESPACE.replace_all(&line, " ");

    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StreamKey;
    use crate::error::Error;
    use crate::media::tools::testing::{failed, RecordingRunner};
    use std::path::PathBuf;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(
            normalize_line("  Never tell me the ODDS!  ").as_deref(),
            Some("never tell me the odds!")
        );
    }

    #[test]
    fn test_double_pipe_becomes_ll() {
        assert_eq!(normalize_line("We'|| be fine").as_deref(), Some("we'll be fine"));
        assert_eq!(normalize_line("I|| do it").as_deref(), Some("ill do it"));
    }

    #[test]
    fn test_curly_apostrophes() {
        assert_eq!(normalize_line("Don’t go").as_deref(), Some("don't go"));
        assert_eq!(normalize_line("It`s fine").as_deref(), Some("it's fine"));
        assert_eq!(normalize_line("‘quoted’").as_deref(), Some("‘quoted’"));
    }

    #[test]
    fn test_strips_speaker_and_dashes() {
        assert_eq!(normalize_line("- Where are you?").as_deref(), Some("where are you?"));
        assert_eq!(normalize_line("HAN: Chewie, we're home.").as_deref(), Some("chewie, we're home."));
        assert_eq!(normalize_line("-LEIA: Help me.").as_deref(), Some("help me."));
        assert_eq!(normalize_line("NARRATOR:"), None);
        assert_eq!(normalize_line("Meet me at 10:30").as_deref(), Some("meet me at 10:30"));
        assert_eq!(
            normalize_line("[ALARM] LANDO: Oh my.").as_deref(),
            Some("oh my.")
        );
    }

    #[test]
    fn test_colon_in_dialogue_is_kept() {
        assert_eq!(
            normalize_line("Here's the deal: you stay.").as_deref(),
            Some("here's the deal: you stay.")
        );
        assert_eq!(
            normalize_line("- Listen: we go now.").as_deref(),
            Some("listen: we go now.")
        );
    }

    #[test]
    fn test_drops_sound_descriptions() {
        assert_eq!(normalize_line("[DOOR SLAMS]"), None);
        assert_eq!(normalize_line("(laughing)"), None);
        assert_eq!(normalize_line("♪ ♪"), None);
        assert_eq!(normalize_line("   "), None);
        assert_eq!(
            normalize_line("(sighs) Fine, you win.").as_deref(),
            Some("fine, you win.")
        );
    }

    #[test]
    fn test_normalize_lines_keeps_order() {
        let lines = normalize_lines(["[MUSIC]", "First", "- Second", ""]);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_normalize_text_subtitle() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("abcd-2.srt");
        std::fs::write(
            &path,
            "1\n00:00:01,000 --> 00:00:02,000\n<i>- Never tell me the odds!</i>\n[ENGINE ROARS]\n",
        )
        .unwrap();
        let runner = Arc::new(RecordingRunner::new(|_| failed(1, "")));
        let normalizer = Normalizer::new(runner.clone(), ToolPaths::default());

        let lines = normalizer
            .normalize(
                &ExtractedSubtitle::Text {
                    path,
                    stream: StreamKey::Index(2),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(lines, vec!["never tell me the odds!"]);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ocr_failure_is_normalization_failure() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("abcd-4.sup");
        std::fs::write(&path, b"PG").unwrap();
        let runner = Arc::new(RecordingRunner::new(|_| failed(1, "crashed")));
        let normalizer = Normalizer::new(runner, ToolPaths::default());

        let result = normalizer
            .normalize(
                &ExtractedSubtitle::ImageBitmap {
                    path: PathBuf::from(&path),
                    stream: StreamKey::Index(4),
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(Error::ToolFailed { .. })));
    }
}
