use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>|\{\\[^}]*\}").expect("valid markup pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub timing: String,
    /// Plaintext lines with formatting tags removed.
    pub lines: Vec<String>,
}

pub async fn parse_file(path: &Path) -> Result<Vec<Cue>> {
    let bytes = tokio::fs::read(path).await?;
    parse(&String::from_utf8_lossy(&bytes)).map_err(|reason| Error::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parses SubRip text into cues. Cue numbers are optional and ignored; a
/// block is anything that has a `-->` timing line.
pub fn parse(content: &str) -> std::result::Result<Vec<Cue>, String> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut current: Option<Cue> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.contains("-->") {
            if let Some(mut cue) = current.take() {
                // Without a blank separator the next block's number lands
                // in this cue's text right before its timing line.
                if cue.lines.last().is_some_and(|l| is_cue_number(l)) {
                    cue.lines.pop();
                }
                cues.push(cue);
            }
            current = Some(Cue {
                timing: line.trim().to_string(),
                lines: Vec::new(),
            });
            continue;
        }

        if line.trim().is_empty() {
            if let Some(cue) = current.take() {
                cues.push(cue);
            }
            continue;
        }
        let Some(cue) = current.as_mut() else {
            continue;
        };
        let plain = MARKUP.replace_all(line, "");
        let plain = plain.trim();
        if !plain.is_empty() {
            cue.lines.push(plain.to_string());
        }
    }
    if let Some(cue) = current {
        cues.push(cue);
    }

    if cues.is_empty() && !content.trim().is_empty() {
        return Err("no subtitle cues found".to_string());
    }
    Ok(cues)
}

fn is_cue_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

pub fn plaintext_lines(cues: &[Cue]) -> impl Iterator<Item = &str> {
    cues.iter().flat_map(|c| c.lines.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_blocks() {
        let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,500\r\n<i>Never tell me</i>\r\nthe odds!\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\n{\\an8}Laugh it up, fuzzball.\r\n";
        let cues = parse(content).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].timing, "00:00:01,000 --> 00:00:02,500");
        assert_eq!(cues[0].lines, vec!["Never tell me", "the odds!"]);
        assert_eq!(cues[1].lines, vec!["Laugh it up, fuzzball."]);
    }

    #[test]
    fn test_missing_blank_separator() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nfirst\n2\n00:00:03,000 --> 00:00:04,000\nsecond\n";
        let cues = parse(content).unwrap();
        let lines: Vec<&str> = plaintext_lines(&cues).collect();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_numeric_dialogue_is_kept() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nThe year was\n1984\n\n2\n00:00:03,000 --> 00:00:04,000\n42\n";
        let cues = parse(content).unwrap();
        assert_eq!(cues[0].lines, vec!["The year was", "1984"]);
        assert_eq!(cues[1].lines, vec!["42"]);
    }

    #[test]
    fn test_empty_file_has_no_cues() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse("this is not a subtitle file").is_err());
    }

    #[tokio::test]
    async fn test_parse_file_reports_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.srt");
        std::fs::write(&path, "garbage").unwrap();
        match parse_file(&path).await {
            Err(Error::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
