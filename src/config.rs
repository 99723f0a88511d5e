use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIDENCE: u8 = 40;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_folder: PathBuf,
    pub confidence: u8,
    pub tools: ToolPaths,
    pub speech_to_text: SpeechToTextConfig,
    pub opensubtitles: OpenSubtitlesConfig,
}

/// Programs invoked as subprocesses. Bare names are resolved through `PATH`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub mkvextract: String,
    pub vobsub2srt: String,
    /// Program plus leading arguments, e.g. `["dotnet", "PgsToSrt.dll"]`.
    pub pgs_to_srt: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechToTextConfig {
    pub program: String,
    /// Model file; the backend is disabled while this is unset.
    pub model: Option<PathBuf>,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenSubtitlesConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_folder: default_cache_folder(),
            confidence: DEFAULT_CONFIDENCE,
            tools: ToolPaths::default(),
            speech_to_text: SpeechToTextConfig::default(),
            opensubtitles: OpenSubtitlesConfig::default(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            mkvextract: "mkvextract".to_string(),
            vobsub2srt: "vobsub2srt".to_string(),
            pgs_to_srt: vec!["dotnet".to_string(), "pgstosrt/PgsToSrt.dll".to_string()],
        }
    }
}

impl Default for SpeechToTextConfig {
    fn default() -> Self {
        Self {
            program: "whisper-cli".to_string(),
            model: None,
            language: "en".to_string(),
        }
    }
}

impl Default for OpenSubtitlesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rest.opensubtitles.org".to_string(),
            user_agent: "tvrename v1".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Config {
    /// Folder holding extracted subtitle streams, sharded by fingerprint.
    pub fn extracted_folder(&self) -> PathBuf {
        self.cache_folder.join("extracted")
    }
}

impl SpeechToTextConfig {
    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }
}

/// Loads the config file (if any) and applies environment overrides.
pub fn load() -> Result<Config> {
    let config_path = get_config_path();
    let mut config = if config_path.exists() {
        load_from(&config_path)?
    } else {
        Config::default()
    };

    if let Ok(folder) = env::var("CACHE_FOLDER") {
        config.cache_folder = PathBuf::from(folder);
    }
    if let Ok(program) = env::var("WHISPER_BIN") {
        config.speech_to_text.program = program;
    }
    if let Ok(model) = env::var("WHISPER_MODEL") {
        config.speech_to_text.model = Some(PathBuf::from(model));
    }

    tracing::debug!(
        cache = %config.cache_folder.display(),
        speech_to_text = config.speech_to_text.is_enabled(),
        "Loaded configuration"
    );

    Ok(config)
}

fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    if config.confidence > 100 {
        bail!(
            "Invalid config file {}: confidence must be between 0 and 100, got {}",
            path.display(),
            config.confidence
        );
    }
    Ok(config)
}

fn default_cache_folder() -> PathBuf {
    xdir::cache()
        .map(|path| path.join("tvrename"))
        // If the standard path could not be found (e.g.`$HOME` is not set),
        // default to the current directory.
        .unwrap_or_else(|| PathBuf::from(".tvrename-cache"))
}

fn get_config_dir_path() -> PathBuf {
    xdir::config()
        .map(|path| path.join("tvrename"))
        .unwrap_or_default()
}

fn get_config_path() -> PathBuf {
    get_config_dir_path().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
cache_folder = "/var/cache/tvrename"

[tools]
mkvextract = "/opt/mkvtoolnix/mkvextract"

[speech_to_text]
model = "/models/ggml-base.en.bin"
"#,
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.cache_folder, PathBuf::from("/var/cache/tvrename"));
        assert_eq!(
            config.extracted_folder(),
            PathBuf::from("/var/cache/tvrename/extracted")
        );
        assert_eq!(config.tools.mkvextract, "/opt/mkvtoolnix/mkvextract");
        assert_eq!(config.tools.ffprobe, "ffprobe");
        assert_eq!(config.confidence, DEFAULT_CONFIDENCE);
        assert!(config.speech_to_text.is_enabled());
        assert_eq!(config.speech_to_text.program, "whisper-cli");
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "confidence = \"high\"").unwrap();

        assert!(load_from(&path).is_err());
    }

    #[test]
    fn test_out_of_range_confidence_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "confidence = 150").unwrap();

        let message = format!("{:#}", load_from(&path).unwrap_err());
        assert!(message.contains("between 0 and 100"));

        fs::write(&path, "confidence = 100").unwrap();
        assert_eq!(load_from(&path).unwrap().confidence, 100);
    }

    #[test]
    fn test_speech_to_text_disabled_by_default() {
        assert!(!SpeechToTextConfig::default().is_enabled());
    }
}
