//! Settings loaded from `config/config.toml` and the environment.
//!
//! The TOML file holds model and rendering parameters; endpoints may be
//! overridden and secrets are supplied through environment variables
//! (optionally from a `.env` file).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub endpoint: String,
    pub model: String,
    pub max_tokens_general: u32,
    pub max_tokens_detailed: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1/chat/completions".to_string(),
            model: "Qwen/Qwen3-8B".to_string(),
            max_tokens_general: 1024,
            max_tokens_detailed: 512,
            temperature: 0.7,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub endpoint: String,
    pub resolution: String,
    pub output_format: String,
    pub fps: u32,
    pub timeout_secs: u64,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081/v1/video/generations".to_string(),
            resolution: "1080x1920".to_string(),
            output_format: "mp4".to_string(),
            fps: 30,
            timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Parent of the per-run working directories
    pub work_root: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("temp_videos"),
            output_dir: PathBuf::from("output_shorts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeSettings {
    pub api_base: String,
    pub privacy_status: String,
}

impl Default for YouTubeSettings {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com".to_string(),
            privacy_status: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TikTokSettings {
    pub api_base: String,
    pub privacy_level: String,
}

impl Default for TikTokSettings {
    fn default() -> Self {
        Self {
            api_base: "https://open.tiktokapis.com".to_string(),
            privacy_level: "PUBLIC_TO_EVERYONE".to_string(),
        }
    }
}

/// One place the final video is published to.
///
/// `{idea}` and `{topic}` in the title and description are substituted per run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Destination {
    pub platform: String,
    #[serde(default = "Destination::default_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Destination {
    fn default_title() -> String {
        "{idea}".to_string()
    }

    /// A destination with default metadata for the given platform.
    pub fn for_platform(platform: &str) -> Self {
        match platform.to_ascii_lowercase().as_str() {
            "tiktok" => Self {
                platform: "tiktok".to_string(),
                title: "AI: {idea}".to_string(),
                description: "AI generated short! #AI #Shorts".to_string(),
                tags: vec!["AI".to_string(), "shorts".to_string()],
            },
            "youtube" => Self {
                platform: "youtube".to_string(),
                title: "AI Shorts: {idea}".to_string(),
                description: "A YouTube Short generated entirely by AI on the topic: {topic}."
                    .to_string(),
                tags: vec![
                    "AI".to_string(),
                    "Shorts".to_string(),
                    "YouTubeShorts".to_string(),
                    "AIgenerated".to_string(),
                ],
            },
            other => Self {
                platform: other.to_string(),
                title: Self::default_title(),
                description: String::new(),
                tags: Vec::new(),
            },
        }
    }
}

/// Contents of the TOML settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub text: TextSettings,
    pub video: VideoSettings,
    pub paths: PathSettings,
    pub tools: ToolSettings,
    pub youtube: YouTubeSettings,
    pub tiktok: TikTokSettings,
    pub destinations: Vec<Destination>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            text: TextSettings::default(),
            video: VideoSettings::default(),
            paths: PathSettings::default(),
            tools: ToolSettings::default(),
            youtube: YouTubeSettings::default(),
            tiktok: TikTokSettings::default(),
            destinations: vec![
                Destination::for_platform("youtube"),
                Destination::for_platform("tiktok"),
            ],
        }
    }
}

impl FileConfig {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&raw, path)
    }

    fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Secrets and endpoint overrides taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub text_endpoint: Option<String>,
    pub video_endpoint: Option<String>,
    pub text_api_key: Option<String>,
    pub video_api_key: Option<String>,
    pub youtube_access_token: Option<String>,
    pub tiktok_access_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            text_endpoint: var("TEXT_AI_ENDPOINT"),
            video_endpoint: var("VIDEO_AI_ENDPOINT"),
            text_api_key: var("TEXT_AI_API_KEY"),
            video_api_key: var("VIDEO_AI_API_KEY"),
            youtube_access_token: var("YOUTUBE_ACCESS_TOKEN"),
            tiktok_access_token: var("TIKTOK_ACCESS_TOKEN"),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub text: TextSettings,
    pub video: VideoSettings,
    pub paths: PathSettings,
    pub tools: ToolSettings,
    pub youtube: YouTubeSettings,
    pub tiktok: TikTokSettings,
    pub destinations: Vec<Destination>,
    pub text_api_key: Option<String>,
    pub video_api_key: String,
    pub youtube_access_token: Option<String>,
    pub tiktok_access_token: Option<String>,
}

impl Config {
    /// Merge file settings with environment secrets and validate the result.
    pub fn resolve(file: FileConfig, secrets: Secrets) -> Result<Self, ConfigError> {
        let mut text = file.text;
        let mut video = file.video;
        if let Some(endpoint) = secrets.text_endpoint {
            text.endpoint = endpoint;
        }
        if let Some(endpoint) = secrets.video_endpoint {
            video.endpoint = endpoint;
        }

        if text.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("TEXT_AI_ENDPOINT"));
        }
        if video.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("VIDEO_AI_ENDPOINT"));
        }
        let video_api_key = secrets
            .video_api_key
            .ok_or(ConfigError::Missing("VIDEO_AI_API_KEY"))?;

        if video.fps == 0 {
            return Err(ConfigError::Invalid("video.fps must be greater than 0".to_string()));
        }
        if video.output_format.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "video.output_format must not be empty".to_string(),
            ));
        }

        let config = Self {
            text,
            video,
            paths: file.paths,
            tools: file.tools,
            youtube: file.youtube,
            tiktok: file.tiktok,
            destinations: file.destinations,
            text_api_key: secrets.text_api_key,
            video_api_key,
            youtube_access_token: secrets.youtube_access_token,
            tiktok_access_token: secrets.tiktok_access_token,
        };
        config.warn_missing_tokens();
        Ok(config)
    }

    fn warn_missing_tokens(&self) {
        for destination in &self.destinations {
            let missing = match destination.platform.to_ascii_lowercase().as_str() {
                "youtube" => self.youtube_access_token.is_none().then_some("YOUTUBE_ACCESS_TOKEN"),
                "tiktok" => self.tiktok_access_token.is_none().then_some("TIKTOK_ACCESS_TOKEN"),
                _ => None,
            };
            if let Some(var) = missing {
                warn!(platform = %destination.platform, "{} is not set, upload will fail", var);
            }
        }
    }

    pub fn log_summary(&self) {
        info!(endpoint = %self.text.endpoint, model = %self.text.model, "Text generation service");
        info!(
            endpoint = %self.video.endpoint,
            resolution = %self.video.resolution,
            format = %self.video.output_format,
            fps = self.video.fps,
            "Video generation service"
        );
    }
}
