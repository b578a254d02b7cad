//! Publishing the final video to social platforms.
//!
//! Each platform is an [`Uploader`]; [`PublishingService`] resolves a
//! platform tag to its uploader. Uploaders check their credentials before
//! touching the file or the network.

mod tiktok;
mod youtube;

pub use tiktok::TikTokUploader;
pub use youtube::YouTubeUploader;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::PublishError;

/// What to upload and how to describe it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub video: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Upload capability for one platform.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Lowercase tag the registry knows this uploader by, e.g. `youtube`.
    fn platform(&self) -> &'static str;

    /// Upload the video and return a URL or locator for the published post.
    async fn upload(&self, request: &UploadRequest) -> Result<String, PublishError>;
}

/// Registry of uploaders keyed by platform tag.
#[derive(Default)]
pub struct PublishingService {
    uploaders: HashMap<&'static str, Box<dyn Uploader>>,
}

impl PublishingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploader, replacing any previous one for the same platform.
    pub fn register(&mut self, uploader: Box<dyn Uploader>) -> &mut Self {
        self.uploaders.insert(uploader.platform(), uploader);
        self
    }

    pub fn with(mut self, uploader: Box<dyn Uploader>) -> Self {
        self.register(uploader);
        self
    }

    pub fn platforms(&self) -> Vec<&'static str> {
        let mut platforms: Vec<_> = self.uploaders.keys().copied().collect();
        platforms.sort_unstable();
        platforms
    }

    /// Upload to the platform named by `platform` (case-insensitive).
    pub async fn publish(
        &self,
        platform: &str,
        request: &UploadRequest,
    ) -> Result<String, PublishError> {
        let tag = platform.trim().to_ascii_lowercase();
        let uploader = self
            .uploaders
            .get(tag.as_str())
            .ok_or_else(|| PublishError::UnknownPlatform(platform.to_string()))?;

        info!(platform = %tag, video = %request.video.display(), "Uploading video");
        match uploader.upload(request).await {
            Ok(url) => {
                info!(platform = %tag, url = %url, "Upload succeeded");
                Ok(url)
            }
            Err(e) => {
                error!(platform = %tag, error = %e, "Upload failed");
                Err(e)
            }
        }
    }
}

/// Read the whole video into memory for upload.
async fn read_video(path: &Path) -> Result<Vec<u8>, PublishError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PublishError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(PublishError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "video file is empty"),
        });
    }
    Ok(bytes)
}

/// Return the token if it is present and non-blank.
fn require_token<'a>(
    token: &'a Option<String>,
    platform: &'static str,
    credential: &'static str,
) -> Result<&'a str, PublishError> {
    token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(PublishError::MissingCredential {
            platform,
            credential,
        })
}
