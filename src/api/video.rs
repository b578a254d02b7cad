use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_status, read_body, VideoGeneration};
use crate::config::VideoSettings;
use crate::error::ServiceError;

/// Client for the text-to-video generation service.
#[derive(Debug, Clone)]
pub struct VideoClient {
    settings: VideoSettings,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct VideoGenerationRequest<'a> {
    prompt: &'a str,
    resolution: &'a str,
    output_format: &'a str,
    fps: u32,
}

#[derive(Debug, Deserialize)]
struct VideoGenerationResponse {
    #[serde(default)]
    video_url: String,
}

impl VideoClient {
    pub fn new(settings: VideoSettings, api_key: String) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ServiceError::Client)?;

        Ok(Self {
            settings,
            api_key,
            client,
        })
    }

    /// File name for a segment, e.g. `segment_02_scene_03.mp4`.
    pub fn segment_file_name(&self, position: usize, scene_index: usize) -> String {
        format!(
            "segment_{:02}_scene_{:02}.{}",
            position, scene_index, self.settings.output_format
        )
    }

    /// Submit the prompt and return the locator of the rendered video.
    async fn request_render(&self, prompt: &str) -> Result<String, ServiceError> {
        let endpoint = self.settings.endpoint.as_str();
        let request = VideoGenerationRequest {
            prompt,
            resolution: &self.settings.resolution,
            output_format: &self.settings.output_format,
            fps: self.settings.fps,
        };
        let body = serde_json::to_vec(&request).map_err(ServiceError::Serialize)?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| ServiceError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let response = check_status(endpoint, response).await?;
        let body = read_body(endpoint, response).await?;
        let parsed: VideoGenerationResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
                message: format!("{e}; body: {body}"),
            })?;

        if parsed.video_url.trim().is_empty() {
            return Err(ServiceError::EmptyLocator);
        }
        Ok(parsed.video_url)
    }

    /// Download `url` into `path`.
    async fn download(&self, url: &str, path: &Path) -> Result<(), ServiceError> {
        info!(url, path = %path.display(), "Downloading rendered video");

        let transfer = |message: String| ServiceError::Transfer {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transfer(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(transfer(format!("unexpected status {status}")));
        }
        let bytes = response.bytes().await.map_err(|e| transfer(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ServiceError::Persist {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| ServiceError::Persist {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl VideoGeneration for VideoClient {
    async fn generate_segment(
        &self,
        prompt: &str,
        position: usize,
        scene_index: usize,
        work_dir: &Path,
    ) -> Result<PathBuf, ServiceError> {
        info!(position, scene = scene_index, "Requesting video segment");

        let url = self.request_render(prompt).await?;
        let path = work_dir.join(self.segment_file_name(position, scene_index));
        self.download(&url, &path).await?;

        info!(position, scene = scene_index, path = %path.display(), "Video segment saved");
        Ok(path)
    }
}
