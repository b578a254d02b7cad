mod text;
mod video;

pub use text::TextClient;
pub use video::VideoClient;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ServiceError;

/// Text generation used by the pipeline.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Ask for an overall idea and a list of scenes for `topic`.
    ///
    /// The answer is free text in the `Idea:` / `Scene N:` format.
    async fn generate_idea_and_scenes(&self, topic: &str) -> Result<String, ServiceError>;

    /// Expand one scene into a detailed prompt for video generation.
    async fn generate_scene_prompt(
        &self,
        overall_idea: &str,
        scene_description: &str,
    ) -> Result<String, ServiceError>;
}

/// Renders a prompt into a video file on local disk.
#[async_trait]
pub trait VideoGeneration: Send + Sync {
    /// Render `prompt` and save the result under `work_dir`.
    ///
    /// `position` is the 1-based position among surviving prompts and
    /// `scene_index` the scene the prompt was written for; both go into the file name.
    async fn generate_segment(
        &self,
        prompt: &str,
        position: usize,
        scene_index: usize,
        work_dir: &Path,
    ) -> Result<PathBuf, ServiceError>;
}

/// Read a response body, mapping transport failures onto `ServiceError`.
pub(crate) async fn read_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<String, ServiceError> {
    response.text().await.map_err(|source| ServiceError::Request {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Turn a non-success response into `ServiceError::Status`, passing others through.
pub(crate) async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_body(endpoint, response).await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}
