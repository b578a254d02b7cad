use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{read_video, require_token, UploadRequest, Uploader};
use crate::api::{check_status, read_body};
use crate::error::{PublishError, ServiceError};

const PLATFORM: &str = "youtube";
const CREDENTIAL: &str = "YOUTUBE_ACCESS_TOKEN";
/// "People & Blogs"
const CATEGORY_ID: &str = "22";

/// Uploads through the YouTube Data API v3 resumable upload protocol.
///
/// Expects an OAuth access token with the `youtube.upload` scope.
pub struct YouTubeUploader {
    api_base: String,
    privacy_status: String,
    access_token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

impl YouTubeUploader {
    pub fn new(api_base: String, privacy_status: String, access_token: Option<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            privacy_status,
            access_token,
            client: Client::new(),
        }
    }

    fn upload_error(source: ServiceError) -> PublishError {
        PublishError::Upload {
            platform: PLATFORM,
            source,
        }
    }

    fn request_error(endpoint: &str) -> impl FnOnce(reqwest::Error) -> PublishError + '_ {
        move |source| {
            Self::upload_error(ServiceError::Request {
                endpoint: endpoint.to_string(),
                source,
            })
        }
    }

    /// Start a resumable session and return the session URI.
    async fn start_session(
        &self,
        token: &str,
        request: &UploadRequest,
        size: usize,
    ) -> Result<String, PublishError> {
        let endpoint = format!("{}/upload/youtube/v3/videos", self.api_base);
        let metadata = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
                "categoryId": CATEGORY_ID,
            },
            "status": {
                "privacyStatus": self.privacy_status,
                "selfDeclaredMadeForKids": false,
            }
        });

        let response = self
            .client
            .post(&endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Length", size.to_string())
            .header("X-Upload-Content-Type", "video/*")
            .json(&metadata)
            .send()
            .await
            .map_err(Self::request_error(&endpoint))?;
        let response = check_status(&endpoint, response)
            .await
            .map_err(Self::upload_error)?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Self::upload_error(ServiceError::Decode {
                    message: "resumable session response has no Location header".to_string(),
                })
            })
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, PublishError> {
        let token = require_token(&self.access_token, PLATFORM, CREDENTIAL)?;
        let bytes = read_video(&request.video).await?;
        info!(title = %request.title, tags = ?request.tags, bytes = bytes.len(), "Starting YouTube upload");

        let session = self.start_session(token, request, bytes.len()).await?;
        debug!(session = %session, "Resumable session created");

        let response = self
            .client
            .put(&session)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "video/*")
            .body(bytes)
            .send()
            .await
            .map_err(Self::request_error(&session))?;
        let response = check_status(&session, response)
            .await
            .map_err(Self::upload_error)?;
        let body = read_body(&session, response)
            .await
            .map_err(Self::upload_error)?;
        let video: VideoResource = serde_json::from_str(&body).map_err(|e| {
            Self::upload_error(ServiceError::Decode {
                message: format!("{e}; body: {body}"),
            })
        })?;

        Ok(format!("https://www.youtube.com/watch?v={}", video.id))
    }
}
