use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{read_video, require_token, UploadRequest, Uploader};
use crate::api::{check_status, read_body};
use crate::error::{PublishError, ServiceError};

const PLATFORM: &str = "tiktok";
const CREDENTIAL: &str = "TIKTOK_ACCESS_TOKEN";
const MAX_CAPTION_CHARS: usize = 2200;

/// Direct-posts through the TikTok Content Posting API.
///
/// The video goes up as a single chunk. TikTok assigns the public URL only
/// after processing, so the returned locator is `tiktok:publish/<publish_id>`.
pub struct TikTokUploader {
    api_base: String,
    privacy_level: String,
    access_token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    data: Option<InitData>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    message: String,
}

impl TikTokUploader {
    pub fn new(api_base: String, privacy_level: String, access_token: Option<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            privacy_level,
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

    /// TikTok has a single caption: title, description and hashtags joined.
    fn caption(request: &UploadRequest) -> String {
        let hashtags = request
            .tags
            .iter()
            .map(|t| t.trim().trim_start_matches('#'))
            .filter(|t| !t.is_empty())
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" ");
        let caption = [request.title.trim(), request.description.trim(), hashtags.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        caption.chars().take(MAX_CAPTION_CHARS).collect()
    }

    async fn init_upload(
        &self,
        token: &str,
        request: &UploadRequest,
        size: usize,
    ) -> Result<InitData, PublishError> {
        let endpoint = format!("{}/v2/post/publish/video/init/", self.api_base);
        let body = json!({
            "post_info": {
                "title": Self::caption(request),
                "privacy_level": self.privacy_level,
            },
            "source_info": {
                "source": "FILE_UPLOAD",
                "video_size": size,
                "chunk_size": size,
                "total_chunk_count": 1,
            }
        });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|source| {
                Self::upload_error(ServiceError::Request {
                    endpoint: endpoint.clone(),
                    source,
                })
            })?;
        let response = check_status(&endpoint, response)
            .await
            .map_err(Self::upload_error)?;
        let text = read_body(&endpoint, response)
            .await
            .map_err(Self::upload_error)?;
        let parsed: InitResponse = serde_json::from_str(&text).map_err(|e| {
            Self::upload_error(ServiceError::Decode {
                message: format!("{e}; body: {text}"),
            })
        })?;

        if let Some(error) = parsed.error.filter(|e| e.code != "ok") {
            return Err(Self::upload_error(ServiceError::Decode {
                message: format!("{}: {}", error.code, error.message),
            }));
        }
        parsed.data.ok_or_else(|| {
            Self::upload_error(ServiceError::Decode {
                message: "init response has no data".to_string(),
            })
        })
    }
}

#[async_trait]
impl Uploader for TikTokUploader {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, PublishError> {
        let token = require_token(&self.access_token, PLATFORM, CREDENTIAL)?;
        let bytes = read_video(&request.video).await?;
        let size = bytes.len();
        info!(title = %request.title, bytes = size, "Starting TikTok upload");

        let init = self.init_upload(token, request, size).await?;

        let response = self
            .client
            .put(&init.upload_url)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_RANGE, format!("bytes 0-{}/{}", size - 1, size))
            .body(bytes)
            .send()
            .await
            .map_err(|source| {
                Self::upload_error(ServiceError::Request {
                    endpoint: init.upload_url.clone(),
                    source,
                })
            })?;
        check_status(&init.upload_url, response)
            .await
            .map_err(Self::upload_error)?;

        Ok(format!("tiktok:publish/{}", init.publish_id))
    }
}
