use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_status, read_body, TextGeneration};
use crate::config::TextSettings;
use crate::error::ServiceError;

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct TextClient {
    settings: TextSettings,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    chat_template_kwargs: TemplateKwargs,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct TemplateKwargs {
    enable_thinking: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl TextClient {
    pub fn new(settings: TextSettings, api_key: Option<String>) -> Result<Self, ServiceError> {
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

    /// Send one user message and return the first choice's content.
    async fn complete(&self, content: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let endpoint = self.settings.endpoint.as_str();
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content,
            }],
            max_tokens,
            temperature: self.settings.temperature,
            chat_template_kwargs: TemplateKwargs {
                enable_thinking: false,
            },
        };

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| ServiceError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let response = check_status(endpoint, response).await?;
        let body = read_body(endpoint, response).await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
                message: format!("{e}; body: {body}"),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ServiceError::NoChoices)
    }
}

#[async_trait]
impl TextGeneration for TextClient {
    async fn generate_idea_and_scenes(&self, topic: &str) -> Result<String, ServiceError> {
        info!(topic, "Requesting overall idea and scenes");

        let prompt = format!(
            r#"Come up with an idea for a YouTube Short about "{topic}".
Answer strictly in the following format:
Idea: [short description of the idea]

Scene 1: [short description]
Scene 2: [short description]
Scene 3: [short description]
... (up to 5-7 scenes if appropriate)
"#
        );

        let text = self
            .complete(&prompt, self.settings.max_tokens_general)
            .await?;
        debug!(response = %text, "Generated idea and scenes");
        Ok(text)
    }

    async fn generate_scene_prompt(
        &self,
        overall_idea: &str,
        scene_description: &str,
    ) -> Result<String, ServiceError> {
        info!(scene = scene_description, "Requesting detailed video prompt");

        let prompt = format!(
            r#"Based on the overall idea "{overall_idea}" and the scene description "{scene_description}",
write a very detailed prompt suitable for direct video generation.
Describe what happens in the frame, which objects are present, their actions, the background, lighting, mood and style.
Focus on visual details.
"#
        );

        self.complete(&prompt, self.settings.max_tokens_detailed)
            .await
    }
}
