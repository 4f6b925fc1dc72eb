//! Chat-completions transport for OpenAI-compatible vision endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ModelClient;
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::normalizer::NormalizedImage;

/// Longest upstream error body echoed into an error message
const ERROR_BODY_LIMIT: usize = 512;

// == Wire Types ==
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, PartialEq)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Builds the user message parts: text first, then the image if any.
fn content_parts<'a>(prompt: &'a str, image: Option<&NormalizedImage>) -> Vec<ContentPart<'a>> {
    let mut parts = vec![ContentPart::Text { text: prompt }];
    if let Some(image) = image {
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        });
    }
    parts
}

fn first_reply(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ServiceError::Upstream("model returned no message content".to_string()))
}

// == Client ==
/// HTTP client for a chat-completions endpoint authenticated by bearer key.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.api_key.is_empty() {
            warn!("ZHIPU_API_KEY is not set, model calls will be rejected upstream");
        }
        Self::new(
            config.model_api_url.clone(),
            config.model_name.clone(),
            config.api_key.clone(),
            config.model_timeout,
        )
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, image: Option<&NormalizedImage>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: content_parts(prompt, image),
            }],
        };

        debug!(model = %self.model, with_image = image.is_some(), "calling model");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(ServiceError::Upstream(format!(
                "model API returned {}: {}",
                status, excerpt
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("malformed model response: {}", e)))?;

        first_reply(body)
    }
}
